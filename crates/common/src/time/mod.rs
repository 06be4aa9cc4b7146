//! Wall-clock abstraction.
//!
//! PKCE windows, persisted timestamps and token expiry checks all read an
//! injected [`Clock`], so tests can move time without sleeping.
//!
//! ```rust
//! use chrono::Duration;
//! use evesso_common::time::{Clock, MockClock};
//!
//! let clock = MockClock::new();
//! let start = clock.now();
//! clock.advance(Duration::minutes(5));
//! assert_eq!(clock.now() - start, Duration::minutes(5));
//! ```

mod clock;

pub use clock::{Clock, MockClock, SystemClock};
