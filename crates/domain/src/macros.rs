//! Macro for implementing Display and FromStr for wire-named enums
//!
//! Status and kind enums are logged and serialized by a stable lowercase
//! name. This macro keeps both directions of that mapping in one place.
//!
//! # Example
//!
//! ```rust
//! use evesso_domain::impl_wire_name_conversions;
//!
//! #[derive(Debug, Clone, Copy, PartialEq, Eq)]
//! pub enum GrantType {
//!     AuthorizationCode,
//!     RefreshToken,
//! }
//!
//! impl_wire_name_conversions!(GrantType {
//!     AuthorizationCode => "authorization_code",
//!     RefreshToken => "refresh_token",
//! });
//!
//! assert_eq!(GrantType::RefreshToken.to_string(), "refresh_token");
//! assert_eq!("AUTHORIZATION_CODE".parse::<GrantType>(), Ok(GrantType::AuthorizationCode));
//! ```

/// Implements Display and FromStr for an enum with fixed wire names.
///
/// Parsing is case-insensitive; display always uses the given name.
#[macro_export]
macro_rules! impl_wire_name_conversions {
    ($enum_name:ident { $($variant:ident => $str:literal),+ $(,)? }) => {
        impl $enum_name {
            /// Stable wire name of this variant.
            #[must_use]
            pub const fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $str,)+
                }
            }
        }

        impl std::fmt::Display for $enum_name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $enum_name {
            type Err = String;

            fn from_str(s: &str) -> ::core::result::Result<Self, Self::Err> {
                match s.to_lowercase().as_str() {
                    $($str => Ok(Self::$variant),)+
                    _ => Err(format!("Invalid {}: {}", stringify!($enum_name), s)),
                }
            }
        }
    };
}
