//! HTTP client plumbing

pub mod client;

pub use client::{HttpClient, HttpClientBuilder, DEFAULT_USER_AGENT};
