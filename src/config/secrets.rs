//! Secret handling utilities.
//!
//! Re-exports secrecy types used for store credentials.

pub use secrecy::{ExposeSecret, SecretString};
