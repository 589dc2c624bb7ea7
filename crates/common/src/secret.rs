//! Secret types for values that must never reach logs.
//!
//! Re-exports [`secrecy`] types. API tokens and webhook URLs read from the
//! environment are held as `SecretString`, so any struct that derives `Debug`
//! over them prints a redacted placeholder instead of the value.
//!
//! ```rust
//! use common::secret::{ExposeSecret, SecretString};
//!
//! #[derive(Debug)]
//! struct Credentials {
//!     project: String,
//!     token: SecretString,
//! }
//!
//! let creds = Credentials {
//!     project: "RM".to_string(),
//!     token: SecretString::from("qase-api-token"),
//! };
//!
//! assert!(!format!("{creds:?}").contains("qase-api-token"));
//! assert_eq!(creds.token.expose_secret(), "qase-api-token");
//! ```

pub use secrecy::{ExposeSecret, SecretString};

/// Read an optional secret, treating empty strings as absent.
#[must_use]
pub fn non_empty_secret(value: Option<&String>) -> Option<SecretString> {
    value
        .filter(|v| !v.trim().is_empty())
        .map(|v| SecretString::from(v.clone()))
}
