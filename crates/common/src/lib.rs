//! Shared plumbing for the CI reporting and cluster fixture crates.

#![warn(clippy::pedantic)]

/// Bounded polling with terminal-error short circuit
pub mod poll;

/// Sanitizing of remote error payloads
pub mod redact;

/// Secret types that prevent accidental logging
pub mod secret;
