#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![warn(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![doc = include_str!("../README.md")]

/// HOTP (HMAC-based One-Time Password) generation and the shared-secret codec
pub mod hotp;

/// TOTP (Time-based One-Time Password) configuration and window verification
pub mod totp;

/// The key-value store contract and its implementations
pub mod store;

/// Replay guard for already-consumed codes
pub mod replay;

/// Opaque session tokens with store-enforced expiry
pub mod session;

/// The second-factor login flow
pub mod gate;
