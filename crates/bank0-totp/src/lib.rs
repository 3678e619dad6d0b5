//! # bank0 – TOTP Code Engine
//!
//! Time-based one-time codes for the device enrollment:
//!
//! - **RFC 4226 / 6238** – HOTP & TOTP generation with SHA-1, SHA-256, SHA-512
//! - **Scheduling** – period boundary and expiry-warning arithmetic
//! - **Ticker** – cancellable background refresh publishing `CodeUpdate`s

pub mod totp;
