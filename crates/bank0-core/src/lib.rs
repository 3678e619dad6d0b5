//! # bank0 – Core
//!
//! Types shared by every bank0 crate:
//!
//! - **Enrollment** – the single device enrollment record and its JSON form
//! - **Errors** – the `Bank0Error` taxonomy and `Bank0Result` alias

pub mod enrollment;
pub mod error;

pub use enrollment::Enrollment;
pub use error::{Bank0Error, Bank0Result};
