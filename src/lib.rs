//! # bank0
//!
//! Authenticator application for the bank0 demo: shows time-based codes for
//! the device enrollment and routes push approval requests.

pub mod app;
pub mod commands;
pub mod config;
pub mod logging;

pub use app::Bank0App;
pub use config::AppConfig;

pub use bank0_core::{Bank0Error, Bank0Result, Enrollment};
