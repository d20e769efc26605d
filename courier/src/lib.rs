//! Process wiring for the courier retry scheduler.

#![deny(clippy::pedantic, clippy::all, clippy::nursery)]
#![allow(clippy::must_use_candidate)]

pub mod config;
pub mod controller;

pub use config::{Config, ConfigError};
pub use controller::Courier;
