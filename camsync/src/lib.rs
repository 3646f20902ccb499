//! Session synchronizer for webcam platforms.
//!
//! Polls a platform session feed, reconciles every batch into a
//! [`registry::SessionRegistry`] and periodically persists it.

pub mod config;
pub mod error;
pub mod logging;
pub mod persistence;
pub mod registry;
pub mod scheduler;
pub mod service;

pub use error::{Error, Result};
