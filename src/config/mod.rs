//! # Configuration Module
//!
//! This module provides the tunables of a lens session and their validation.

pub mod config;

pub use config::LensConfig;
