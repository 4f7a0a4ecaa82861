//! Foundation module - Core utilities and types
//!
//! This module provides fundamental utilities used throughout the engine:
//! - Math types for 2D positions, sizes and velocities
//! - Logging utilities

pub mod math;
pub mod logging;
