//! Math utilities and types
//!
//! The runtime works in 2D screen space: x grows to the right, y grows downwards.

pub use nalgebra::Vector2;

/// 2D vector type used for positions, sizes and velocities
pub type Vec2 = Vector2<f64>;

/// Shorthand constructor for [`Vec2`]
pub fn vec2(x: f64, y: f64) -> Vec2 {
    Vec2::new(x, y)
}
