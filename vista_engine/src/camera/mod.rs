//! Camera module, the view and projection state uploaded to the camera uniform
//!
//! The renderer owns one camera and keeps its aspect ratio in step with the
//! presentable chain; everything else is driven by the caller.

mod camera;

pub use camera::{Camera, CameraUniform, Perspective};
