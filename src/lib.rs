//! Live face mesh sketching.
//!
//! Reads frames from a webcam, runs a face landmark network on them at a fixed interval, and
//! draws the resulting face mesh on top of the video as a set of hand-sketched triangles.
//!
//! # Controls
//!
//! * `C`: activates the camera.
//! * `Space`: begins or stops the detection. Only available once the landmark model is loaded and
//!   the camera delivers frames.
//! * `Escape`: quits.
//!
//! # Environment Variables
//!
//! * `FACESKETCH_MODEL`: path to the `face_landmark.onnx` network. Defaults to
//!   `3rdparty/onnx/face_landmark.onnx`.
//! * `FACESKETCH_TRIANGULATION`: path to a triangulation table replacing the built-in face mesh.
//! * `FACESKETCH_WEBCAM_NAME`: name of the webcam device to open. If unset, the first device that
//!   supports a compatible image format will be used.
//! * `FACESKETCH_RESOLUTION`: requested capture resolution, like `640x480`.
//! * `FACESKETCH_INTERVAL_MS`: time between two detections, in milliseconds. Defaults to 40.
//! * `FACESKETCH_ROUGHNESS`: how sketchy the overlay looks. 0 draws straight lines.
//!
//! Logging is configured with `RUST_LOG`.

use log::LevelFilter;

pub mod app;
pub mod config;
pub mod controller;
pub mod face;
pub mod gui;
pub mod image;
pub mod landmark;
pub mod mesh;
pub mod session;
pub mod sketch;
pub mod timer;
pub mod video;

/// macro-use only, not part of public API.
#[doc(hidden)]
pub fn init_logger(calling_crate: &'static str) {
    let log_level = if cfg!(debug_assertions) {
        LevelFilter::Trace
    } else {
        LevelFilter::Debug
    };
    env_logger::Builder::new()
        .filter(Some(calling_crate), log_level)
        .filter(Some(env!("CARGO_CRATE_NAME")), log_level)
        .filter(Some("wgpu"), LevelFilter::Warn)
        .filter(Some("tract_onnx"), LevelFilter::Warn)
        .parse_default_env()
        .try_init()
        .ok();
}

/// Initializes logging to *stderr*.
///
/// If `cfg!(debug_assertions)` is enabled, the calling crate and this library will log at *trace*
/// level. Otherwise, they will log at *debug* level.
///
/// `wgpu` and `tract_onnx` will always log at *warn* level.
///
/// If a global logger is already registered, this macro will do nothing.
#[macro_export]
macro_rules! init_logger {
    () => {
        $crate::init_logger(env!("CARGO_CRATE_NAME"))
    };
}
