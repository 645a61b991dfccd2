//! Client-side capture: on a fixed period, grab a webcam frame and a screenshot and
//! upload both for the running session.

pub mod camera;
pub mod client;
pub mod controller;
mod loop_worker;

pub use camera::{CameraDevice, CameraGuard, ScreenSource};
pub use client::HttpCaptureClient;
pub use controller::{CaptureScheduler, CaptureSink, ScheduleConfig};
