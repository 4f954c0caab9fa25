//! UI Module - egui integration
//!
//! A thin shell over the `Viewer`: the canvas paints the foreground snapshot
//! and hit-tests clicks; the app drives the per-frame handoff.

pub mod app;
pub mod canvas;

pub use app::{UIState, ViewerApp};
