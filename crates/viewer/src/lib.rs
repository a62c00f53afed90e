//! Point-of-interest viewer core.
//!
//! Keeps the set of drawn points in step with the camera and handles probes
//! that temporarily reveal a hidden point with its elevation.

pub mod config;
pub mod error;
pub mod inspection;
pub mod providers;
pub mod service;

pub use config::ViewerConfig;
pub use error::ConfigError;
pub use inspection::{InspectTicket, InspectionController};
pub use providers::{CoordinateResolver, ElevationProvider, ScreenPos};
pub use service::{Flow, Viewer, ViewerEvent};
