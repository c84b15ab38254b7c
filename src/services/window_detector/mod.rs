//! WindowDetector service: responsibility and boundaries
//!
//! This module and its submodules are responsible ONLY for reading the active
//! window (title/pid/process/geometry depending on platform) and the screen
//! geometry. It MUST NOT classify windows or keep media state. All detection
//! decisions are made by the DetectionService.

mod dry_run;
mod kdotool;
mod sway;
mod window_detector;
mod xdotool;
mod r#trait;

pub use self::r#trait::{create_window_provider, WindowSnapshotProvider};
