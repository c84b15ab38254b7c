pub mod island;
pub mod video;
pub mod window;

pub use island::{Dimensions, IslandEvent, MediaCommand, PlaybackState};
pub use video::{VideoId, VideoInfo, VideoSource};
pub use window::{Rect, WindowSnapshot};
