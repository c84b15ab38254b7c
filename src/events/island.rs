use serde::{Deserialize, Serialize};
use std::fmt;

use super::VideoInfo;

/// Размер острова, передаваемый слою представления
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
    pub expanded: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackState {
    Playing,
    Paused,
}

impl PlaybackState {
    pub fn toggled(self) -> Self {
        match self {
            PlaybackState::Playing => PlaybackState::Paused,
            PlaybackState::Paused => PlaybackState::Playing,
        }
    }
}

/// Команды воспроизведения от слоя представления
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MediaCommand {
    PlayPause,
    Next,
    Previous,
}

impl fmt::Display for MediaCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MediaCommand::PlayPause => "play/pause",
            MediaCommand::Next => "next",
            MediaCommand::Previous => "previous",
        };
        f.write_str(name)
    }
}

/// Уведомления для слоя представления
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IslandEvent {
    VideoInfoUpdate(Option<VideoInfo>),
    IslandShow(Dimensions),
    IslandHide(Dimensions),
    IslandResize(Dimensions),
    PlaybackStateUpdate(Option<PlaybackState>),
}

impl fmt::Display for IslandEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IslandEvent::VideoInfoUpdate(Some(info)) => write!(f, "video-info: {}", info),
            IslandEvent::VideoInfoUpdate(None) => write!(f, "video-info: none"),
            IslandEvent::IslandShow(d) => write!(f, "island-show: {}x{}", d.width, d.height),
            IslandEvent::IslandHide(d) => write!(f, "island-hide: {}x{}", d.width, d.height),
            IslandEvent::IslandResize(d) => write!(f, "island-resize: {}x{}", d.width, d.height),
            IslandEvent::PlaybackStateUpdate(state) => write!(f, "playback: {:?}", state),
        }
    }
}
