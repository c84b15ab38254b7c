use parking_lot::RwLock;
use tokio::time::{Duration, Instant};

use crate::events::{PlaybackState, VideoInfo, VideoSource, WindowSnapshot};

/// WindowTracker holds the coordination state shared between detection and
/// command dispatch.
///
/// Responsibilities (strict):
/// - Only DetectionLoop mutates the current video and window history.
/// - MediaCommandDispatcher reads it to pick a command target and toggles playback.
/// - No classification or timing decisions live here; callers pass `now`.
#[derive(Default)]
pub struct WindowTracker {
    current_video: RwLock<Option<VideoInfo>>,
    playback: RwLock<Option<PlaybackState>>,
    last_snapshot: RwLock<Option<(WindowSnapshot, Instant)>>,
    last_youtube: RwLock<Option<LastKnownWindow>>,
}

/// Последнее окно с YouTube: запасная цель, когда фокус ушёл на сам остров
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LastKnownWindow {
    pub title: String,
    pub process_id: Option<u32>,
    pub captured_at: Instant,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandTarget {
    pub title: String,
    pub process_id: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoChange {
    Unchanged,
    Appeared,
    Changed,
}

impl WindowTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current_video(&self) -> Option<VideoInfo> {
        self.current_video.read().clone()
    }

    pub fn current_source_is_youtube(&self) -> bool {
        self.current_video
            .read()
            .as_ref()
            .is_some_and(|v| v.source == VideoSource::Youtube)
    }

    /// Заменить текущее видео, если изменилось хоть одно значимое поле
    pub fn replace_video(&self, info: VideoInfo) -> VideoChange {
        let mut current = self.current_video.write();
        match current.as_ref() {
            Some(existing) if *existing == info => VideoChange::Unchanged,
            Some(_) => {
                *current = Some(info);
                VideoChange::Changed
            }
            None => {
                *current = Some(info);
                VideoChange::Appeared
            }
        }
    }

    /// Изменить текущее видео на месте; `f` возвращает true, если что-то поменял
    pub fn update_video<F>(&self, f: F) -> bool
    where
        F: FnOnce(&mut VideoInfo) -> bool,
    {
        match self.current_video.write().as_mut() {
            Some(video) => f(video),
            None => false,
        }
    }

    pub fn clear_video(&self) -> bool {
        self.current_video.write().take().is_some()
    }

    #[cfg(test)]
    pub fn playback(&self) -> Option<PlaybackState> {
        *self.playback.read()
    }

    pub fn set_playback(&self, state: Option<PlaybackState>) -> bool {
        let mut playback = self.playback.write();
        if *playback == state {
            return false;
        }
        *playback = state;
        true
    }

    /// Переключить воспроизведение; без известного состояния считаем, что играло
    pub fn toggle_playback(&self) -> PlaybackState {
        let mut playback = self.playback.write();
        let next = playback.unwrap_or(PlaybackState::Playing).toggled();
        *playback = Some(next);
        next
    }

    pub fn record_snapshot(&self, snapshot: WindowSnapshot, now: Instant) {
        *self.last_snapshot.write() = Some((snapshot, now));
    }

    pub fn remember_youtube_window(&self, snapshot: &WindowSnapshot, now: Instant) {
        *self.last_youtube.write() = Some(LastKnownWindow {
            title: snapshot.title.clone(),
            process_id: snapshot.process_id,
            captured_at: now,
        });
    }

    /// Цель команды: свежее окно YouTube, затем свежий снимок, иначе ничего.
    /// Просроченные записи молча игнорируются.
    pub fn command_target(
        &self,
        now: Instant,
        youtube_freshness: Duration,
        snapshot_freshness: Duration,
    ) -> Option<CommandTarget> {
        if let Some(window) = self.last_youtube.read().as_ref() {
            if now.saturating_duration_since(window.captured_at) < youtube_freshness {
                return Some(CommandTarget {
                    title: window.title.clone(),
                    process_id: window.process_id,
                });
            }
        }

        if let Some((snapshot, captured_at)) = self.last_snapshot.read().as_ref() {
            if now.saturating_duration_since(*captured_at) < snapshot_freshness {
                return Some(CommandTarget {
                    title: snapshot.title.clone(),
                    process_id: snapshot.process_id,
                });
            }
        }

        None
    }
}
