use parking_lot::Mutex;
use std::sync::Arc;
use tracing::info;

use crate::config::IslandConfig;
use crate::events::{Dimensions, IslandEvent};
use crate::services::notifier::Notifier;

/// Режим отображения острова
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IslandMode {
    /// Компактные часы
    Clock,
    /// Развёрнутая панель с текущим видео
    Nook,
}

#[derive(Debug)]
struct IslandState {
    hidden: bool,
    mode: IslandMode,
}

/// Управляет размером и видимостью острова, отправляя события представлению
pub struct IslandPresenter {
    config: IslandConfig,
    notifier: Arc<Notifier>,
    state: Mutex<IslandState>,
}

impl IslandPresenter {
    pub fn new(config: IslandConfig, notifier: Arc<Notifier>) -> Self {
        Self {
            config,
            notifier,
            state: Mutex::new(IslandState {
                hidden: false,
                mode: IslandMode::Clock,
            }),
        }
    }

    /// Начальный показ после запуска
    pub fn announce(&self) {
        let mode = self.state.lock().mode;
        self.notifier.emit(IslandEvent::IslandShow(self.dimensions(mode)));
    }

    pub fn set_hidden(&self, hidden: bool) {
        let mode = {
            let mut state = self.state.lock();
            if state.hidden == hidden {
                return;
            }
            state.hidden = hidden;
            state.mode
        };

        let dims = self.dimensions(mode);
        if hidden {
            info!("Скрываем остров: активное окно развёрнуто");
            self.notifier.emit(IslandEvent::IslandHide(Dimensions { height: 0, expanded: false, ..dims }));
        } else {
            info!("Показываем остров");
            self.notifier.emit(IslandEvent::IslandShow(dims));
        }
    }

    pub fn set_media_present(&self, present: bool) {
        let mode = if present { IslandMode::Nook } else { IslandMode::Clock };
        let visible = {
            let mut state = self.state.lock();
            if state.mode == mode {
                return;
            }
            state.mode = mode;
            !state.hidden
        };

        // Скрытый остров применит новый режим при следующем показе
        if visible {
            self.notifier.emit(IslandEvent::IslandResize(self.dimensions(mode)));
        }
    }

    #[cfg(test)]
    pub fn mode(&self) -> IslandMode {
        self.state.lock().mode
    }

    #[cfg(test)]
    pub fn is_hidden(&self) -> bool {
        self.state.lock().hidden
    }

    fn dimensions(&self, mode: IslandMode) -> Dimensions {
        match mode {
            IslandMode::Clock => Dimensions {
                width: self.config.width,
                height: self.config.height,
                expanded: false,
            },
            IslandMode::Nook => Dimensions {
                width: self.config.expanded_width,
                height: self.config.expanded_height,
                expanded: true,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::testing::RecordingListener;

    fn presenter() -> (IslandPresenter, Arc<RecordingListener>) {
        let notifier = Arc::new(Notifier::new());
        let listener = Arc::new(RecordingListener::default());
        notifier.subscribe(listener.clone());
        (IslandPresenter::new(Config::default().island, notifier), listener)
    }

    #[test]
    fn test_media_expands_and_collapses() {
        let (island, listener) = presenter();

        island.set_media_present(true);
        island.set_media_present(true);
        island.set_media_present(false);

        assert_eq!(
            listener.events(),
            vec![
                IslandEvent::IslandResize(Dimensions { width: 620, height: 140, expanded: true }),
                IslandEvent::IslandResize(Dimensions { width: 360, height: 40, expanded: false }),
            ]
        );
    }

    #[test]
    fn test_hide_shrinks_to_zero_height_and_show_restores_mode() {
        let (island, listener) = presenter();

        island.set_hidden(true);
        island.set_media_present(true);
        island.set_hidden(false);

        assert_eq!(
            listener.events(),
            vec![
                IslandEvent::IslandHide(Dimensions { width: 360, height: 0, expanded: false }),
                IslandEvent::IslandShow(Dimensions { width: 620, height: 140, expanded: true }),
            ]
        );
        assert_eq!(island.mode(), IslandMode::Nook);
        assert!(!island.is_hidden());
    }
}
