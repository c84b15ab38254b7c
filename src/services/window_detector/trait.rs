use crate::config::Config;
use crate::error::Result;
use crate::events::{Rect, WindowSnapshot};
use std::sync::Arc;

/// Источник снимков активного окна
#[async_trait::async_trait]
pub trait WindowSnapshotProvider: Send + Sync {
    /// Текущее активное окно; `None`, если фокуса нет
    async fn foreground_window(&self) -> Result<Option<WindowSnapshot>>;

    /// Геометрия основного экрана
    async fn screen_bounds(&self) -> Result<Rect>;
}

/// Factory function to create an appropriate window provider based on the dry_run flag
pub fn create_window_provider(
    config: Arc<Config>,
    dry_run: bool,
) -> Result<Arc<dyn WindowSnapshotProvider>> {
    if dry_run {
        Ok(Arc::new(super::dry_run::DryRunProvider::new(
            config.detection.fallback_screen,
        )))
    } else {
        Ok(Arc::new(super::window_detector::SystemWindowProvider::new(config)?))
    }
}
