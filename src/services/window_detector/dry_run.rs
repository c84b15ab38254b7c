use crate::error::Result;
use crate::events::{Rect, WindowSnapshot};
use tokio::time::{Duration, Instant};
use tracing::info;

use super::r#trait::WindowSnapshotProvider;

const SWITCH_PERIOD: Duration = Duration::from_secs(10);

/// Эмуляция смены окон без обращения к системе
pub struct DryRunProvider {
    screen: Rect,
    windows: Vec<WindowSnapshot>,
    started: Instant,
}

impl DryRunProvider {
    pub fn new(screen: Rect) -> Self {
        info!("Dry-run режим - детекция окон работает в режиме эмуляции");

        let normal = Rect::new(screen.x + 200, screen.y + 100, screen.width / 2, screen.height / 2);
        let windows = vec![
            WindowSnapshot::new("Never Gonna Give You Up - YouTube - Google Chrome")
                .with_url("https://www.youtube.com/watch?v=dQw4w9WgXcQ")
                .with_process("chrome")
                .with_bounds(normal),
            WindowSnapshot::new("(2) Lo-fi Beats to Relax - YouTube — Mozilla Firefox")
                .with_process("firefox")
                .with_bounds(normal),
            WindowSnapshot::new("Terminal - dry_run")
                .with_process("konsole")
                .with_bounds(normal),
            WindowSnapshot::new("Game - dry_run")
                .with_process("game")
                .with_bounds(screen),
        ];

        Self {
            screen,
            windows,
            started: Instant::now(),
        }
    }

    fn current_index(&self) -> usize {
        let elapsed = self.started.elapsed().as_millis() / SWITCH_PERIOD.as_millis();
        (elapsed % self.windows.len() as u128) as usize
    }
}

#[async_trait::async_trait]
impl WindowSnapshotProvider for DryRunProvider {
    async fn foreground_window(&self) -> Result<Option<WindowSnapshot>> {
        Ok(self.windows.get(self.current_index()).cloned())
    }

    async fn screen_bounds(&self) -> Result<Rect> {
        Ok(self.screen)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_dry_run_cycles_windows() {
        let screen = Rect::new(0, 0, 1920, 1080);
        let provider = DryRunProvider::new(screen);

        let first = provider.foreground_window().await.unwrap().unwrap();
        assert!(first.title.contains("Never Gonna Give You Up"));

        tokio::time::advance(SWITCH_PERIOD).await;
        let second = provider.foreground_window().await.unwrap().unwrap();
        assert!(second.title.starts_with("(2) Lo-fi"));

        tokio::time::advance(SWITCH_PERIOD * 2).await;
        let game = provider.foreground_window().await.unwrap().unwrap();
        assert_eq!(game.bounds, screen);
        assert_eq!(provider.screen_bounds().await.unwrap(), screen);
    }
}
