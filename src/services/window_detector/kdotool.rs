use crate::error::{IslandError, Result};
use crate::events::{Rect, WindowSnapshot};
use crate::utils::{process_name, run_session_tool};
use tokio::time::Duration;
use tracing::debug;

pub struct KdotoolReader {
    timeout: Duration,
}

impl KdotoolReader {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    async fn kdotool(&self, args: &[&str]) -> Result<String> {
        run_session_tool("kdotool", args, self.timeout).await
    }

    pub async fn test(&self) -> Result<()> {
        debug!("=== Тестируем kdotool ===");

        let window_id = self.kdotool(&["getactivewindow"]).await?;
        debug!("kdotool получил window_id: '{}'", window_id);

        self.kdotool(&["getwindowname", &window_id]).await?;

        debug!("=== kdotool работает ===");
        Ok(())
    }

    pub async fn get_active_window(&self) -> Result<Option<WindowSnapshot>> {
        // Получаем ID окна
        let window_id = self.kdotool(&["getactivewindow"]).await?;
        if window_id.is_empty() {
            return Ok(None);
        }

        // Получаем название окна по ID
        let title = self.kdotool(&["getwindowname", &window_id]).await?;
        if title.is_empty() {
            return Err(IslandError::Internal("kdotool вернул пустое название".to_string()));
        }

        let mut snapshot = WindowSnapshot::new(title);

        if let Ok(geometry) = self.kdotool(&["getwindowgeometry", &window_id]).await {
            if let Some(bounds) = parse_geometry(&geometry) {
                snapshot = snapshot.with_bounds(bounds);
            }
        }

        if let Ok(pid_str) = self.kdotool(&["getwindowpid", &window_id]).await {
            if let Ok(pid) = pid_str.parse::<u32>() {
                snapshot = snapshot.with_pid(pid);
                if let Some(name) = process_name(pid) {
                    snapshot = snapshot.with_process(name);
                }
            }
        }

        Ok(Some(snapshot))
    }
}

/// Разбор вывода `kdotool getwindowgeometry`:
/// ```text
/// Window {uuid}
///   Position: 0,27
///   Geometry: 1920x1053
/// ```
pub fn parse_geometry(output: &str) -> Option<Rect> {
    let mut position = None;
    let mut size = None;

    for line in output.lines() {
        let line = line.trim();
        if let Some(value) = line.strip_prefix("Position:") {
            let (x, y) = value.trim().split_once(',')?;
            position = Some((parse_coord(x)?, parse_coord(y)?));
        } else if let Some(value) = line.strip_prefix("Geometry:") {
            let (w, h) = value.trim().split_once('x')?;
            size = Some((parse_coord(w)?.max(0) as u32, parse_coord(h)?.max(0) as u32));
        }
    }

    let ((x, y), (width, height)) = (position?, size?);
    Some(Rect::new(x, y, width, height))
}

// KWin может отдавать дробные координаты
fn parse_coord(raw: &str) -> Option<i32> {
    raw.trim().parse::<f64>().ok().map(|v| v.round() as i32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_geometry() {
        let output = "Window {a1b2}\n  Position: 0,27\n  Geometry: 1920x1053";
        assert_eq!(parse_geometry(output), Some(Rect::new(0, 27, 1920, 1053)));

        let fractional = "Window {a1b2}\n  Position: 10.5,0\n  Geometry: 1280.4x720";
        assert_eq!(parse_geometry(fractional), Some(Rect::new(11, 0, 1280, 720)));

        assert_eq!(parse_geometry("Window {a1b2}"), None);
    }
}
