use crate::error::{IslandError, Result};
use crate::events::{Rect, WindowSnapshot};
use crate::utils::{process_name, run_tool};
use tokio::time::Duration;
use tracing::debug;

pub struct XdotoolReader {
    timeout: Duration,
}

impl XdotoolReader {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub async fn test(&self) -> Result<()> {
        run_tool("xdotool", &["getactivewindow", "getwindowname"], self.timeout).await?;
        Ok(())
    }

    pub async fn get_active_window(&self) -> Result<Option<WindowSnapshot>> {
        debug!("Попытка получить активное окно через xdotool");

        // Цепочка команд xdotool: заголовок и геометрия одним вызовом
        let output = run_tool(
            "xdotool",
            &["getactivewindow", "getwindowname", "getwindowgeometry", "--shell"],
            self.timeout,
        )
        .await?;

        let Some((title, geometry)) = output.split_once('\n') else {
            return Ok(None);
        };
        let title = title.trim().to_string();
        if title.is_empty() {
            return Ok(None);
        }
        debug!("xdotool получил заголовок окна: '{}'", title);

        let bounds = parse_shell_geometry(geometry).unwrap_or_default();
        let mut snapshot = WindowSnapshot::new(title).with_bounds(bounds);

        // У части окон нет _NET_WM_PID - это не ошибка
        if let Ok(pid_str) = run_tool("xdotool", &["getactivewindow", "getwindowpid"], self.timeout).await {
            if let Ok(pid) = pid_str.parse::<u32>() {
                snapshot = snapshot.with_pid(pid);
                if let Some(name) = process_name(pid) {
                    snapshot = snapshot.with_process(name);
                }
            }
        }

        Ok(Some(snapshot))
    }

    pub async fn display_geometry(&self) -> Result<Rect> {
        let output = run_tool("xdotool", &["getdisplaygeometry"], self.timeout).await?;
        parse_display_geometry(&output)
            .ok_or_else(|| IslandError::Internal(format!("Не удалось разобрать геометрию экрана: '{}'", output)))
    }
}

/// Разбор вывода `getwindowgeometry --shell` (X=, Y=, WIDTH=, HEIGHT=)
pub fn parse_shell_geometry(output: &str) -> Option<Rect> {
    let mut rect = Rect::default();
    let mut seen = 0;
    for line in output.lines() {
        let Some((key, value)) = line.trim().split_once('=') else {
            continue;
        };
        match key {
            "X" => rect.x = value.parse().ok()?,
            "Y" => rect.y = value.parse().ok()?,
            "WIDTH" => rect.width = value.parse().ok()?,
            "HEIGHT" => rect.height = value.parse().ok()?,
            _ => continue,
        }
        seen += 1;
    }
    (seen == 4).then_some(rect)
}

/// Разбор вывода `getdisplaygeometry` ("1920 1080")
pub fn parse_display_geometry(output: &str) -> Option<Rect> {
    let mut parts = output.split_whitespace();
    let width = parts.next()?.parse().ok()?;
    let height = parts.next()?.parse().ok()?;
    Some(Rect::new(0, 0, width, height))
}
