use crate::config::Config;
use crate::error::{IslandError, Result};
use crate::events::{Rect, WindowSnapshot};
use parking_lot::RwLock;
use std::sync::Arc;
use tokio::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use super::kdotool::KdotoolReader;
use super::r#trait::WindowSnapshotProvider;
use super::sway::SwayReader;
use super::xdotool::XdotoolReader;

/// Пауза после того, как ни один метод не сработал
const PROBE_BACKOFF: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DesktopEnvironment {
    KDE,
    Sway,
    X11Generic,
    WaylandGeneric,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WorkingMethod {
    Kdotool,
    Xdotool,
    Sway,
}

impl WorkingMethod {
    fn from_config(method: &str) -> Option<Self> {
        match method {
            "kdotool" => Some(Self::Kdotool),
            "xdotool" => Some(Self::Xdotool),
            "sway" => Some(Self::Sway),
            _ => None,
        }
    }
}

impl DesktopEnvironment {
    /// Порядок проверки методов для данной среды
    fn probe_order(self) -> &'static [WorkingMethod] {
        use WorkingMethod::*;
        match self {
            DesktopEnvironment::KDE => &[Kdotool, Xdotool],
            DesktopEnvironment::Sway => &[Sway, Xdotool],
            DesktopEnvironment::X11Generic => &[Xdotool],
            DesktopEnvironment::WaylandGeneric => &[Sway, Kdotool, Xdotool],
            DesktopEnvironment::Unknown => &[Xdotool, Kdotool, Sway],
        }
    }
}

/// Чтение активного окна через системные утилиты (kdotool / xdotool / swaymsg)
pub struct SystemWindowProvider {
    desktop_env: DesktopEnvironment,
    forced_method: Option<WorkingMethod>,
    working_method: RwLock<Option<WorkingMethod>>,
    backoff_until: RwLock<Option<Instant>>,

    kdotool: KdotoolReader,
    xdotool: XdotoolReader,
    sway: SwayReader,
}

impl SystemWindowProvider {
    pub fn new(config: Arc<Config>) -> Result<Self> {
        info!("Инициализация SystemWindowProvider");

        let desktop_env = Self::detect_desktop_environment();
        info!("Обнаружена среда рабочего стола: {:?}", desktop_env);

        let forced_method = WorkingMethod::from_config(&config.detection.method);
        if let Some(method) = forced_method {
            info!("Метод детекции задан в конфигурации: {:?}", method);
        }

        let timeout = config.snapshot_timeout();
        Ok(Self {
            desktop_env,
            forced_method,
            working_method: RwLock::new(forced_method),
            backoff_until: RwLock::new(None),
            kdotool: KdotoolReader::new(timeout),
            xdotool: XdotoolReader::new(timeout),
            sway: SwayReader::new(timeout),
        })
    }

    fn detect_desktop_environment() -> DesktopEnvironment {
        if std::env::var_os("SWAYSOCK").is_some() {
            return DesktopEnvironment::Sway;
        }

        if let Ok(desktop) = std::env::var("XDG_CURRENT_DESKTOP") {
            match desktop.to_lowercase().as_str() {
                d if d.contains("kde") => return DesktopEnvironment::KDE,
                d if d.contains("sway") => return DesktopEnvironment::Sway,
                _ => {}
            }
        }

        if let Ok(session) = std::env::var("XDG_SESSION_TYPE") {
            match session.as_str() {
                "wayland" => return DesktopEnvironment::WaylandGeneric,
                "x11" => return DesktopEnvironment::X11Generic,
                _ => {}
            }
        }

        if std::env::var_os("DISPLAY").is_some() {
            return DesktopEnvironment::X11Generic;
        }

        DesktopEnvironment::Unknown
    }

    async fn test_method(&self, method: WorkingMethod) -> Result<()> {
        match method {
            WorkingMethod::Kdotool => self.kdotool.test().await,
            WorkingMethod::Xdotool => self.xdotool.test().await,
            WorkingMethod::Sway => self.sway.test().await,
        }
    }

    async fn detect_working_method(&self) -> Result<WorkingMethod> {
        info!("Определяем рабочий метод детекции окон...");

        for &method in self.desktop_env.probe_order() {
            match self.test_method(method).await {
                Ok(()) => {
                    info!("Используем {:?}", method);
                    return Ok(method);
                }
                Err(e) => debug!("Метод {:?} не работает: {}", method, e),
            }
        }

        Err(IslandError::ServiceUnavailable(
            "Ни один метод детекции окон не работает".to_string(),
        ))
    }

    async fn current_method(&self) -> Result<WorkingMethod> {
        let known = *self.working_method.read();
        if let Some(method) = known {
            return Ok(method);
        }

        let backoff = *self.backoff_until.read();
        if let Some(until) = backoff {
            if Instant::now() < until {
                return Err(IslandError::ServiceUnavailable(
                    "Детекция окон приостановлена".to_string(),
                ));
            }
        }

        match self.detect_working_method().await {
            Ok(method) => {
                *self.working_method.write() = Some(method);
                *self.backoff_until.write() = None;
                Ok(method)
            }
            Err(e) => {
                error!("Ни один метод не работает. Приостанавливаем детекцию на {:?}", PROBE_BACKOFF);
                *self.backoff_until.write() = Some(Instant::now() + PROBE_BACKOFF);
                Err(e)
            }
        }
    }

    async fn get_window_by_method(&self, method: WorkingMethod) -> Result<Option<WindowSnapshot>> {
        match method {
            WorkingMethod::Kdotool => self.kdotool.get_active_window().await,
            WorkingMethod::Xdotool => self.xdotool.get_active_window().await,
            WorkingMethod::Sway => self.sway.get_active_window().await,
        }
    }
}

impl Drop for SystemWindowProvider {
    fn drop(&mut self) {
        info!("SystemWindowProvider завершает работу");
    }
}

#[async_trait::async_trait]
impl WindowSnapshotProvider for SystemWindowProvider {
    async fn foreground_window(&self) -> Result<Option<WindowSnapshot>> {
        let method = self.current_method().await?;

        match self.get_window_by_method(method).await {
            Ok(window) => Ok(window),
            Err(e) => {
                // Заданный в конфигурации метод не переопределяем
                if self.forced_method.is_none() {
                    warn!("Рабочий метод {:?} перестал работать: {}. Переопределим на следующем тике", method, e);
                    *self.working_method.write() = None;
                }
                Err(e)
            }
        }
    }

    async fn screen_bounds(&self) -> Result<Rect> {
        let method = *self.working_method.read();
        match method {
            Some(WorkingMethod::Sway) => self.sway.output_geometry().await,
            _ => self.xdotool.display_geometry().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forced_method_parsing() {
        assert_eq!(WorkingMethod::from_config("kdotool"), Some(WorkingMethod::Kdotool));
        assert_eq!(WorkingMethod::from_config("sway"), Some(WorkingMethod::Sway));
        assert_eq!(WorkingMethod::from_config("auto"), None);
    }

    #[test]
    fn test_probe_order_prefers_native_tool() {
        assert_eq!(DesktopEnvironment::KDE.probe_order()[0], WorkingMethod::Kdotool);
        assert_eq!(DesktopEnvironment::Sway.probe_order()[0], WorkingMethod::Sway);
        assert_eq!(DesktopEnvironment::X11Generic.probe_order(), &[WorkingMethod::Xdotool]);
    }
}
