use anyhow::{Context, Result};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use crate::events::Rect;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub logging: LoggingConfig,
    pub detection: DetectionConfig,
    pub thumbnails: ThumbnailConfig,
    pub commands: CommandConfig,
    pub island: IslandConfig,
    // Нормализованные имена браузеров - не сериализуются, строятся после загрузки
    #[serde(skip)]
    browser_set_lower: HashSet<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DetectionConfig {
    pub method: String,
    pub poll_interval_ms: u64,
    pub snapshot_timeout_ms: u64,
    pub grace_period_ms: u64,
    pub update_debounce_ms: u64,
    pub resolve_debounce_ms: u64,
    pub resolve_retry_ms: u64,
    pub screen_refresh_ms: u64,
    pub fallback_screen: Rect,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ThumbnailConfig {
    pub enabled: bool,
    #[serde(default)]
    pub api_key: Option<String>,
    pub ttl_secs: u64,
    pub capacity: usize,
    pub max_redirects: usize,
    pub request_timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CommandConfig {
    pub backend: String,
    pub cooldown_ms: u64,
    pub youtube_window_freshness_ms: u64,
    pub snapshot_freshness_ms: u64,
    pub queue_capacity: usize,
    pub command_timeout_ms: u64,
    pub browser_names: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IslandConfig {
    pub width: u32,
    pub height: u32,
    pub expanded_width: u32,
    pub expanded_height: u32,
}

impl Default for Config {
    fn default() -> Self {
        let mut config = Self {
            logging: LoggingConfig {
                level: "info".to_string(),
                format: "compact".to_string(),
            },
            detection: DetectionConfig {
                method: "auto".to_string(),
                poll_interval_ms: 400,
                snapshot_timeout_ms: 2000,
                grace_period_ms: 3000,
                update_debounce_ms: 50,
                resolve_debounce_ms: 1000,
                resolve_retry_ms: 5000,
                screen_refresh_ms: 30_000,
                fallback_screen: Rect::new(0, 0, 1920, 1080),
            },
            thumbnails: ThumbnailConfig {
                enabled: true,
                api_key: None,
                ttl_secs: 12 * 60 * 60,
                capacity: 100,
                max_redirects: 3,
                request_timeout_ms: 3000,
            },
            commands: CommandConfig {
                backend: "auto".to_string(),
                cooldown_ms: 300,
                youtube_window_freshness_ms: 15_000,
                snapshot_freshness_ms: 3000,
                queue_capacity: 16,
                command_timeout_ms: 3000,
                browser_names: ["Google Chrome", "Chromium", "Mozilla Firefox", "Firefox", "Microsoft Edge", "Brave", "Opera", "Vivaldi"]
                    .iter()
                    .map(|s| s.to_string())
                    .collect(),
            },
            island: IslandConfig {
                width: 360,
                height: 40,
                expanded_width: 620,
                expanded_height: 140,
            },
            browser_set_lower: HashSet::new(),
        };
        config.build_optimization_indexes();
        config
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(config_path: P) -> Result<Self> {
        let config_path = config_path.as_ref();

        let figment = Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file(config_path))
            .merge(Env::prefixed("ISLAND_").split("__"));

        let mut config: Config = figment
            .extract()
            .with_context(|| format!("Не удалось загрузить конфигурацию из {:?}", config_path))?;

        config.validate()?;
        config.build_optimization_indexes();

        Ok(config)
    }

    /// Строит оптимизационные индексы для быстрого поиска
    pub fn build_optimization_indexes(&mut self) {
        self.browser_set_lower = self
            .commands
            .browser_names
            .iter()
            .map(|name| name.to_lowercase())
            .collect();
    }

    pub fn validate(&self) -> Result<()> {
        // Валидация настроек логирования
        match self.logging.level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!("Неверный уровень логирования: {}", self.logging.level),
        }

        match self.logging.format.as_str() {
            "compact" | "full" => {}
            _ => anyhow::bail!("Неверный формат логирования: {}", self.logging.format),
        }

        // Валидация настроек детекции
        match self.detection.method.as_str() {
            "auto" | "xdotool" | "kdotool" | "sway" => {}
            _ => anyhow::bail!("Неверный метод детекции окон: {}", self.detection.method),
        }

        if self.detection.poll_interval_ms < 50 {
            anyhow::bail!("poll_interval_ms должно быть минимум 50");
        }

        if self.detection.snapshot_timeout_ms == 0 {
            anyhow::bail!("snapshot_timeout_ms должно быть больше 0");
        }

        if self.detection.fallback_screen.width == 0 || self.detection.fallback_screen.height == 0 {
            anyhow::bail!("fallback_screen должен иметь ненулевой размер");
        }

        // Валидация кэша миниатюр
        if self.thumbnails.capacity == 0 {
            anyhow::bail!("thumbnails.capacity должно быть больше 0");
        }

        if self.thumbnails.max_redirects > 10 {
            anyhow::bail!("thumbnails.max_redirects не может превышать 10");
        }

        // Валидация командной сессии
        match self.commands.backend.as_str() {
            "auto" | "xdotool" | "powershell" => {}
            _ => anyhow::bail!("Неверный backend команд: {}", self.commands.backend),
        }

        if self.commands.queue_capacity == 0 {
            anyhow::bail!("commands.queue_capacity должно быть больше 0");
        }

        if self.commands.command_timeout_ms == 0 {
            anyhow::bail!("commands.command_timeout_ms должно быть больше 0");
        }

        Ok(())
    }

    /// Похож ли заголовок окна на окно браузера из списка
    pub fn is_browser_title(&self, title: &str) -> bool {
        let title_lower = title.to_lowercase();
        self.browser_set_lower
            .iter()
            .any(|name| title_lower.contains(name))
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.detection.poll_interval_ms)
    }

    pub fn snapshot_timeout(&self) -> Duration {
        Duration::from_millis(self.detection.snapshot_timeout_ms)
    }

    pub fn grace_period(&self) -> Duration {
        Duration::from_millis(self.detection.grace_period_ms)
    }

    pub fn update_debounce(&self) -> Duration {
        Duration::from_millis(self.detection.update_debounce_ms)
    }

    pub fn thumbnail_ttl(&self) -> Duration {
        Duration::from_secs(self.thumbnails.ttl_secs)
    }

    pub fn command_cooldown(&self) -> Duration {
        Duration::from_millis(self.commands.cooldown_ms)
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.commands.command_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_validation() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_values_rejected() {
        let mut config = Config::default();
        config.detection.method = "magic".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.thumbnails.capacity = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.commands.backend = "applescript".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.logging.format = "json".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_is_browser_title() {
        let mut config = Config::default();
        config.commands.browser_names = vec!["Firefox".to_string()];
        config.build_optimization_indexes();

        assert!(config.is_browser_title("Some Video - YouTube — Mozilla Firefox"));
        assert!(!config.is_browser_title("nvim - file.txt"));
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let config = Config::load("/nonexistent/island-test.toml").unwrap();
        assert_eq!(config.detection.poll_interval_ms, 400);
        assert_eq!(config.thumbnails.capacity, 100);
        assert!(config.is_browser_title("Video - Google Chrome"));
    }
}
