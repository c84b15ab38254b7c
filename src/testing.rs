//! Test doubles shared by unit tests across services.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::time::Duration;

use crate::error::{IslandError, Result};
use crate::events::{IslandEvent, Rect, WindowSnapshot};
use crate::services::command_dispatcher::CommandRunner;
use crate::services::notifier::IslandListener;
use crate::services::thumbnail_resolver::HttpFetcher;
use crate::services::window_detector::WindowSnapshotProvider;

enum FetchReply {
    Text(String),
    Json(Value),
    Fail,
}

/// HTTP без сети: фиксированный ответ, счётчик и журнал запросов
pub struct FakeFetcher {
    reply: FetchReply,
    delay: Option<Duration>,
    calls: AtomicUsize,
    urls: Mutex<Vec<String>>,
}

impl FakeFetcher {
    fn new(reply: FetchReply) -> Self {
        Self {
            reply,
            delay: None,
            calls: AtomicUsize::new(0),
            urls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_text(text: &str) -> Self {
        Self::new(FetchReply::Text(text.to_string()))
    }

    pub fn with_json(body: Value) -> Self {
        Self::new(FetchReply::Json(body))
    }

    pub fn failing() -> Self {
        Self::new(FetchReply::Fail)
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn urls(&self) -> Vec<String> {
        self.urls.lock().clone()
    }

    async fn record(&self, url: &str) {
        // Считаем до задержки, чтобы параллельные вызовы были видны сразу
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.urls.lock().push(url.to_string());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl HttpFetcher for FakeFetcher {
    async fn get_json(&self, url: &str) -> Result<Value> {
        self.record(url).await;
        match &self.reply {
            FetchReply::Json(body) => Ok(body.clone()),
            FetchReply::Text(text) => Ok(serde_json::from_str(text)?),
            FetchReply::Fail => Err(IslandError::ServiceUnavailable("сеть недоступна".to_string())),
        }
    }

    async fn get_text(&self, url: &str) -> Result<String> {
        self.record(url).await;
        match &self.reply {
            FetchReply::Text(text) => Ok(text.clone()),
            FetchReply::Json(body) => Ok(body.to_string()),
            FetchReply::Fail => Err(IslandError::ServiceUnavailable("сеть недоступна".to_string())),
        }
    }
}

/// Слушатель, запоминающий все события
#[derive(Default)]
pub struct RecordingListener {
    events: Mutex<Vec<IslandEvent>>,
}

impl RecordingListener {
    pub fn events(&self) -> Vec<IslandEvent> {
        self.events.lock().clone()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl IslandListener for RecordingListener {
    fn on_event(&self, event: &IslandEvent) {
        self.events.lock().push(event.clone());
    }
}

/// Управляемый источник окон
pub struct ScriptedProvider {
    window: Mutex<Option<WindowSnapshot>>,
    screen: Rect,
    failing: Mutex<bool>,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl ScriptedProvider {
    pub fn new(screen: Rect) -> Self {
        Self {
            window: Mutex::new(None),
            screen,
            failing: Mutex::new(false),
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn set_window(&self, window: Option<WindowSnapshot>) {
        *self.window.lock() = window;
    }

    pub fn set_failing(&self, failing: bool) {
        *self.failing.lock() = failing;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WindowSnapshotProvider for ScriptedProvider {
    async fn foreground_window(&self) -> Result<Option<WindowSnapshot>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if *self.failing.lock() {
            return Err(IslandError::ServiceUnavailable("нет доступа к окнам".to_string()));
        }
        Ok(self.window.lock().clone())
    }

    async fn screen_bounds(&self) -> Result<Rect> {
        Ok(self.screen)
    }
}

/// Исполнитель команд, записывающий скрипты вместо запуска
pub struct RecordingRunner {
    results: Mutex<VecDeque<bool>>,
    fail_activation: bool,
    scripts: Mutex<Vec<String>>,
}

impl RecordingRunner {
    pub fn succeeding() -> Self {
        Self::with_results(Vec::new())
    }

    /// Заданные результаты по порядку, дальше всё успешно
    pub fn with_results(results: Vec<bool>) -> Self {
        Self {
            results: Mutex::new(results.into()),
            fail_activation: false,
            scripts: Mutex::new(Vec::new()),
        }
    }

    /// Любая активация окна не удаётся, остальное успешно
    pub fn failing_activation() -> Self {
        Self {
            fail_activation: true,
            ..Self::succeeding()
        }
    }

    pub fn scripts(&self) -> Vec<String> {
        self.scripts.lock().clone()
    }
}

#[async_trait]
impl CommandRunner for RecordingRunner {
    async fn run(&self, script: String) -> Result<bool> {
        let activation = script.contains("windowactivate") || script.contains("AppActivate");
        self.scripts.lock().push(script);
        if self.fail_activation && activation {
            return Ok(false);
        }
        Ok(self.results.lock().pop_front().unwrap_or(true))
    }
}
