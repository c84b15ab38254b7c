use crate::config::Config;
use crate::events::{IslandEvent, MediaCommand};
use crate::services::notifier::Notifier;
use crate::services::window_tracker::{CommandTarget, WindowTracker};
use parking_lot::Mutex;
use smallvec::SmallVec;
use std::sync::Arc;
use tokio::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::executor::CommandExecutor;
use super::session::CommandRunner;

/// Чем закончилась отправка команды
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Отброшена: не истекла пауза между командами
    Throttled,
    /// Окно активировано и получило горячую клавишу YouTube
    Shortcut { activated_by: String },
    /// Отправлена системная медиаклавиша
    MediaKey,
    Failed,
}

pub struct MediaCommandDispatcher {
    config: Arc<Config>,
    executor: Arc<dyn CommandExecutor>,
    runner: Arc<dyn CommandRunner>,
    tracker: Arc<WindowTracker>,
    notifier: Arc<Notifier>,
    last_dispatch: Mutex<Option<Instant>>,
}

impl MediaCommandDispatcher {
    pub fn new(
        config: Arc<Config>,
        executor: Arc<dyn CommandExecutor>,
        runner: Arc<dyn CommandRunner>,
        tracker: Arc<WindowTracker>,
        notifier: Arc<Notifier>,
    ) -> Self {
        Self {
            config,
            executor,
            runner,
            tracker,
            notifier,
            last_dispatch: Mutex::new(None),
        }
    }

    pub async fn dispatch(&self, command: MediaCommand) -> DispatchOutcome {
        let now = Instant::now();
        if !self.try_acquire_slot(now) {
            debug!("Команда {} отброшена: пауза между командами", command);
            return DispatchOutcome::Throttled;
        }

        info!("Команда воспроизведения: {}", command);

        let outcome = match self.youtube_target(now) {
            Some(target) => self.send_to_window(&target, command).await,
            None => self.send_media_key(command).await,
        };

        if command == MediaCommand::PlayPause && outcome != DispatchOutcome::Failed {
            let state = self.tracker.toggle_playback();
            self.notifier.emit(IslandEvent::PlaybackStateUpdate(Some(state)));
        }

        outcome
    }

    /// Общая пауза для всех команд; занимает слот, если он свободен
    fn try_acquire_slot(&self, now: Instant) -> bool {
        let mut last = self.last_dispatch.lock();
        if let Some(previous) = *last {
            if now.saturating_duration_since(previous) < self.config.command_cooldown() {
                return false;
            }
        }
        *last = Some(now);
        true
    }

    fn youtube_target(&self, now: Instant) -> Option<CommandTarget> {
        let commands = &self.config.commands;
        let target = self.tracker.command_target(
            now,
            Duration::from_millis(commands.youtube_window_freshness_ms),
            Duration::from_millis(commands.snapshot_freshness_ms),
        )?;

        let youtube_like = target.title.to_lowercase().contains("youtube")
            || self.tracker.current_source_is_youtube();
        youtube_like.then_some(target)
    }

    async fn send_to_window(&self, target: &CommandTarget, command: MediaCommand) -> DispatchOutcome {
        let mut attempts: SmallVec<[(String, String); 6]> = SmallVec::new();

        // Фокус мог быть на самом острове: такое окно не активируем
        let browser_window = target.title.to_lowercase().contains("youtube")
            || self.config.is_browser_title(&target.title);
        if browser_window {
            if let Some(pid) = target.process_id {
                attempts.push((format!("pid {}", pid), self.executor.activate_by_pid(pid)));
            }
            if !target.title.is_empty() {
                attempts.push((format!("заголовок '{}'", target.title), self.executor.activate_by_title(&target.title)));
            }
        }
        attempts.push(("YouTube".to_string(), self.executor.activate_by_title("YouTube")));
        for browser in &self.config.commands.browser_names {
            attempts.push((browser.clone(), self.executor.activate_by_title(browser)));
        }

        for (label, script) in attempts {
            match self.runner.run(script).await {
                Ok(true) => {
                    debug!("Окно активировано: {}", label);
                    return match self.runner.run(self.executor.send_shortcut(command)).await {
                        Ok(true) => DispatchOutcome::Shortcut { activated_by: label },
                        Ok(false) => {
                            warn!("Горячая клавиша для {} завершилась с ошибкой", command);
                            DispatchOutcome::Failed
                        }
                        Err(e) => {
                            warn!("Не удалось отправить горячую клавишу: {}", e);
                            DispatchOutcome::Failed
                        }
                    };
                }
                Ok(false) => debug!("Активация не удалась: {}", label),
                Err(e) => debug!("Активация {} вернула ошибку: {}", label, e),
            }
        }

        info!("Окно YouTube активировать не удалось, используем медиаклавишу");
        self.send_media_key(command).await
    }

    async fn send_media_key(&self, command: MediaCommand) -> DispatchOutcome {
        match self.runner.run(self.executor.media_key(command)).await {
            Ok(true) => DispatchOutcome::MediaKey,
            Ok(false) => {
                warn!("Медиаклавиша {} завершилась с ошибкой", command);
                DispatchOutcome::Failed
            }
            Err(e) => {
                warn!("Не удалось отправить медиаклавишу: {}", e);
                DispatchOutcome::Failed
            }
        }
    }
}
