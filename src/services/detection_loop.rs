//! DetectionService: the polling loop behind the island.
//!
//! Every tick reads the foreground window, updates the hide/show state from
//! its bounds, classifies it and reconciles the result with the current
//! video. Updates reach listeners through a short coalescing delay. Title-only
//! YouTube detections are enriched by the ThumbnailResolver in the background.
//!
//! No tick failure ends the loop: provider errors and timeouts are logged and
//! the next tick runs as usual.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::{interval, timeout, Duration, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::events::{IslandEvent, PlaybackState, Rect, VideoInfo, VideoSource, WindowSnapshot};
use crate::services::classifier::classify;
use crate::services::island::IslandPresenter;
use crate::services::maximization::{is_fullscreen_like, MaximizationMonitor};
use crate::services::notifier::Notifier;
use crate::services::thumbnail_resolver::{ResolvedThumbnail, ThumbnailResolver};
use crate::services::window_detector::WindowSnapshotProvider;
use crate::services::window_tracker::{VideoChange, WindowTracker};
use crate::trace_if_enabled;

pub struct DetectionService {
    inner: Arc<DetectionInner>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

struct DetectionInner {
    config: Arc<Config>,
    provider: Arc<dyn WindowSnapshotProvider>,
    resolver: Arc<ThumbnailResolver>,
    tracker: Arc<WindowTracker>,
    island: Arc<IslandPresenter>,
    notifier: Arc<Notifier>,
    check_requested: Notify,
    ticking: AtomicBool,
    state: Mutex<LoopState>,
}

#[derive(Default)]
struct LoopState {
    maximization: MaximizationMonitor,
    screen: Option<(Rect, Instant)>,
    last_positive: Option<Instant>,
    /// Последнее значение, отправленное слушателям
    last_emitted: Option<Option<VideoInfo>>,
    emit_scheduled: bool,
    resolution: ResolutionState,
}

/// Дебаунс поиска миниатюр для текущего заголовка
#[derive(Default)]
struct ResolutionState {
    title: Option<String>,
    queued_at: Option<Instant>,
    last_attempt: Option<Instant>,
}

/// Сбрасывает флаг тика при выходе из любой ветки
struct TickGuard<'a>(&'a AtomicBool);

impl Drop for TickGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl DetectionService {
    pub fn new(
        config: Arc<Config>,
        provider: Arc<dyn WindowSnapshotProvider>,
        resolver: Arc<ThumbnailResolver>,
        tracker: Arc<WindowTracker>,
        island: Arc<IslandPresenter>,
        notifier: Arc<Notifier>,
    ) -> Self {
        Self {
            inner: Arc::new(DetectionInner {
                config,
                provider,
                resolver,
                tracker,
                island,
                notifier,
                check_requested: Notify::new(),
                ticking: AtomicBool::new(false),
                state: Mutex::new(LoopState::default()),
            }),
            handle: Mutex::new(None),
        }
    }

    pub fn start(&self) {
        let mut handle = self.handle.lock();
        if handle.as_ref().is_some_and(|h| !h.is_finished()) {
            warn!("DetectionService уже запущен");
            return;
        }

        let inner = self.inner.clone();
        *handle = Some(tokio::spawn(async move { inner.run().await }));
    }

    pub fn stop(&self) {
        if let Some(handle) = self.handle.lock().take() {
            info!("Остановка DetectionService");
            handle.abort();
        }
    }

    /// Остановить цикл и дождаться завершения задачи
    pub async fn shutdown(&self) {
        let handle = self.handle.lock().take();
        if let Some(handle) = handle {
            info!("Остановка DetectionService");
            handle.abort();
            let _ = handle.await;
        }
    }

    #[cfg(test)]
    pub fn is_running(&self) -> bool {
        self.handle.lock().as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Внеочередная проверка активного окна
    pub fn request_check(&self) {
        self.inner.check_requested.notify_one();
    }

    /// Один тик опроса; параллельный вызов пропускается
    #[cfg(test)]
    pub async fn tick(&self) {
        self.inner.tick().await;
    }
}

impl Drop for DetectionService {
    fn drop(&mut self) {
        self.stop();
    }
}

impl DetectionInner {
    async fn run(self: Arc<Self>) {
        info!(
            "DetectionService запущен: интервал {:?}, grace {:?}",
            self.config.poll_interval(),
            self.config.grace_period()
        );

        let mut ticker = interval(self.config.poll_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = self.check_requested.notified() => {
                    debug!("Внеочередная проверка окна");
                }
            }
            self.tick().await;
        }
    }

    async fn tick(self: &Arc<Self>) {
        if self.ticking.swap(true, Ordering::AcqRel) {
            trace_if_enabled!("Предыдущий тик ещё выполняется, пропускаем");
            return;
        }
        let _guard = TickGuard(&self.ticking);

        let limit = self.config.snapshot_timeout();
        let snapshot = match timeout(limit, self.provider.foreground_window()).await {
            Ok(Ok(snapshot)) => snapshot,
            Ok(Err(e)) => {
                debug!("Не удалось получить активное окно: {}", e);
                return;
            }
            Err(_) => {
                warn!("Получение активного окна превысило {:?}", limit);
                return;
            }
        };

        // Нет окна в фокусе - временная ситуация, состояние не трогаем
        let Some(snapshot) = snapshot else {
            return;
        };

        let now = Instant::now();
        self.update_visibility(&snapshot, now).await;
        self.tracker.record_snapshot(snapshot.clone(), now);

        let info = classify(&snapshot);
        if info.is_video {
            self.on_video(info, &snapshot, now);
        } else {
            self.on_absence(now);
        }
    }

    async fn screen_bounds(&self, now: Instant) -> Rect {
        let refresh = Duration::from_millis(self.config.detection.screen_refresh_ms);
        let cached = self.state.lock().screen;
        if let Some((rect, at)) = cached {
            if now.saturating_duration_since(at) < refresh {
                return rect;
            }
        }

        let rect = match timeout(self.config.snapshot_timeout(), self.provider.screen_bounds()).await {
            Ok(Ok(rect)) if rect.width > 0 && rect.height > 0 => rect,
            Ok(Ok(rect)) => {
                debug!("Некорректная геометрия экрана {}, используем запасную", rect);
                self.config.detection.fallback_screen
            }
            Ok(Err(e)) => {
                debug!("Не удалось получить геометрию экрана: {}", e);
                self.config.detection.fallback_screen
            }
            Err(_) => self.config.detection.fallback_screen,
        };

        self.state.lock().screen = Some((rect, now));
        rect
    }

    async fn update_visibility(&self, snapshot: &WindowSnapshot, now: Instant) {
        let screen = self.screen_bounds(now).await;
        let fullscreen = is_fullscreen_like(&snapshot.bounds, &screen);

        let flip = self.state.lock().maximization.observe(fullscreen);
        if let Some(hidden) = flip {
            debug!("Окно {} на экране {}: развёрнуто = {}", snapshot.bounds, screen, hidden);
            self.island.set_hidden(hidden);
        }
    }

    fn on_video(self: &Arc<Self>, mut info: VideoInfo, snapshot: &WindowSnapshot, now: Instant) {
        // Уже найденный id не должен затираться следующим тиком
        if info.needs_resolution() {
            if let Some(hit) = self.resolver.cached(&info.title) {
                info = info.with_resolution(&hit.video_id, &hit.thumbnail_url);
            }
        }

        self.state.lock().last_positive = Some(now);
        if info.source == VideoSource::Youtube {
            self.tracker.remember_youtube_window(snapshot, now);
        }

        let needs_resolution = info.needs_resolution();
        let title = info.title.clone();

        match self.tracker.replace_video(info) {
            VideoChange::Unchanged => {}
            VideoChange::Appeared => {
                info!("Обнаружено видео: {}", title);
                if self.tracker.set_playback(Some(PlaybackState::Playing)) {
                    self.notifier
                        .emit(IslandEvent::PlaybackStateUpdate(Some(PlaybackState::Playing)));
                }
                self.schedule_emit();
            }
            VideoChange::Changed => {
                info!("Видео изменилось: {}", title);
                self.schedule_emit();
            }
        }

        if needs_resolution {
            self.maybe_resolve(title, now);
        }
    }

    fn on_absence(self: &Arc<Self>, now: Instant) {
        if self.tracker.current_video().is_none() {
            return;
        }

        let last_positive = self.state.lock().last_positive;
        let within_grace = last_positive
            .is_some_and(|at| now.saturating_duration_since(at) < self.config.grace_period());
        if within_grace {
            trace_if_enabled!("Видео не в фокусе, ждём окончания grace-периода");
            return;
        }

        info!("Видео больше не активно, очищаем состояние");
        self.tracker.clear_video();
        {
            let mut state = self.state.lock();
            state.last_positive = None;
            state.resolution = ResolutionState::default();
        }

        if self.tracker.set_playback(None) {
            self.notifier.emit(IslandEvent::PlaybackStateUpdate(None));
        }
        self.schedule_emit();
    }

    /// Запланировать одну отправку текущего видео после короткой задержки
    fn schedule_emit(self: &Arc<Self>) {
        {
            let mut state = self.state.lock();
            if state.emit_scheduled {
                return;
            }
            state.emit_scheduled = true;
        }

        let inner = self.clone();
        let delay = self.config.update_debounce();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            inner.flush_update();
        });
    }

    fn flush_update(&self) {
        let current = self.tracker.current_video();
        {
            let mut state = self.state.lock();
            state.emit_scheduled = false;
            if state.last_emitted.as_ref() == Some(&current) {
                return;
            }
            state.last_emitted = Some(current.clone());
        }

        self.island.set_media_present(current.is_some());
        self.notifier.emit(IslandEvent::VideoInfoUpdate(current));
    }

    fn maybe_resolve(self: &Arc<Self>, title: String, now: Instant) {
        let debounce = Duration::from_millis(self.config.detection.resolve_debounce_ms);
        let retry = Duration::from_millis(self.config.detection.resolve_retry_ms);

        {
            let mut state = self.state.lock();
            let resolution = &mut state.resolution;

            if resolution.title.as_deref() != Some(title.as_str()) {
                // Новый заголовок: дебаунс начинается заново
                resolution.title = Some(title.clone());
                resolution.queued_at = Some(now);
                resolution.last_attempt = None;
            }

            let settled = resolution
                .queued_at
                .is_some_and(|at| now.saturating_duration_since(at) >= debounce);
            let retry_due = resolution
                .last_attempt
                .map_or(true, |at| now.saturating_duration_since(at) >= retry);

            if !settled || !retry_due || self.resolver.is_in_flight(&title) {
                return;
            }
            resolution.last_attempt = Some(now);
        }

        debug!("Ищем миниатюру для '{}'", title);
        let inner = self.clone();
        tokio::spawn(async move {
            if let Some(resolved) = inner.resolver.resolve(&title).await {
                inner.apply_resolution(&title, resolved);
            }
        });
    }

    fn apply_resolution(self: &Arc<Self>, title: &str, resolved: ResolvedThumbnail) {
        let applied = self.tracker.update_video(|video| {
            if !video.needs_resolution() || video.title != title {
                return false;
            }
            *video = video.clone().with_resolution(&resolved.video_id, &resolved.thumbnail_url);
            true
        });

        if applied {
            info!("Миниатюра применена для '{}': {}", title, resolved.video_id);
            self.schedule_emit();
        } else {
            debug!("Результат поиска для '{}' устарел, отбрасываем", title);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{Dimensions, VideoId};
    use crate::testing::{FakeFetcher, RecordingListener, ScriptedProvider};

    const SCREEN: Rect = Rect::new(0, 0, 1920, 1080);
    const NORMAL: Rect = Rect::new(200, 100, 960, 540);
    const SEARCH_PAGE: &str = r#"{"videoRenderer":{"videoId":"abcDEF12345"}}"#;

    struct Fixture {
        service: DetectionService,
        provider: Arc<ScriptedProvider>,
        fetcher: Arc<FakeFetcher>,
        tracker: Arc<WindowTracker>,
        listener: Arc<RecordingListener>,
    }

    fn fixture_with(provider: ScriptedProvider, fetcher: FakeFetcher) -> Fixture {
        let config = Arc::new(Config::default());
        let provider = Arc::new(provider);
        let fetcher = Arc::new(fetcher);
        let notifier = Arc::new(Notifier::new());
        let listener = Arc::new(RecordingListener::default());
        notifier.subscribe(listener.clone());

        let tracker = Arc::new(WindowTracker::new());
        let island = Arc::new(IslandPresenter::new(config.island.clone(), notifier.clone()));
        let resolver = Arc::new(ThumbnailResolver::new(&config, fetcher.clone()));

        let service = DetectionService::new(
            config,
            provider.clone(),
            resolver,
            tracker.clone(),
            island,
            notifier,
        );
        Fixture { service, provider, fetcher, tracker, listener }
    }

    fn fixture() -> Fixture {
        fixture_with(ScriptedProvider::new(SCREEN), FakeFetcher::with_text(SEARCH_PAGE))
    }

    fn rickroll() -> WindowSnapshot {
        WindowSnapshot::new("Never Gonna Give You Up - YouTube")
            .with_url("https://youtube.com/watch?v=dQw4w9WgXcQ")
            .with_bounds(NORMAL)
    }

    fn video_updates(listener: &RecordingListener) -> Vec<Option<VideoInfo>> {
        listener
            .events()
            .into_iter()
            .filter_map(|event| match event {
                IslandEvent::VideoInfoUpdate(info) => Some(info),
                _ => None,
            })
            .collect()
    }

    /// Дать отработать отложенной отправке
    async fn settle() {
        tokio::time::sleep(Duration::from_millis(60)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_youtube_window_end_to_end() {
        let f = fixture();
        f.provider.set_window(Some(rickroll()));

        f.service.tick().await;
        settle().await;

        let current = f.tracker.current_video().unwrap();
        assert_eq!(current.title, "Never Gonna Give You Up");
        assert_eq!(current.video_id, VideoId::Known("dQw4w9WgXcQ".to_string()));
        assert_eq!(
            current.thumbnail.as_deref(),
            Some("https://img.youtube.com/vi/dQw4w9WgXcQ/mqdefault.jpg")
        );

        let events = f.listener.events();
        assert!(events.contains(&IslandEvent::PlaybackStateUpdate(Some(PlaybackState::Playing))));
        assert!(events.contains(&IslandEvent::IslandResize(Dimensions { width: 620, height: 140, expanded: true })));
        assert_eq!(video_updates(&f.listener), vec![Some(current)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rapid_ticks_coalesce_into_one_update() {
        let f = fixture();
        f.provider.set_window(Some(rickroll()));

        f.service.tick().await;
        f.provider.set_window(Some(
            WindowSnapshot::new("Other Song - YouTube")
                .with_url("https://www.youtube.com/watch?v=abcDEF12345")
                .with_bounds(NORMAL),
        ));
        f.service.tick().await;
        settle().await;

        let updates = video_updates(&f.listener);
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].as_ref().unwrap().title, "Other Song");

        // Повторный тик с тем же окном ничего не отправляет
        f.service.tick().await;
        settle().await;
        assert_eq!(video_updates(&f.listener).len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_grace_period_before_clearing() {
        let f = fixture();
        f.provider.set_window(Some(rickroll()));
        f.service.tick().await;
        settle().await;

        // Фокус ушёл на терминал на короткое время
        f.provider.set_window(Some(WindowSnapshot::new("Terminal").with_bounds(NORMAL)));
        tokio::time::advance(Duration::from_secs(1)).await;
        f.service.tick().await;
        settle().await;
        assert!(f.tracker.current_video().is_some());

        tokio::time::advance(Duration::from_secs(3)).await;
        f.service.tick().await;
        settle().await;

        assert!(f.tracker.current_video().is_none());
        assert_eq!(f.tracker.playback(), None);
        assert_eq!(video_updates(&f.listener).last(), Some(&None));
        assert!(f.listener.events().contains(&IslandEvent::PlaybackStateUpdate(None)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_provider_errors_keep_state() {
        let f = fixture();
        f.provider.set_window(Some(rickroll()));
        f.service.tick().await;

        f.provider.set_failing(true);
        tokio::time::advance(Duration::from_secs(10)).await;
        f.service.tick().await;
        assert!(f.tracker.current_video().is_some());

        f.provider.set_failing(false);
        f.provider.set_window(None);
        f.service.tick().await;
        assert!(f.tracker.current_video().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_provider_times_out_and_loop_continues() {
        let f = fixture_with(
            ScriptedProvider::new(SCREEN).with_delay(Duration::from_secs(5)),
            FakeFetcher::with_text(SEARCH_PAGE),
        );
        f.provider.set_window(Some(rickroll()));

        f.service.tick().await;
        assert!(f.tracker.current_video().is_none());

        // Флаг тика снят после таймаута
        f.service.tick().await;
        assert_eq!(f.provider.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_overlapping_tick_is_skipped() {
        let f = fixture_with(
            ScriptedProvider::new(SCREEN).with_delay(Duration::from_millis(500)),
            FakeFetcher::with_text(SEARCH_PAGE),
        );
        f.provider.set_window(Some(rickroll()));

        tokio::join!(f.service.tick(), f.service.tick());

        assert_eq!(f.provider.calls(), 1);
        assert!(f.tracker.current_video().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_hide_and_show_only_on_flip() {
        let f = fixture();
        let game = WindowSnapshot::new("Game").with_bounds(SCREEN);

        f.provider.set_window(Some(game));
        f.service.tick().await;
        f.service.tick().await;
        f.provider.set_window(Some(WindowSnapshot::new("Terminal").with_bounds(NORMAL)));
        f.service.tick().await;

        let visibility: Vec<_> = f
            .listener
            .events()
            .into_iter()
            .filter(|e| matches!(e, IslandEvent::IslandHide(_) | IslandEvent::IslandShow(_)))
            .collect();
        assert_eq!(
            visibility,
            vec![
                IslandEvent::IslandHide(Dimensions { width: 360, height: 0, expanded: false }),
                IslandEvent::IslandShow(Dimensions { width: 360, height: 40, expanded: false }),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_title_only_detection_is_resolved_after_debounce() {
        let f = fixture();
        f.provider.set_window(Some(WindowSnapshot::new("(3) Cool Video - YouTube").with_bounds(NORMAL)));

        f.service.tick().await;
        settle().await;
        let first = f.tracker.current_video().unwrap();
        assert_eq!(first.title, "Cool Video");
        assert_eq!(first.video_id, VideoId::Detected);
        assert_eq!(f.fetcher.calls(), 0);

        tokio::time::advance(Duration::from_millis(1000)).await;
        f.service.tick().await;
        settle().await;

        assert_eq!(f.fetcher.calls(), 1);
        let resolved = f.tracker.current_video().unwrap();
        assert_eq!(resolved.video_id, VideoId::Known("abcDEF12345".to_string()));
        assert_eq!(
            resolved.thumbnail.as_deref(),
            Some("https://img.youtube.com/vi/abcDEF12345/mqdefault.jpg")
        );

        // Следующий тик берёт результат из кэша и не откатывает id
        tokio::time::advance(Duration::from_secs(10)).await;
        f.service.tick().await;
        settle().await;
        assert_eq!(f.tracker.current_video(), Some(resolved.clone()));
        assert_eq!(f.fetcher.calls(), 1);
        assert_eq!(video_updates(&f.listener).last(), Some(&Some(resolved)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_resolution_is_discarded() {
        let f = fixture_with(
            ScriptedProvider::new(SCREEN),
            FakeFetcher::with_text(SEARCH_PAGE).with_delay(Duration::from_millis(500)),
        );
        f.provider.set_window(Some(WindowSnapshot::new("Cool Video - YouTube").with_bounds(NORMAL)));
        f.service.tick().await;
        tokio::time::advance(Duration::from_millis(1000)).await;
        f.service.tick().await;

        // Поиск ещё идёт, а пользователь переключился на другое видео
        f.provider.set_window(Some(WindowSnapshot::new("Another Clip - YouTube").with_bounds(NORMAL)));
        f.service.tick().await;
        tokio::time::sleep(Duration::from_millis(600)).await;

        assert_eq!(f.fetcher.calls(), 1);
        let current = f.tracker.current_video().unwrap();
        assert_eq!(current.title, "Another Clip");
        assert_eq!(current.video_id, VideoId::Detected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_request_check_triggers_tick() {
        let f = fixture();
        f.provider.set_window(Some(rickroll()));

        f.service.start();
        // Первый тик интервала срабатывает сразу
        tokio::time::sleep(Duration::from_millis(10)).await;
        let after_start = f.provider.calls();
        assert_eq!(after_start, 1);

        f.service.request_check();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(f.provider.calls(), after_start + 1);

        f.service.stop();
        assert!(!f.service.is_running());
    }
}
