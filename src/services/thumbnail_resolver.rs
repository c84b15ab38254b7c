//! ThumbnailResolver: finds a video id for a title-only detection.
//!
//! Results live in a bounded FIFO cache with a TTL. At most one lookup per
//! normalized title is outstanding at any time; a second caller for the same
//! title gets `None` and retries on a later tick.

use async_trait::async_trait;
use dashmap::DashMap;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use regex::Regex;
use reqwest::Url;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{IslandError, Result};
use crate::events::video::thumbnail_url;
use crate::services::classifier::is_video_id;

const API_SEARCH_URL: &str = "https://www.googleapis.com/youtube/v3/search";
const SCRAPE_SEARCH_URL: &str = "https://www.youtube.com/results";
const USER_AGENT: &str = concat!(
    "Mozilla/5.0 (X11; Linux x86_64) nook-island/",
    env!("CARGO_PKG_VERSION")
);

static EMBEDDED_ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#""videoId"\s*:\s*"([A-Za-z0-9_-]{11})""#).unwrap());
static WATCH_LINK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/watch\?v=([A-Za-z0-9_-]{11})").unwrap());

/// Исходящие HTTP-запросы
#[async_trait]
pub trait HttpFetcher: Send + Sync {
    async fn get_json(&self, url: &str) -> Result<Value>;
    /// Следует редиректам не больше настроенного лимита
    async fn get_text(&self, url: &str) -> Result<String>;
}

pub struct ReqwestFetcher {
    client: reqwest::Client,
}

impl ReqwestFetcher {
    pub fn new(max_redirects: usize, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::limited(max_redirects))
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpFetcher for ReqwestFetcher {
    async fn get_json(&self, url: &str) -> Result<Value> {
        let response = self.client.get(url).send().await?.error_for_status()?;
        Ok(response.json::<Value>().await?)
    }

    async fn get_text(&self, url: &str) -> Result<String> {
        let response = self.client.get(url).send().await?.error_for_status()?;
        Ok(response.text().await?)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedThumbnail {
    pub video_id: String,
    pub thumbnail_url: String,
}

impl ResolvedThumbnail {
    pub fn from_id(video_id: &str) -> Self {
        Self {
            video_id: video_id.to_string(),
            thumbnail_url: thumbnail_url(video_id),
        }
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    value: ResolvedThumbnail,
    resolved_at: Instant,
}

/// Ограниченный кэш с вытеснением по порядку вставки (FIFO, не LRU)
#[derive(Debug)]
pub struct ThumbnailCache {
    entries: HashMap<String, CacheEntry>,
    order: VecDeque<String>,
    capacity: usize,
    ttl: Duration,
}

impl ThumbnailCache {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            entries: HashMap::with_capacity(capacity),
            order: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
            ttl,
        }
    }

    pub fn get(&mut self, key: &str, now: Instant) -> Option<ResolvedThumbnail> {
        let entry = self.entries.get(key)?;
        if now.saturating_duration_since(entry.resolved_at) < self.ttl {
            return Some(entry.value.clone());
        }

        debug!("Запись кэша миниатюр устарела: '{}'", key);
        self.remove(key);
        None
    }

    pub fn insert(&mut self, key: String, value: ResolvedThumbnail, now: Instant) {
        if self.entries.contains_key(&key) {
            self.order.retain(|k| k != &key);
        } else {
            while self.entries.len() >= self.capacity {
                match self.order.pop_front() {
                    Some(oldest) => {
                        debug!("Вытеснение из кэша миниатюр: '{}'", oldest);
                        self.entries.remove(&oldest);
                    }
                    None => break,
                }
            }
        }

        self.order.push_back(key.clone());
        self.entries.insert(key, CacheEntry { value, resolved_at: now });
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    fn remove(&mut self, key: &str) {
        self.entries.remove(key);
        self.order.retain(|k| k != key);
    }
}

/// Снимает отметку "в полёте" при любом выходе из resolve
struct InFlightGuard<'a> {
    in_flight: &'a DashMap<String, ()>,
    key: String,
}

impl<'a> InFlightGuard<'a> {
    fn acquire(in_flight: &'a DashMap<String, ()>, key: &str) -> Option<Self> {
        match in_flight.entry(key.to_string()) {
            dashmap::mapref::entry::Entry::Occupied(_) => None,
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(());
                Some(Self {
                    in_flight,
                    key: key.to_string(),
                })
            }
        }
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.in_flight.remove(&self.key);
    }
}

pub struct ThumbnailResolver {
    fetcher: Arc<dyn HttpFetcher>,
    api_key: Option<String>,
    enabled: bool,
    cache: Mutex<ThumbnailCache>,
    in_flight: DashMap<String, ()>,
}

impl ThumbnailResolver {
    pub fn new(config: &Config, fetcher: Arc<dyn HttpFetcher>) -> Self {
        let api_key = config
            .thumbnails
            .api_key
            .clone()
            .filter(|key| !key.trim().is_empty());

        info!(
            "Инициализация ThumbnailResolver (стратегия: {}, ёмкость кэша: {})",
            if api_key.is_some() { "api" } else { "scrape" },
            config.thumbnails.capacity
        );

        Self {
            fetcher,
            api_key,
            enabled: config.thumbnails.enabled,
            cache: Mutex::new(ThumbnailCache::new(config.thumbnails.capacity, config.thumbnail_ttl())),
            in_flight: DashMap::new(),
        }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let fetcher = ReqwestFetcher::new(
            config.thumbnails.max_redirects,
            Duration::from_millis(config.thumbnails.request_timeout_ms),
        )?;
        Ok(Self::new(config, Arc::new(fetcher)))
    }

    /// Быстрая проверка кэша без сетевых запросов
    pub fn cached(&self, title: &str) -> Option<ResolvedThumbnail> {
        let key = normalize_title(title);
        self.cache.lock().get(&key, Instant::now())
    }

    pub fn is_in_flight(&self, title: &str) -> bool {
        self.in_flight.contains_key(&normalize_title(title))
    }

    /// Найти id и миниатюру по заголовку. Ошибки сети и разбора дают `None`.
    pub async fn resolve(&self, title: &str) -> Option<ResolvedThumbnail> {
        let key = normalize_title(title);
        if key.is_empty() || !self.enabled {
            return None;
        }

        let cached = self.cache.lock().get(&key, Instant::now());
        if let Some(hit) = cached {
            debug!("Миниатюра из кэша для '{}': {}", title, hit.video_id);
            return Some(hit);
        }

        let Some(_guard) = InFlightGuard::acquire(&self.in_flight, &key) else {
            debug!("Поиск миниатюры для '{}' уже выполняется", title);
            return None;
        };

        // Параллельный запрос мог завершиться между проверкой кэша и захватом
        let cached = self.cache.lock().get(&key, Instant::now());
        if cached.is_some() {
            return cached;
        }

        let lookup = match &self.api_key {
            Some(api_key) => self.lookup_api(title, api_key).await,
            None => self.lookup_scrape(title).await,
        };

        match lookup {
            Ok(Some(resolved)) => {
                info!("Миниатюра найдена для '{}': {}", title, resolved.video_id);
                self.cache.lock().insert(key, resolved.clone(), Instant::now());
                Some(resolved)
            }
            Ok(None) => {
                debug!("Поиск не дал результатов для '{}'", title);
                None
            }
            Err(e) => {
                warn!("Не удалось найти миниатюру для '{}': {}", title, e);
                None
            }
        }
    }

    async fn lookup_api(&self, title: &str, api_key: &str) -> Result<Option<ResolvedThumbnail>> {
        let url = Url::parse_with_params(
            API_SEARCH_URL,
            &[
                ("part", "snippet"),
                ("type", "video"),
                ("maxResults", "1"),
                ("q", title),
                ("key", api_key),
            ],
        )
        .map_err(|e| IslandError::Internal(format!("Неверный URL поиска: {}", e)))?;

        let body = self.fetcher.get_json(url.as_str()).await?;
        Ok(parse_api_response(&body))
    }

    async fn lookup_scrape(&self, title: &str) -> Result<Option<ResolvedThumbnail>> {
        let url = Url::parse_with_params(SCRAPE_SEARCH_URL, &[("search_query", title)])
            .map_err(|e| IslandError::Internal(format!("Неверный URL поиска: {}", e)))?;

        let page = self.fetcher.get_text(url.as_str()).await?;
        Ok(parse_search_page(&page))
    }
}

/// Ключ кэша: нижний регистр, схлопнутые пробелы
pub fn normalize_title(title: &str) -> String {
    title.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

pub fn parse_api_response(body: &Value) -> Option<ResolvedThumbnail> {
    let item = body["items"].as_array()?.first()?;
    let video_id = item["id"]["videoId"].as_str().filter(|id| is_video_id(id))?;

    let thumbnail = item["snippet"]["thumbnails"]["medium"]["url"]
        .as_str()
        .map(str::to_string)
        .unwrap_or_else(|| thumbnail_url(video_id));

    Some(ResolvedThumbnail {
        video_id: video_id.to_string(),
        thumbnail_url: thumbnail,
    })
}

pub fn parse_search_page(page: &str) -> Option<ResolvedThumbnail> {
    EMBEDDED_ID_RE
        .captures(page)
        .or_else(|| WATCH_LINK_RE.captures(page))
        .and_then(|caps| caps.get(1))
        .map(|m| ResolvedThumbnail::from_id(m.as_str()))
}
