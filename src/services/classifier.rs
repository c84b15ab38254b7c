//! VideoClassifier: pure mapping from a window snapshot to a `VideoInfo`.
//!
//! Rules are ordered and the first match wins: a YouTube URL, then a title
//! mentioning YouTube, then a known local media player. Everything else is
//! not a video.

use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Url;

use crate::events::{VideoId, VideoInfo, WindowSnapshot};
use crate::events::video::watch_url;

const VIDEO_ID_LEN: usize = 11;

static YOUTUBE_URL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(?:[a-z][a-z0-9+.-]*://)?(?:[a-z0-9-]+\.)*(?:youtube\.com|youtu\.be)(?:[:/?#]|$)").unwrap()
});

static BROWSER_SUFFIX_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\s*[-–—|]\s*(?:google chrome|chromium|mozilla firefox|firefox|microsoft\S* edge|brave|opera|vivaldi|safari)\s*$").unwrap()
});

static YOUTUBE_SUFFIX_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\s*[-–—|]\s*youtube(?:\s+music)?\s*$").unwrap());

static TAB_COUNT_PREFIX_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\(\d+\)\s*").unwrap());

static YOUTUBE_PREFIX_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^youtube(?:\s+music)?\s*[-–—|]\s*").unwrap());

// Порядок важен: от самых специфичных к общим
static TITLE_ID_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"watch\?v=([A-Za-z0-9_-]{11})(?:[^A-Za-z0-9_-]|$)",
        r"youtu\.be/([A-Za-z0-9_-]{11})(?:[^A-Za-z0-9_-]|$)",
        r"(?:^|[^A-Za-z0-9_])v=([A-Za-z0-9_-]{11})(?:[^A-Za-z0-9_-]|$)",
        r"embed/([A-Za-z0-9_-]{11})(?:[^A-Za-z0-9_-]|$)",
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).unwrap())
    .collect()
});

const NAVIGATION_PAGES: &[&str] = &[
    "home",
    "search",
    "trending",
    "subscriptions",
    "library",
    "history",
    "explore",
    "watch later",
    "shorts",
];

const LOCAL_PLAYER_SUFFIXES: &[&str] = &[" - VLC media player", " - mpv", " - Celluloid", " - SMPlayer"];
const LOCAL_PLAYER_PROCESSES: &[&str] = &["vlc", "mpv", "totem", "celluloid", "smplayer", "mplayer"];
const VIDEO_EXTENSIONS: &[&str] = &[".mp4", ".mkv", ".webm", ".avi", ".mov", ".m4v", ".flv", ".wmv"];

/// Классифицировать снимок окна
pub fn classify(snapshot: &WindowSnapshot) -> VideoInfo {
    if is_youtube_url(&snapshot.url) {
        return classify_by_url(snapshot).unwrap_or_else(VideoInfo::none);
    }

    if snapshot.title.to_lowercase().contains("youtube") {
        return classify_by_title(snapshot).unwrap_or_else(VideoInfo::none);
    }

    classify_local(snapshot).unwrap_or_else(VideoInfo::none)
}

pub fn is_youtube_url(url: &str) -> bool {
    !url.is_empty() && YOUTUBE_URL_RE.is_match(url.trim())
}

fn classify_by_url(snapshot: &WindowSnapshot) -> Option<VideoInfo> {
    let title = clean_title(&snapshot.title);
    if title.is_empty() || is_site_name(&title) {
        return None;
    }

    match video_id_from_url(&snapshot.url) {
        Some(id) => Some(VideoInfo::youtube(title, snapshot.url.trim(), VideoId::Known(id))),
        // Без id страница может оказаться лентой, а не роликом
        None if is_navigation_title(&title) => None,
        None => Some(VideoInfo::youtube(title, snapshot.url.trim(), VideoId::Detected)),
    }
}

fn classify_by_title(snapshot: &WindowSnapshot) -> Option<VideoInfo> {
    let title = clean_title(&snapshot.title);
    if title.is_empty() || is_navigation_title(&title) {
        return None;
    }

    let info = match video_id_from_title(&snapshot.title).or_else(|| bare_video_id(&title)) {
        Some(id) => {
            let url = watch_url(&id);
            VideoInfo::youtube(title, url, VideoId::Known(id))
        }
        None => VideoInfo::youtube(title, snapshot.url.trim(), VideoId::Detected),
    };
    Some(info)
}

fn classify_local(snapshot: &WindowSnapshot) -> Option<VideoInfo> {
    let raw = snapshot.title.trim();

    for suffix in LOCAL_PLAYER_SUFFIXES {
        if let Some(stripped) = strip_suffix_ignore_case(raw, suffix) {
            let title = stripped.trim();
            return (!title.is_empty()).then(|| VideoInfo::local(title));
        }
    }

    let process = snapshot.owner_process_name.to_lowercase();
    if LOCAL_PLAYER_PROCESSES.iter().any(|p| process == *p) {
        let lower = raw.to_lowercase();
        if VIDEO_EXTENSIONS.iter().any(|ext| lower.contains(ext)) {
            return Some(VideoInfo::local(raw));
        }
    }

    None
}

/// Убрать счётчик вкладок, суффиксы браузера и YouTube
pub fn clean_title(raw: &str) -> String {
    // По одному разу: "Carmen - Opera - YouTube" должен остаться "Carmen - Opera"
    let title = BROWSER_SUFFIX_RE.replace(raw.trim(), "");
    let title = YOUTUBE_SUFFIX_RE.replace(title.trim(), "");
    TAB_COUNT_PREFIX_RE.replace(title.trim(), "").trim().to_string()
}

/// Голое название сайта: "YouTube" или "YouTube Music"
fn is_site_name(title: &str) -> bool {
    let lower = title.trim().to_lowercase();
    lower == "youtube" || lower == "youtube music"
}

fn is_navigation_title(title: &str) -> bool {
    let lower = title.to_lowercase();
    let page = YOUTUBE_PREFIX_RE.replace(&lower, "");
    let page = page.trim();
    page.is_empty() || is_site_name(page) || NAVIGATION_PAGES.contains(&page)
}

/// Извлечь id из URL: параметр `v` или сегмент пути
pub fn video_id_from_url(raw: &str) -> Option<String> {
    let raw = raw.trim();
    let with_scheme = if raw.contains("://") {
        raw.to_string()
    } else {
        format!("https://{}", raw)
    };
    let url = Url::parse(&with_scheme).ok()?;
    let host = url.host_str()?.to_lowercase();

    let mut segments = url.path_segments().map(|s| s.filter(|p| !p.is_empty()).collect::<Vec<_>>()).unwrap_or_default();

    if host == "youtu.be" || host.ends_with(".youtu.be") {
        return segments.first().copied().filter(|id| is_video_id(id)).map(str::to_string);
    }

    if let Some((_, v)) = url.query_pairs().find(|(key, _)| key == "v") {
        return is_video_id(&v).then(|| v.into_owned());
    }

    if segments.len() >= 2 && matches!(segments[0], "embed" | "shorts" | "live" | "v" | "e") {
        let id = segments.remove(1);
        return is_video_id(id).then(|| id.to_string());
    }

    None
}

fn video_id_from_title(title: &str) -> Option<String> {
    TITLE_ID_PATTERNS
        .iter()
        .find_map(|re| re.captures(title))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

// Голые 11-символьные токены; слова вроде "Programming" или "Hip-hop-mix" отсекаются
fn bare_video_id(title: &str) -> Option<String> {
    title
        .split(|c: char| !is_id_char(c))
        .find(|token| is_video_id(token) && looks_random(token))
        .map(str::to_string)
}

// Внутри одного слова есть буквы вперемешку с цифрами или заглавная после строчной
fn looks_random(token: &str) -> bool {
    token.split(['-', '_']).any(|word| {
        let mixed_digits = word.chars().any(|c| c.is_ascii_alphabetic()) && word.chars().any(|c| c.is_ascii_digit());
        let inner_upper = word
            .as_bytes()
            .windows(2)
            .any(|pair| pair[0].is_ascii_lowercase() && pair[1].is_ascii_uppercase());
        mixed_digits || inner_upper
    })
}

fn is_id_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-'
}

pub fn is_video_id(candidate: &str) -> bool {
    candidate.len() == VIDEO_ID_LEN && candidate.chars().all(is_id_char)
}

fn strip_suffix_ignore_case<'a>(value: &'a str, suffix: &str) -> Option<&'a str> {
    let split = value.len().checked_sub(suffix.len())?;
    if !value.is_char_boundary(split) {
        return None;
    }
    let (head, tail) = value.split_at(split);
    tail.eq_ignore_ascii_case(suffix).then_some(head)
}
