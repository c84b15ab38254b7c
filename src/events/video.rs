use serde::{Deserialize, Serialize};
use std::fmt;

/// Откуда пришло видео
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoSource {
    Youtube,
    Local,
    None,
}

/// Идентификатор видео: настоящий 11-символьный id или маркер
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum VideoId {
    Known(String),
    /// Видео найдено только по заголовку, id ещё не известен
    Detected,
    /// Локальное видео, id не существует
    Generated,
}

impl VideoId {
    pub fn as_str(&self) -> &str {
        match self {
            VideoId::Known(id) => id,
            VideoId::Detected => "detected",
            VideoId::Generated => "generated",
        }
    }
}

impl fmt::Display for VideoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// Сериализуется строкой, как ожидает слой представления
impl Serialize for VideoId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for VideoId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(match raw.as_str() {
            "detected" => VideoId::Detected,
            "generated" => VideoId::Generated,
            _ => VideoId::Known(raw),
        })
    }
}

/// Результат классификации окна и текущее известное состояние медиа
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoInfo {
    pub is_video: bool,
    pub source: VideoSource,
    pub title: String,
    pub url: String,
    pub video_id: VideoId,
    pub thumbnail: Option<String>,
}

impl VideoInfo {
    pub fn none() -> Self {
        Self {
            is_video: false,
            source: VideoSource::None,
            title: String::new(),
            url: String::new(),
            video_id: VideoId::Detected,
            thumbnail: None,
        }
    }

    pub fn youtube(title: impl Into<String>, url: impl Into<String>, video_id: VideoId) -> Self {
        let thumbnail = match &video_id {
            VideoId::Known(id) => Some(thumbnail_url(id)),
            _ => None,
        };
        Self {
            is_video: true,
            source: VideoSource::Youtube,
            title: title.into(),
            url: url.into(),
            video_id,
            thumbnail,
        }
    }

    pub fn local(title: impl Into<String>) -> Self {
        Self {
            is_video: true,
            source: VideoSource::Local,
            title: title.into(),
            url: String::new(),
            video_id: VideoId::Generated,
            thumbnail: None,
        }
    }

    /// YouTube-видео без id: миниатюру нужно искать через ThumbnailResolver
    pub fn needs_resolution(&self) -> bool {
        self.is_video && self.source == VideoSource::Youtube && self.video_id == VideoId::Detected
    }

    pub fn with_resolution(mut self, video_id: &str, thumbnail: &str) -> Self {
        self.video_id = VideoId::Known(video_id.to_string());
        self.thumbnail = Some(thumbnail.to_string());
        if self.url.is_empty() {
            self.url = watch_url(video_id);
        }
        self
    }
}

impl fmt::Display for VideoInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{}\" [{:?}, id={}]", self.title, self.source, self.video_id)
    }
}

pub fn thumbnail_url(video_id: &str) -> String {
    format!("https://img.youtube.com/vi/{}/mqdefault.jpg", video_id)
}

pub fn watch_url(video_id: &str) -> String {
    format!("https://www.youtube.com/watch?v={}", video_id)
}
