use serde::{Deserialize, Serialize};
use std::fmt;

/// Геометрия окна или экрана
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub const fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }
}

impl fmt::Display for Rect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}+{}+{}", self.width, self.height, self.x, self.y)
    }
}

/// Снимок активного окна, получаемый на каждом тике опроса
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WindowSnapshot {
    pub title: String,
    pub url: String,
    pub owner_process_name: String,
    pub process_id: Option<u32>,
    pub bounds: Rect,
}

impl WindowSnapshot {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            url: String::new(),
            owner_process_name: String::new(),
            process_id: None,
            bounds: Rect::default(),
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn with_process(mut self, name: impl Into<String>) -> Self {
        self.owner_process_name = name.into();
        self
    }

    pub fn with_pid(mut self, pid: u32) -> Self {
        self.process_id = Some(pid);
        self
    }

    pub fn with_bounds(mut self, bounds: Rect) -> Self {
        self.bounds = bounds;
        self
    }
}

impl fmt::Display for WindowSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.owner_process_name.is_empty() {
            write!(f, "\"{}\"", self.title)
        } else {
            write!(f, "\"{}\" ({})", self.title, self.owner_process_name)
        }
    }
}
