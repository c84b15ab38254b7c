use parking_lot::RwLock;
use std::sync::Arc;
use tracing::info;

use crate::debug_if_enabled;
use crate::events::IslandEvent;

/// Подписчик на уведомления острова (слой представления)
pub trait IslandListener: Send + Sync {
    fn on_event(&self, event: &IslandEvent);
}

/// Одна точка рассылки событий: каждый слушатель регистрируется один раз
#[derive(Default)]
pub struct Notifier {
    listeners: RwLock<Vec<Arc<dyn IslandListener>>>,
}

impl Notifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, listener: Arc<dyn IslandListener>) {
        let mut listeners = self.listeners.write();
        if listeners.iter().any(|existing| Arc::ptr_eq(existing, &listener)) {
            return;
        }
        listeners.push(listener);
    }

    pub fn emit(&self, event: IslandEvent) {
        debug_if_enabled!("Рассылка события: {}", event);
        // Снимок списка, чтобы слушатель мог подписать другого без дедлока
        let listeners: Vec<_> = self.listeners.read().clone();
        for listener in listeners {
            listener.on_event(&event);
        }
    }

    #[cfg(test)]
    pub fn listener_count(&self) -> usize {
        self.listeners.read().len()
    }
}

/// Слушатель для безголового режима: пишет события в лог
pub struct TracingListener;

impl IslandListener for TracingListener {
    fn on_event(&self, event: &IslandEvent) {
        match event {
            IslandEvent::VideoInfoUpdate(Some(info)) => {
                let payload = serde_json::to_string(info).unwrap_or_default();
                info!("[island] video-info-update {}", payload);
            }
            other => info!("[island] {}", other),
        }
    }
}
