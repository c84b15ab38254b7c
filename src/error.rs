use thiserror::Error;

#[derive(Error, Debug)]
pub enum IslandError {
    #[error("Ошибка конфигурации: {0}")]
    Config(#[from] anyhow::Error),

    #[error("Ошибка ввода-вывода: {0}")]
    Io(#[from] std::io::Error),

    #[error("Ошибка HTTP: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Ошибка разбора JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Превышено время ожидания: {0}")]
    Timeout(String),

    #[error("Ошибка командной сессии: {0}")]
    CommandSession(String),

    #[error("Сервис недоступен: {0}")]
    ServiceUnavailable(String),

    #[error("Внутренняя ошибка: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, IslandError>;

// Удобные макросы для создания ошибок
#[macro_export]
macro_rules! island_error {
    (timeout, $($arg:tt)*) => {
        $crate::error::IslandError::Timeout(format!($($arg)*))
    };
    (session, $($arg:tt)*) => {
        $crate::error::IslandError::CommandSession(format!($($arg)*))
    };
    (service_unavailable, $($arg:tt)*) => {
        $crate::error::IslandError::ServiceUnavailable(format!($($arg)*))
    };
    (internal, $($arg:tt)*) => {
        $crate::error::IslandError::Internal(format!($($arg)*))
    };
}
