use std::path::Path;
use tracing::{info, warn};

/// Утилиты, через которые работают детекция окон и отправка клавиш
const WINDOW_TOOLS: &[&str] = &["xdotool", "kdotool", "swaymsg"];

/// Проверить наличие внешних утилит при запуске
pub fn check_tools() -> Vec<&'static str> {
    info!("Проверка внешних утилит...");

    let available: Vec<&'static str> = WINDOW_TOOLS
        .iter()
        .copied()
        .filter(|tool| is_in_path(tool))
        .collect();

    if available.is_empty() {
        warn!("⚠️  Не найдено ни одной утилиты детекции окон ({})", WINDOW_TOOLS.join(", "));
        warn!("   Установите xdotool (X11), kdotool (KDE Wayland) или используйте sway");
    } else {
        info!("Доступные утилиты: {}", available.join(", "));
    }

    if !available.contains(&"xdotool") {
        warn!("xdotool не найден - команды воспроизведения будут недоступны");
    }

    check_not_root();
    available
}

pub fn is_in_path(program: &str) -> bool {
    std::env::var_os("PATH")
        .map(|paths| std::env::split_paths(&paths).any(|dir| is_executable(&dir.join(program))))
        .unwrap_or(false)
}

fn is_executable(path: &Path) -> bool {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::metadata(path)
            .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
            .unwrap_or(false)
    }
    #[cfg(not(unix))]
    {
        path.is_file()
    }
}

fn check_not_root() {
    match std::env::var("USER") {
        Ok(user) if user == "root" => {
            warn!("⚠️  Приложение запущено от имени root!");
            warn!("   Утилиты окон будут запускаться от имени SUDO_USER, если он задан");
        }
        Ok(user) => {
            info!("Приложение запущено от имени пользователя: {}", user);
        }
        Err(_) => {
            warn!("Не удалось определить пользователя");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(unix)]
    #[test]
    fn test_is_in_path() {
        assert!(is_in_path("sh"));
        assert!(!is_in_path("definitely-not-a-real-tool-xyz"));
    }
}
