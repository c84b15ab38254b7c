use crate::error::{IslandError, Result};
use crate::events::MediaCommand;
use std::sync::Arc;
use tracing::info;

use super::powershell::PowerShellExecutor;
use super::xdotool::XdotoolExecutor;

/// Маркер готовности постоянной оболочки
pub const READY_MARKER: &str = "__ISLAND_READY__";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShellDialect {
    Posix,
    PowerShell,
}

/// Как запустить постоянную оболочку и как оборачивать в ней команды
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellSpec {
    pub program: String,
    pub args: Vec<String>,
    pub dialect: ShellDialect,
}

impl ShellSpec {
    pub fn posix() -> Self {
        Self {
            program: "sh".to_string(),
            args: Vec::new(),
            dialect: ShellDialect::Posix,
        }
    }

    pub fn powershell() -> Self {
        Self {
            program: "powershell.exe".to_string(),
            args: ["-NoLogo", "-NoProfile", "-NonInteractive", "-Command", "-"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            dialect: ShellDialect::PowerShell,
        }
    }

    /// Строка, после которой оболочка печатает маркер готовности
    pub fn ready_probe(&self) -> String {
        match self.dialect {
            ShellDialect::Posix => format!("echo {}\n", READY_MARKER),
            ShellDialect::PowerShell => format!("Write-Output '{}'\n", READY_MARKER),
        }
    }

    /// Обернуть скрипт так, чтобы по завершении он напечатал `marker:<код>`.
    /// PowerShell читает stdin построчно, поэтому всё собирается в одну строку.
    pub fn frame(&self, script: &str, marker: &str) -> String {
        match self.dialect {
            ShellDialect::Posix => format!("{}\necho \"{}:$?\"\n", script, marker),
            ShellDialect::PowerShell => {
                let body = script.lines().map(str::trim).filter(|l| !l.is_empty()).collect::<Vec<_>>().join("; ");
                format!(
                    "$global:LASTEXITCODE = 0; {}; Write-Output \"{}:$global:LASTEXITCODE\"\n",
                    body, marker
                )
            }
        }
    }
}

/// Разобрать строку завершения `marker:<код>`; `None`, если строка чужая
pub fn parse_completion(line: &str, marker: &str) -> Option<bool> {
    let code = line.trim().strip_prefix(marker)?.strip_prefix(':')?;
    Some(code.trim() == "0")
}

/// Построитель скриптов для конкретной платформы.
/// Каждый скрипт должен завершаться кодом 0 только при успехе.
pub trait CommandExecutor: Send + Sync {
    fn name(&self) -> &'static str;

    fn shell(&self) -> ShellSpec;

    fn activate_by_pid(&self, pid: u32) -> String;

    fn activate_by_title(&self, title: &str) -> String;

    /// Горячая клавиша YouTube для активного окна
    fn send_shortcut(&self, command: MediaCommand) -> String;

    /// Системная медиаклавиша без выбора окна
    fn media_key(&self, command: MediaCommand) -> String;
}

/// Factory function to pick the command backend from configuration
pub fn create_command_executor(backend: &str) -> Result<Arc<dyn CommandExecutor>> {
    let executor: Arc<dyn CommandExecutor> = match backend {
        "xdotool" => Arc::new(XdotoolExecutor),
        "powershell" => Arc::new(PowerShellExecutor),
        "auto" if cfg!(windows) => Arc::new(PowerShellExecutor),
        "auto" => Arc::new(XdotoolExecutor),
        other => {
            return Err(IslandError::Internal(format!(
                "Неизвестный бэкенд команд: {}",
                other
            )))
        }
    };

    info!("Бэкенд команд воспроизведения: {}", executor.name());
    Ok(executor)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_posix_frame_reports_exit_code() {
        let framed = ShellSpec::posix().frame("xdotool key k", "__ISLAND_DONE_1__");
        assert_eq!(framed, "xdotool key k\necho \"__ISLAND_DONE_1__:$?\"\n");
    }

    #[test]
    fn test_powershell_frame_is_single_line() {
        let framed = ShellSpec::powershell().frame("$ws = 1\n$ws.Foo()\n", "__ISLAND_DONE_2__");
        assert_eq!(framed.lines().count(), 1);
        assert!(framed.contains("$ws = 1; $ws.Foo()"));
        assert!(framed.ends_with("\"__ISLAND_DONE_2__:$global:LASTEXITCODE\"\n"));
    }

    #[test]
    fn test_parse_completion() {
        assert_eq!(parse_completion("__ISLAND_DONE_3__:0", "__ISLAND_DONE_3__"), Some(true));
        assert_eq!(parse_completion("__ISLAND_DONE_3__:1\r", "__ISLAND_DONE_3__"), Some(false));
        assert_eq!(parse_completion("__ISLAND_DONE_31__:0", "__ISLAND_DONE_3__"), None);
        assert_eq!(parse_completion("noise", "__ISLAND_DONE_3__"), None);
    }

    #[test]
    fn test_backend_selection() {
        assert_eq!(create_command_executor("xdotool").unwrap().name(), "xdotool");
        assert_eq!(create_command_executor("powershell").unwrap().name(), "powershell");
        assert!(create_command_executor("applescript").is_err());
    }
}
