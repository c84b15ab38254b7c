use crate::events::MediaCommand;

use super::executor::{CommandExecutor, ShellSpec};

/// Команды через xdotool в постоянной sh-сессии (X11 / XWayland)
pub struct XdotoolExecutor;

/// Экранирование для одинарных кавычек sh
fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

fn activate_first(search: &str) -> String {
    format!(
        "wid=$(xdotool search --onlyvisible {} 2>/dev/null | head -n1); [ -n \"$wid\" ] && xdotool windowactivate --sync \"$wid\"",
        search
    )
}

impl CommandExecutor for XdotoolExecutor {
    fn name(&self) -> &'static str {
        "xdotool"
    }

    fn shell(&self) -> ShellSpec {
        ShellSpec::posix()
    }

    fn activate_by_pid(&self, pid: u32) -> String {
        activate_first(&format!("--pid {}", pid))
    }

    fn activate_by_title(&self, title: &str) -> String {
        // xdotool ищет по регулярному выражению
        activate_first(&format!("--name {}", shell_quote(&regex::escape(title))))
    }

    fn send_shortcut(&self, command: MediaCommand) -> String {
        let key = match command {
            MediaCommand::PlayPause => "k",
            MediaCommand::Next => "shift+n",
            MediaCommand::Previous => "shift+p",
        };
        format!("xdotool key --clearmodifiers {}", key)
    }

    fn media_key(&self, command: MediaCommand) -> String {
        let key = match command {
            MediaCommand::PlayPause => "XF86AudioPlay",
            MediaCommand::Next => "XF86AudioNext",
            MediaCommand::Previous => "XF86AudioPrev",
        };
        format!("xdotool key {}", key)
    }
}
