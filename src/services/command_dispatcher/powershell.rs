use crate::events::MediaCommand;

use super::executor::{CommandExecutor, ShellSpec};

/// Команды через WScript.Shell в постоянной сессии powershell.exe.
/// Скрипты не вызывают `exit`, код результата передаётся через `$global:LASTEXITCODE`.
pub struct PowerShellExecutor;

fn ps_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

fn app_activate(target: &str) -> String {
    format!(
        "$ws = New-Object -ComObject WScript.Shell; if ($ws.AppActivate({})) {{ $global:LASTEXITCODE = 0 }} else {{ $global:LASTEXITCODE = 1 }}",
        target
    )
}

fn send_keys(keys: &str) -> String {
    format!(
        "$ws = New-Object -ComObject WScript.Shell; $ws.SendKeys({}); $global:LASTEXITCODE = 0",
        keys
    )
}

impl CommandExecutor for PowerShellExecutor {
    fn name(&self) -> &'static str {
        "powershell"
    }

    fn shell(&self) -> ShellSpec {
        ShellSpec::powershell()
    }

    fn activate_by_pid(&self, pid: u32) -> String {
        app_activate(&pid.to_string())
    }

    fn activate_by_title(&self, title: &str) -> String {
        app_activate(&ps_quote(title))
    }

    fn send_shortcut(&self, command: MediaCommand) -> String {
        let keys = match command {
            MediaCommand::PlayPause => "'k'",
            MediaCommand::Next => "'+n'",
            MediaCommand::Previous => "'+p'",
        };
        send_keys(keys)
    }

    fn media_key(&self, command: MediaCommand) -> String {
        // VK_MEDIA_PLAY_PAUSE = 179, VK_MEDIA_NEXT_TRACK = 176, VK_MEDIA_PREV_TRACK = 177
        let keys = match command {
            MediaCommand::PlayPause => "[char]179",
            MediaCommand::Next => "[char]176",
            MediaCommand::Previous => "[char]177",
        };
        send_keys(keys)
    }
}
