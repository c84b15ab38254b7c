use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::process::Stdio;
use tokio::process::Command;
use tokio::time::{timeout, Duration};
use tracing::debug;

use crate::error::{IslandError, Result};
use crate::island_error;

// Под sudo утилитам нужна сессия пользователя: шина D-Bus и дисплей
static ENV_OVERRIDES: Lazy<HashMap<String, String>> = Lazy::new(build_env_overrides);

fn build_env_overrides() -> HashMap<String, String> {
    let mut env_vars = HashMap::new();

    if std::env::var("USER").unwrap_or_default() == "root" {
        if let Ok(sudo_user) = std::env::var("SUDO_USER") {
            if let Ok(output) = std::process::Command::new("id").args(["-u", sudo_user.as_str()]).output() {
                if let Ok(uid_str) = String::from_utf8(output.stdout) {
                    let uid = uid_str.trim();
                    let user_runtime_dir = format!("/run/user/{}", uid);
                    let dbus_address = format!("unix:path={}/bus", user_runtime_dir);

                    debug!("Подставляем переменные окружения для пользователя {}: uid={}", sudo_user, uid);
                    env_vars.insert("DBUS_SESSION_BUS_ADDRESS".to_string(), dbus_address);
                    env_vars.insert("XDG_RUNTIME_DIR".to_string(), user_runtime_dir);
                    env_vars.insert("USER".to_string(), sudo_user);
                }
            }
        }
    }

    if let Ok(display_var) = std::env::var("DISPLAY") {
        env_vars.insert("DISPLAY".to_string(), display_var);
    }

    env_vars
}

pub(crate) fn create_command(program: &str, args: &[&str], as_session_user: bool) -> Command {
    let mut cmd = match std::env::var("SUDO_USER") {
        Ok(sudo_user) if as_session_user => {
            let mut cmd = Command::new("sudo");
            cmd.args(["-E", "-u", sudo_user.as_str(), program]);
            cmd
        }
        _ => Command::new(program),
    };
    cmd.args(args);

    for (key, value) in ENV_OVERRIDES.iter() {
        cmd.env(key, value);
    }

    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    cmd
}

async fn run(program: &str, args: &[&str], limit: Duration, as_session_user: bool) -> Result<String> {
    let output = timeout(limit, create_command(program, args, as_session_user).output())
        .await
        .map_err(|_| island_error!(timeout, "{} {:?} не ответил за {:?}", program, args, limit))?
        .map_err(|e| IslandError::ServiceUnavailable(format!("{} не найден: {}", program, e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(island_error!(internal, "{} {:?} вернул ошибку: {}", program, args, stderr.trim()));
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// Запустить внешнюю утилиту с ограничением по времени и вернуть stdout
pub async fn run_tool(program: &str, args: &[&str], limit: Duration) -> Result<String> {
    run(program, args, limit, false).await
}

/// То же, но от имени пользователя сессии, если процесс запущен через sudo
pub async fn run_session_tool(program: &str, args: &[&str], limit: Duration) -> Result<String> {
    run(program, args, limit, true).await
}

/// Имя процесса по pid из /proc
pub fn process_name(pid: u32) -> Option<String> {
    std::fs::read_to_string(format!("/proc/{}/comm", pid))
        .ok()
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
}
