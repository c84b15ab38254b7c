use std::io::BufRead;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::error::{IslandError, Result};
use crate::events::MediaCommand;
use crate::services::{DetectionService, MediaCommandDispatcher};

/// Команды слоя представления, по одной на строку stdin
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlCommand {
    Check,
    Media(MediaCommand),
    Quit,
}

impl FromStr for ControlCommand {
    type Err = IslandError;

    fn from_str(line: &str) -> Result<Self> {
        match line.trim().to_lowercase().as_str() {
            "check" => Ok(ControlCommand::Check),
            "play" | "pause" | "toggle" | "playpause" => Ok(ControlCommand::Media(MediaCommand::PlayPause)),
            "next" => Ok(ControlCommand::Media(MediaCommand::Next)),
            "prev" | "previous" => Ok(ControlCommand::Media(MediaCommand::Previous)),
            "quit" | "exit" => Ok(ControlCommand::Quit),
            other => Err(IslandError::Internal(format!("Неизвестная команда: '{}'", other))),
        }
    }
}

/// Чтение stdin в отдельном потоке: блокирующее чтение не должно держать рантайм при выходе
pub fn spawn_stdin_reader() -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel(16);
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if tx.blocking_send(line).is_err() {
                break;
            }
        }
        debug!("Поток чтения stdin завершён");
    });
    rx
}

/// Выполнять команды до `quit` или конца ввода; `true`, если запрошено завершение
pub async fn run_control(
    mut lines: mpsc::Receiver<String>,
    detection: Arc<DetectionService>,
    dispatcher: Arc<MediaCommandDispatcher>,
) -> Result<bool> {
    while let Some(line) = lines.recv().await {
        if line.trim().is_empty() {
            continue;
        }

        match line.parse::<ControlCommand>() {
            Ok(ControlCommand::Check) => detection.request_check(),
            Ok(ControlCommand::Media(command)) => {
                let outcome = dispatcher.dispatch(command).await;
                info!("Команда {}: {:?}", command, outcome);
            }
            Ok(ControlCommand::Quit) => {
                info!("Получена команда завершения");
                return Ok(true);
            }
            Err(e) => warn!("{}", e),
        }
    }

    info!("Ввод команд закрыт");
    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands() {
        assert_eq!("check".parse::<ControlCommand>().unwrap(), ControlCommand::Check);
        assert_eq!(" Toggle ".parse::<ControlCommand>().unwrap(), ControlCommand::Media(MediaCommand::PlayPause));
        assert_eq!("prev".parse::<ControlCommand>().unwrap(), ControlCommand::Media(MediaCommand::Previous));
        assert_eq!("quit".parse::<ControlCommand>().unwrap(), ControlCommand::Quit);
        assert!("rewind".parse::<ControlCommand>().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_control_stops_at_quit() {
        use crate::config::Config;
        use crate::events::Rect;
        use crate::services::command_dispatcher::create_command_executor;
        use crate::services::{IslandPresenter, Notifier, ThumbnailResolver, WindowTracker};
        use crate::testing::{FakeFetcher, RecordingRunner, ScriptedProvider};

        let config = Arc::new(Config::default());
        let notifier = Arc::new(Notifier::new());
        let tracker = Arc::new(WindowTracker::new());
        let runner = Arc::new(RecordingRunner::succeeding());

        let detection = Arc::new(DetectionService::new(
            config.clone(),
            Arc::new(ScriptedProvider::new(Rect::new(0, 0, 1920, 1080))),
            Arc::new(ThumbnailResolver::new(&config, Arc::new(FakeFetcher::failing()))),
            tracker.clone(),
            Arc::new(IslandPresenter::new(config.island.clone(), notifier.clone())),
            notifier.clone(),
        ));
        let dispatcher = Arc::new(MediaCommandDispatcher::new(
            config.clone(),
            create_command_executor("xdotool").unwrap(),
            runner.clone(),
            tracker,
            notifier,
        ));

        let (tx, rx) = mpsc::channel(8);
        for line in ["next", "bogus", "", "quit", "prev"] {
            tx.send(line.to_string()).await.unwrap();
        }
        assert!(run_control(rx, detection, dispatcher).await.unwrap());

        assert_eq!(runner.scripts(), vec!["xdotool key XF86AudioNext".to_string()]);
    }
}
