use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use tokio::signal;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
mod config;
mod control;
mod error;
mod events;
mod services;
#[cfg(test)]
mod testing;
mod utils;

use config::Config;
use services::command_dispatcher::{
    create_command_executor, CommandRunner, CommandSession, DryRunRunner,
};
use services::{
    create_window_provider, DetectionService, IslandPresenter, MediaCommandDispatcher, Notifier,
    ThumbnailResolver, TracingListener, WindowTracker,
};

#[derive(Parser, Debug)]
#[command(name = "nook-island")]
#[command(about = "Остров рабочего стола: детекция видео YouTube в активном окне и управление воспроизведением")]
struct Args {
    /// Путь к файлу конфигурации
    #[arg(short, long, default_value = "island.toml")]
    config: String,

    /// Режим сухого запуска (эмуляция окон, команды только логируются)
    #[arg(long)]
    dry_run: bool,

    /// Уровень логирования (перекрывает значение из конфигурации)
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Загрузка конфигурации
    let config = Arc::new(Config::load(&args.config)?);

    // Инициализация системы логирования
    let level = args.log_level.as_deref().unwrap_or(&config.logging.level);
    init_tracing(level, &config.logging.format)?;

    info!("Запуск Nook Island v{}", env!("CARGO_PKG_VERSION"));
    info!("Конфигурация загружена из: {}", args.config);

    if args.dry_run {
        warn!("Режим сухого запуска - реальные действия отключены");
    } else {
        utils::tools::check_tools();
    }

    // Слой представления: в безголовом режиме события пишутся в лог
    let notifier = Arc::new(Notifier::new());
    notifier.subscribe(Arc::new(TracingListener));

    let tracker = Arc::new(WindowTracker::new());
    let island = Arc::new(IslandPresenter::new(config.island.clone(), notifier.clone()));
    island.announce();

    let resolver = Arc::new(ThumbnailResolver::from_config(&config)?);
    let provider = create_window_provider(config.clone(), args.dry_run)?;

    let executor = create_command_executor(&config.commands.backend)?;
    let session = (!args.dry_run).then(|| {
        Arc::new(CommandSession::new(
            executor.shell(),
            config.commands.queue_capacity,
            config.command_timeout(),
        ))
    });
    let runner: Arc<dyn CommandRunner> = match &session {
        Some(session) => session.clone(),
        None => Arc::new(DryRunRunner),
    };

    let dispatcher = Arc::new(MediaCommandDispatcher::new(
        config.clone(),
        executor,
        runner,
        tracker.clone(),
        notifier.clone(),
    ));

    let detection = Arc::new(DetectionService::new(
        config.clone(),
        provider,
        resolver,
        tracker,
        island,
        notifier,
    ));

    info!("Все компоненты инициализированы");
    detection.start();

    let control_handle = tokio::spawn(control::run_control(
        control::spawn_stdin_reader(),
        detection.clone(),
        dispatcher,
    ));

    info!("Все сервисы запущены, команды: check, play, next, prev, quit");

    // Ожидание сигнала завершения или команды quit
    tokio::select! {
        result = signal::ctrl_c() => match result {
            Ok(()) => info!("Получен сигнал завершения (Ctrl+C)"),
            Err(err) => error!("Ошибка при ожидании сигнала завершения: {}", err),
        },
        _ = wait_for_quit(control_handle) => {}
    }

    info!("Завершение работы...");

    // Командная сессия убивает оболочку при остановке
    if let Some(session) = &session {
        session.stop();
    }

    // Ожидаем завершения цикла детекции (с таймаутом)
    let shutdown_timeout = tokio::time::Duration::from_secs(5);
    let shutdown_result = tokio::time::timeout(shutdown_timeout, detection.shutdown()).await;

    match shutdown_result {
        Ok(_) => info!("Все сервисы завершили работу корректно"),
        Err(_) => warn!("Таймаут при завершении сервисов"),
    }

    info!("Nook Island завершил работу");
    Ok(())
}

/// Завершается только по команде quit; без stdin ждём Ctrl+C
async fn wait_for_quit(handle: JoinHandle<error::Result<bool>>) {
    match handle.await {
        Ok(Ok(true)) => return,
        Ok(Ok(false)) => info!("stdin закрыт, для завершения используйте Ctrl+C"),
        Ok(Err(e)) => error!("Ошибка в управлении через stdin: {}", e),
        Err(e) => error!("Задача управления завершилась аварийно: {}", e),
    }
    std::future::pending::<()>().await
}

fn init_tracing(level: &str, format: &str) -> Result<()> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(level))?;

    let registry = tracing_subscriber::registry().with(filter);
    match format {
        "full" => registry.with(tracing_subscriber::fmt::layer()).init(),
        _ => registry.with(tracing_subscriber::fmt::layer().compact()).init(),
    }

    Ok(())
}
