//! Persistent command session.
//!
//! A single shell process consumes a bounded FIFO of scripts. The worker
//! spawns the shell lazily, waits for the ready marker, then executes one
//! script at a time and reads its completion marker from stdout. If the
//! shell exits or a script times out, the process is killed and respawned
//! on the next job. Queued jobs stay in the queue across respawns.

use crate::error::{IslandError, Result};
use crate::island_error;
use crate::utils::process::create_command;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::process::Stdio;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout};
use tokio::sync::{oneshot, Notify};
use tokio::task::JoinHandle;
use tokio::time::{timeout, Duration};
use tracing::{debug, info, warn};

use super::executor::{parse_completion, ShellSpec, READY_MARKER};

/// Исполнитель скриптов; `Ok(true)` означает нулевой код завершения
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, script: String) -> Result<bool>;
}

pub struct CommandJob {
    script: String,
    reply: oneshot::Sender<Result<bool>>,
}

impl CommandJob {
    pub fn new(script: String) -> (Self, oneshot::Receiver<Result<bool>>) {
        let (reply, rx) = oneshot::channel();
        (Self { script, reply }, rx)
    }

    fn finish(self, result: Result<bool>) {
        // Отправитель мог уже перестать ждать
        let _ = self.reply.send(result);
    }
}

/// Ограниченная очередь: при переполнении вытесняется самая старая команда
pub struct CommandQueue {
    jobs: Mutex<VecDeque<CommandJob>>,
    capacity: usize,
    notify: Notify,
}

impl CommandQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            jobs: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity: capacity.max(1),
            notify: Notify::new(),
        }
    }

    pub fn push(&self, job: CommandJob) {
        let dropped = {
            let mut jobs = self.jobs.lock();
            let dropped = if jobs.len() >= self.capacity { jobs.pop_front() } else { None };
            jobs.push_back(job);
            dropped
        };

        if let Some(old) = dropped {
            warn!("Очередь команд переполнена, отбрасываем самую старую");
            old.finish(Err(island_error!(session, "команда вытеснена из переполненной очереди")));
        }
        self.notify.notify_one();
    }

    pub async fn pop(&self) -> CommandJob {
        loop {
            let next = self.jobs.lock().pop_front();
            if let Some(job) = next {
                return job;
            }
            self.notify.notified().await;
        }
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.jobs.lock().len()
    }
}

/// Запущенный процесс оболочки
struct ShellProcess {
    _child: Child,
    stdin: ChildStdin,
    stdout: Lines<BufReader<ChildStdout>>,
}

impl ShellProcess {
    async fn spawn(shell: &ShellSpec, limit: Duration) -> Result<Self> {
        info!("Запуск командной сессии: {}", shell.program);

        let args: Vec<&str> = shell.args.iter().map(String::as_str).collect();
        let mut cmd = create_command(&shell.program, &args, true);
        cmd.stdin(Stdio::piped()).stderr(Stdio::null());

        let mut child = cmd
            .spawn()
            .map_err(|e| IslandError::ServiceUnavailable(format!("{} не запустился: {}", shell.program, e)))?;

        let stdin = child.stdin.take().ok_or_else(|| island_error!(session, "нет stdin у оболочки"))?;
        let stdout = child.stdout.take().ok_or_else(|| island_error!(session, "нет stdout у оболочки"))?;

        let mut process = Self {
            _child: child,
            stdin,
            stdout: BufReader::new(stdout).lines(),
        };

        process.write(&shell.ready_probe()).await?;
        timeout(limit, process.wait_for(|line| (line.trim() == READY_MARKER).then_some(())))
            .await
            .map_err(|_| island_error!(timeout, "оболочка не сообщила о готовности за {:?}", limit))??;

        info!("Командная сессия готова");
        Ok(process)
    }

    async fn write(&mut self, text: &str) -> Result<()> {
        self.stdin.write_all(text.as_bytes()).await?;
        self.stdin.flush().await?;
        Ok(())
    }

    /// Читать stdout до строки, на которой `matcher` вернёт `Some`
    async fn wait_for<T>(&mut self, mut matcher: impl FnMut(&str) -> Option<T>) -> Result<T>
    where
        T: Send,
    {
        while let Some(line) = self.stdout.next_line().await? {
            if let Some(value) = matcher(&line) {
                return Ok(value);
            }
            debug!("Вывод сессии: {}", line);
        }
        Err(island_error!(session, "оболочка завершилась"))
    }

    async fn execute(&mut self, shell: &ShellSpec, script: &str, marker: &str) -> Result<bool> {
        self.write(&shell.frame(script, marker)).await?;
        self.wait_for(|line| parse_completion(line, marker)).await
    }
}

/// Постоянная командная сессия с одним рабочим циклом
pub struct CommandSession {
    queue: Arc<CommandQueue>,
    shell: ShellSpec,
    command_timeout: Duration,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl CommandSession {
    pub fn new(shell: ShellSpec, queue_capacity: usize, command_timeout: Duration) -> Self {
        Self {
            queue: Arc::new(CommandQueue::new(queue_capacity)),
            shell,
            command_timeout,
            worker: Mutex::new(None),
        }
    }

    fn ensure_worker(&self) {
        let mut worker = self.worker.lock();
        if worker.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return;
        }

        let queue = self.queue.clone();
        let shell = self.shell.clone();
        let limit = self.command_timeout;
        *worker = Some(tokio::spawn(Self::worker_loop(queue, shell, limit)));
    }

    async fn worker_loop(queue: Arc<CommandQueue>, shell: ShellSpec, limit: Duration) {
        let mut process: Option<ShellProcess> = None;
        let mut sequence: u64 = 0;

        loop {
            let job = queue.pop().await;

            if process.is_none() {
                match ShellProcess::spawn(&shell, limit).await {
                    Ok(p) => process = Some(p),
                    Err(e) => {
                        warn!("Не удалось запустить командную сессию: {}", e);
                        job.finish(Err(e));
                        continue;
                    }
                }
            }
            let Some(shell_process) = process.as_mut() else {
                continue;
            };

            sequence += 1;
            let marker = format!("__ISLAND_DONE_{}__", sequence);
            debug!("Выполняем команду #{}: {}", sequence, job.script);

            let result = match timeout(limit, shell_process.execute(&shell, &job.script, &marker)).await {
                Ok(result) => result,
                Err(_) => Err(island_error!(timeout, "команда #{} не завершилась за {:?}", sequence, limit)),
            };

            if let Err(e) = &result {
                // Процесс убивается при drop (kill_on_drop), следующий запуск ленивый
                warn!("Командная сессия сброшена: {}", e);
                process = None;
            }

            job.finish(result);
        }
    }

    pub fn stop(&self) {
        if let Some(handle) = self.worker.lock().take() {
            handle.abort();
        }
    }
}

impl Drop for CommandSession {
    fn drop(&mut self) {
        self.stop();
    }
}

#[async_trait]
impl CommandRunner for CommandSession {
    async fn run(&self, script: String) -> Result<bool> {
        self.ensure_worker();

        let (job, rx) = CommandJob::new(script);
        self.queue.push(job);

        rx.await
            .map_err(|_| island_error!(session, "командная сессия остановлена"))?
    }
}

/// Dry-run: команды только логируются
pub struct DryRunRunner;

#[async_trait]
impl CommandRunner for DryRunRunner {
    async fn run(&self, script: String) -> Result<bool> {
        info!("Dry-run: команда не выполняется: {}", script);
        Ok(true)
    }
}
