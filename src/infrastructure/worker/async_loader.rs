//! Async Loader - Background Preload Task Processor
//!
//! 固定数量的 OS 线程从共享队列消费任务，结果写入 TaskRegistry

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::application::ports::{
    TaskCallback, TaskError, TaskJob, TaskOutcome, TaskQueuePort, TaskSnapshot, TaskStats,
};
use crate::infrastructure::memory::TaskRegistry;

/// Loader 配置
#[derive(Debug, Clone)]
pub struct AsyncLoaderConfig {
    /// worker 线程数
    pub workers: usize,
    /// 队列轮询间隔，用于检查停止标志
    pub poll_interval: Duration,
}

impl Default for AsyncLoaderConfig {
    fn default() -> Self {
        Self {
            workers: 5,
            poll_interval: Duration::from_secs(1),
        }
    }
}

struct QueuedTask {
    task_id: String,
    name: String,
    job: TaskJob,
    callback: Option<TaskCallback>,
}

enum Message {
    Run(QueuedTask),
    /// 每个 worker 收到一个后退出
    Shutdown,
}

/// 后台任务加载器
pub struct AsyncLoader {
    config: AsyncLoaderConfig,
    sender: Sender<Message>,
    receiver: Receiver<Message>,
    registry: Arc<TaskRegistry>,
    handles: Mutex<Vec<JoinHandle<()>>>,
    running: AtomicBool,
    stopping: Arc<AtomicBool>,
    counter: AtomicU64,
}

impl AsyncLoader {
    pub fn new(config: AsyncLoaderConfig) -> Self {
        let (sender, receiver) = crossbeam_channel::unbounded();
        Self {
            config,
            sender,
            receiver,
            registry: Arc::new(TaskRegistry::new()),
            handles: Mutex::new(Vec::new()),
            running: AtomicBool::new(false),
            stopping: Arc::new(AtomicBool::new(false)),
            counter: AtomicU64::new(0),
        }
    }

    pub fn registry(&self) -> Arc<TaskRegistry> {
        self.registry.clone()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// 当前存活的 worker 数
    pub fn worker_count(&self) -> usize {
        self.handles.lock().len()
    }

    /// 启动 worker 线程，重复调用无副作用
    pub fn start_workers(&self) {
        let mut handles = self.handles.lock();
        if !handles.is_empty() {
            return;
        }

        self.stopping.store(false, Ordering::SeqCst);
        let workers = self.config.workers.max(1);

        for index in 0..workers {
            let receiver = self.receiver.clone();
            let registry = self.registry.clone();
            let stopping = self.stopping.clone();
            let poll_interval = self.config.poll_interval;

            let spawned = std::thread::Builder::new()
                .name(format!("pagecast-loader-{}", index))
                .spawn(move || worker_loop(index, receiver, registry, stopping, poll_interval));

            match spawned {
                Ok(handle) => handles.push(handle),
                Err(e) => tracing::error!(index = index, error = %e, "Failed to spawn loader worker"),
            }
        }

        self.running.store(!handles.is_empty(), Ordering::SeqCst);
        tracing::info!(workers = handles.len(), "AsyncLoader started");
    }

    /// 停止所有 worker
    ///
    /// 已入队的任务先执行完，然后各 worker 收到停止信号退出
    pub fn stop_workers(&self) {
        // 持锁发送停止信号，使其排在所有已接受任务之后
        let handles: Vec<JoinHandle<()>> = {
            let mut guard = self.handles.lock();
            if guard.is_empty() {
                return;
            }
            self.running.store(false, Ordering::SeqCst);

            for _ in 0..guard.len() {
                if self.sender.send(Message::Shutdown).is_err() {
                    break;
                }
            }
            std::mem::take(&mut *guard)
        };
        self.stopping.store(true, Ordering::SeqCst);

        for handle in handles {
            if handle.join().is_err() {
                tracing::error!("Loader worker exited with panic");
            }
        }
        tracing::info!("AsyncLoader stopped");
    }

    fn next_task_id(&self, name: &str, args: &str) -> String {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or_default();
        let seq = self.counter.fetch_add(1, Ordering::Relaxed);
        format!("{:x}", md5::compute(format!("{}_{}_{}_{}", name, args, nanos, seq)))
    }
}

impl Default for AsyncLoader {
    fn default() -> Self {
        Self::new(AsyncLoaderConfig::default())
    }
}

fn worker_loop(
    index: usize,
    receiver: Receiver<Message>,
    registry: Arc<TaskRegistry>,
    stopping: Arc<AtomicBool>,
    poll_interval: Duration,
) {
    tracing::debug!(worker = index, "Loader worker started");

    loop {
        match receiver.recv_timeout(poll_interval) {
            Ok(Message::Run(task)) => execute(index, task, &registry),
            Ok(Message::Shutdown) => break,
            Err(RecvTimeoutError::Timeout) => {
                if stopping.load(Ordering::SeqCst) && receiver.is_empty() {
                    break;
                }
            }
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    tracing::debug!(worker = index, "Loader worker stopped");
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("task panicked: {}", s)
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("task panicked: {}", s)
    } else {
        "task panicked".to_string()
    }
}

fn execute(worker: usize, task: QueuedTask, registry: &TaskRegistry) {
    let QueuedTask {
        task_id,
        name,
        job,
        callback,
    } = task;

    registry.mark_running(&task_id);
    tracing::debug!(worker = worker, task_id = %task_id, name = %name, "Task started");

    let outcome = match catch_unwind(AssertUnwindSafe(job)) {
        Ok(Ok(value)) => TaskOutcome::Completed(value),
        Ok(Err(error)) => {
            tracing::warn!(task_id = %task_id, name = %name, error = %error, "Task failed");
            TaskOutcome::Failed(error)
        }
        Err(payload) => {
            let message = panic_message(payload);
            tracing::error!(task_id = %task_id, name = %name, error = %message, "Task panicked");
            TaskOutcome::Failed(message)
        }
    };

    // 回调在结果可见之前执行
    if let Some(callback) = callback {
        if let Err(payload) = catch_unwind(AssertUnwindSafe(|| callback(&outcome))) {
            tracing::error!(
                task_id = %task_id,
                error = %panic_message(payload),
                "Task callback panicked"
            );
        }
    }

    registry.complete(&task_id, outcome);
}

impl TaskQueuePort for AsyncLoader {
    fn add_task(
        &self,
        name: &str,
        args: &str,
        job: TaskJob,
        callback: Option<TaskCallback>,
    ) -> Result<String, TaskError> {
        // 与 stop_workers 互斥：检查与入队之间不会插入停止信号
        let _handles = self.handles.lock();
        if !self.is_running() {
            return Err(TaskError::QueueStopped);
        }

        let task_id = self.next_task_id(name, args);
        self.registry.register(&task_id, name);

        let message = Message::Run(QueuedTask {
            task_id: task_id.clone(),
            name: name.to_string(),
            job,
            callback,
        });

        if let Err(e) = self.sender.send(message) {
            self.registry.unregister(&task_id);
            return Err(TaskError::EnqueueFailed(e.to_string()));
        }

        tracing::debug!(task_id = %task_id, name = %name, "Task enqueued");
        Ok(task_id)
    }

    fn snapshot(&self, task_id: &str) -> Option<TaskSnapshot> {
        self.registry.snapshot(task_id)
    }

    fn get_result(
        &self,
        task_id: &str,
        wait: bool,
        timeout: Option<Duration>,
    ) -> Option<TaskOutcome> {
        if wait {
            self.registry.wait_for(task_id, timeout)
        } else {
            self.registry.snapshot(task_id).and_then(|s| s.outcome)
        }
    }

    fn clear_result(&self, task_id: &str) -> bool {
        self.registry.clear_result(task_id)
    }

    fn clear_all_results(&self) {
        self.registry.clear_all_results()
    }

    fn wait_all(&self, timeout: Option<Duration>) -> bool {
        self.registry.wait_all(timeout)
    }

    fn stats(&self) -> TaskStats {
        self.registry.stats()
    }
}
