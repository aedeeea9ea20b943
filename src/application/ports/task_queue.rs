//! Task Queue Port - 后台预加载任务
//!
//! 定义任务队列的抽象接口，具体实现在 infrastructure/worker (线程池) 与
//! infrastructure/memory (结果登记表)

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

/// Task Queue 错误
#[derive(Debug, Error)]
pub enum TaskError {
    #[error("Task not found: {0}")]
    NotFound(String),

    #[error("Task queue is not running")]
    QueueStopped,

    #[error("Failed to enqueue task: {0}")]
    EnqueueFailed(String),
}

/// 任务状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    /// 已入队，等待 worker
    Pending,
    /// worker 执行中
    Running,
    /// 执行完成
    Completed,
    /// 执行失败（包括 panic）
    Failed,
}

impl TaskState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskState::Pending => "pending",
            TaskState::Running => "running",
            TaskState::Completed => "completed",
            TaskState::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskState::Completed | TaskState::Failed)
    }
}

/// 任务结果
#[derive(Debug, Clone, PartialEq)]
pub enum TaskOutcome {
    Completed(Value),
    Failed(String),
}

impl TaskOutcome {
    pub fn state(&self) -> TaskState {
        match self {
            TaskOutcome::Completed(_) => TaskState::Completed,
            TaskOutcome::Failed(_) => TaskState::Failed,
        }
    }
}

/// 任务快照
#[derive(Debug, Clone)]
pub struct TaskSnapshot {
    pub task_id: String,
    pub name: String,
    pub state: TaskState,
    pub outcome: Option<TaskOutcome>,
}

/// 登记表统计
#[derive(Debug, Clone, Default, Serialize)]
pub struct TaskStats {
    pub pending: usize,
    pub running: usize,
    pub completed: usize,
    pub failed: usize,
}

/// 任务函数，返回 JSON 结果或错误信息
pub type TaskJob = Box<dyn FnOnce() -> Result<Value, String> + Send + 'static>;

/// 任务完成回调
pub type TaskCallback = Box<dyn FnOnce(&TaskOutcome) + Send + 'static>;

/// Task Queue Port
pub trait TaskQueuePort: Send + Sync {
    /// 入队任务，立即返回任务 ID
    ///
    /// `args` 只参与任务 ID 计算
    fn add_task(
        &self,
        name: &str,
        args: &str,
        job: TaskJob,
        callback: Option<TaskCallback>,
    ) -> Result<String, TaskError>;

    /// 任务快照
    fn snapshot(&self, task_id: &str) -> Option<TaskSnapshot>;

    /// 获取结果；`wait` 为 true 时阻塞直到完成或超时
    fn get_result(&self, task_id: &str, wait: bool, timeout: Option<Duration>)
        -> Option<TaskOutcome>;

    /// 删除已完成任务的结果，返回是否删除
    fn clear_result(&self, task_id: &str) -> bool;

    /// 删除所有已完成任务的结果
    fn clear_all_results(&self);

    /// 等待所有任务完成，超时返回 false
    fn wait_all(&self, timeout: Option<Duration>) -> bool;

    fn stats(&self) -> TaskStats;
}
