//! In-Memory Task Registry
//!
//! 保存后台任务的状态与结果，完成时通过条件变量唤醒等待者

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::{Condvar, Mutex};
use std::time::{Duration, Instant};

use crate::application::ports::{TaskOutcome, TaskSnapshot, TaskState, TaskStats};

#[derive(Debug, Clone)]
struct TaskSlot {
    name: String,
    state: TaskState,
    outcome: Option<TaskOutcome>,
    created_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
}

/// 内存任务登记表
pub struct TaskRegistry {
    /// task_id -> TaskSlot
    tasks: DashMap<String, TaskSlot>,
    /// 状态变化通知
    signal: Mutex<()>,
    changed: Condvar,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self {
            tasks: DashMap::new(),
            signal: Mutex::new(()),
            changed: Condvar::new(),
        }
    }

    fn notify(&self) {
        let _guard = self.signal.lock();
        self.changed.notify_all();
    }

    /// 登记新任务（pending）
    pub fn register(&self, task_id: &str, name: &str) {
        self.tasks.insert(
            task_id.to_string(),
            TaskSlot {
                name: name.to_string(),
                state: TaskState::Pending,
                outcome: None,
                created_at: Utc::now(),
                completed_at: None,
            },
        );
    }

    /// 删除未能入队的任务
    pub fn unregister(&self, task_id: &str) {
        self.tasks.remove(task_id);
        self.notify();
    }

    pub fn mark_running(&self, task_id: &str) {
        if let Some(mut slot) = self.tasks.get_mut(task_id) {
            slot.state = TaskState::Running;
        }
    }

    /// 记录结果并唤醒等待者
    pub fn complete(&self, task_id: &str, outcome: TaskOutcome) {
        if let Some(mut slot) = self.tasks.get_mut(task_id) {
            let elapsed_ms = (Utc::now() - slot.created_at).num_milliseconds();
            slot.state = outcome.state();
            slot.outcome = Some(outcome);
            slot.completed_at = Some(Utc::now());

            tracing::debug!(
                task_id = %task_id,
                name = %slot.name,
                state = slot.state.as_str(),
                elapsed_ms = elapsed_ms,
                "Task finished"
            );
        }
        self.notify();
    }

    pub fn snapshot(&self, task_id: &str) -> Option<TaskSnapshot> {
        self.tasks.get(task_id).map(|slot| TaskSnapshot {
            task_id: task_id.to_string(),
            name: slot.name.clone(),
            state: slot.state,
            outcome: slot.outcome.clone(),
        })
    }

    fn outcome(&self, task_id: &str) -> Option<Option<TaskOutcome>> {
        self.tasks.get(task_id).map(|slot| slot.outcome.clone())
    }

    /// 等待任务结束
    ///
    /// 未知任务立即返回 None；超时返回 None，任务本身不受影响
    pub fn wait_for(&self, task_id: &str, timeout: Option<Duration>) -> Option<TaskOutcome> {
        let deadline = timeout.map(|t| Instant::now() + t);
        let mut guard = self.signal.lock();

        loop {
            match self.outcome(task_id) {
                None => return None,
                Some(Some(outcome)) => return Some(outcome),
                Some(None) => {}
            }

            match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return None;
                    }
                    self.changed.wait_for(&mut guard, deadline - now);
                }
                None => self.changed.wait(&mut guard),
            }
        }
    }

    fn has_unfinished(&self) -> bool {
        self.tasks.iter().any(|slot| !slot.state.is_terminal())
    }

    /// 等待所有任务结束，超时返回 false
    pub fn wait_all(&self, timeout: Option<Duration>) -> bool {
        let deadline = timeout.map(|t| Instant::now() + t);
        let mut guard = self.signal.lock();

        while self.has_unfinished() {
            match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return false;
                    }
                    self.changed.wait_for(&mut guard, deadline - now);
                }
                None => self.changed.wait(&mut guard),
            }
        }
        true
    }

    /// 删除已结束任务的结果
    pub fn clear_result(&self, task_id: &str) -> bool {
        self.tasks
            .remove_if(task_id, |_, slot| slot.state.is_terminal())
            .is_some()
    }

    pub fn clear_all_results(&self) {
        let before = self.tasks.len();
        self.tasks.retain(|_, slot| !slot.state.is_terminal());
        tracing::debug!(removed = before.saturating_sub(self.tasks.len()), "Task results cleared");
    }

    pub fn stats(&self) -> TaskStats {
        let mut stats = TaskStats::default();
        for slot in self.tasks.iter() {
            match slot.state {
                TaskState::Pending => stats.pending += 1,
                TaskState::Running => stats.running += 1,
                TaskState::Completed => stats.completed += 1,
                TaskState::Failed => stats.failed += 1,
            }
        }
        stats
    }
}

impl Default for TaskRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_task_lifecycle() {
        let registry = TaskRegistry::new();
        registry.register("t1", "preload_pdf");
        assert_eq!(registry.snapshot("t1").unwrap().state, TaskState::Pending);

        registry.mark_running("t1");
        assert_eq!(registry.snapshot("t1").unwrap().state, TaskState::Running);
        assert!(!registry.clear_result("t1"));

        registry.complete("t1", TaskOutcome::Completed(json!({"ok": true})));
        let snapshot = registry.snapshot("t1").unwrap();
        assert_eq!(snapshot.state, TaskState::Completed);
        assert_eq!(snapshot.outcome, Some(TaskOutcome::Completed(json!({"ok": true}))));

        assert!(registry.clear_result("t1"));
        assert!(registry.snapshot("t1").is_none());
    }

    #[test]
    fn test_wait_for_blocks_until_complete() {
        let registry = Arc::new(TaskRegistry::new());
        registry.register("t1", "job");

        let r = registry.clone();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            r.complete("t1", TaskOutcome::Failed("boom".into()));
        });

        let outcome = registry.wait_for("t1", Some(Duration::from_secs(5)));
        assert_eq!(outcome, Some(TaskOutcome::Failed("boom".into())));
        handle.join().unwrap();
    }

    #[test]
    fn test_wait_for_timeout_and_unknown() {
        let registry = TaskRegistry::new();
        registry.register("t1", "job");
        assert_eq!(registry.wait_for("t1", Some(Duration::from_millis(20))), None);
        assert_eq!(registry.wait_for("nope", None), None);
    }

    #[test]
    fn test_wait_all_and_stats() {
        let registry = Arc::new(TaskRegistry::new());
        registry.register("a", "job");
        registry.register("b", "job");
        assert!(!registry.wait_all(Some(Duration::from_millis(10))));

        let r = registry.clone();
        let handle = thread::spawn(move || {
            r.complete("a", TaskOutcome::Completed(json!(1)));
            r.complete("b", TaskOutcome::Failed("x".into()));
        });
        assert!(registry.wait_all(Some(Duration::from_secs(5))));
        handle.join().unwrap();

        let stats = registry.stats();
        assert_eq!(stats.completed, 1);
        assert_eq!(stats.failed, 1);

        registry.register("c", "job");
        registry.clear_all_results();
        let stats = registry.stats();
        assert_eq!(stats.completed + stats.failed, 0);
        assert_eq!(stats.pending, 1);
    }
}
