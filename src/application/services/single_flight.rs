//! Single-flight - 相同 key 的并发计算合并为一次
//!
//! 第一个调用者执行计算，其余调用者阻塞等待并共享结果

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;

struct Call<T> {
    state: Mutex<CallState<T>>,
    done: Condvar,
}

struct CallState<T> {
    finished: bool,
    value: Option<T>,
}

/// 计算结束（包括 panic）时唤醒等待者并移除 key
struct LeaderGuard<'a, T> {
    group: &'a SingleFlight<T>,
    key: &'a str,
    call: Arc<Call<T>>,
    value: Option<T>,
}

impl<T> Drop for LeaderGuard<'_, T> {
    fn drop(&mut self) {
        self.group.calls.remove(self.key);
        let mut state = self.call.state.lock();
        state.finished = true;
        state.value = self.value.take();
        self.call.done.notify_all();
    }
}

/// 按 key 合并并发计算
pub struct SingleFlight<T> {
    calls: DashMap<String, Arc<Call<T>>>,
}

impl<T: Clone> SingleFlight<T> {
    pub fn new() -> Self {
        Self {
            calls: DashMap::new(),
        }
    }

    /// 执行或等待 key 对应的计算
    ///
    /// 若执行者 panic，等待者会自行执行一次 `compute`
    pub fn run<F>(&self, key: &str, compute: F) -> T
    where
        F: FnOnce() -> T,
    {
        let (call, leader) = match self.calls.entry(key.to_string()) {
            Entry::Occupied(e) => (e.get().clone(), false),
            Entry::Vacant(e) => {
                let call = Arc::new(Call {
                    state: Mutex::new(CallState {
                        finished: false,
                        value: None,
                    }),
                    done: Condvar::new(),
                });
                e.insert(call.clone());
                (call, true)
            }
        };

        if leader {
            let mut guard = LeaderGuard {
                group: self,
                key,
                call,
                value: None,
            };
            let value = compute();
            guard.value = Some(value.clone());
            return value;
        }

        tracing::debug!(key = %key, "Waiting for in-flight computation");
        let shared = {
            let mut state = call.state.lock();
            while !state.finished {
                call.done.wait(&mut state);
            }
            state.value.clone()
        };

        match shared {
            Some(value) => value,
            None => compute(),
        }
    }

    /// 进行中的 key 数量
    pub fn in_flight(&self) -> usize {
        self.calls.len()
    }
}

impl<T: Clone> Default for SingleFlight<T> {
    fn default() -> Self {
        Self::new()
    }
}
