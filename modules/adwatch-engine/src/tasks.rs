use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio::task::JoinHandle;
use tracing::{debug, info};

/// A handle to one domain's background run: a cooperative cancel flag plus
/// the spawned task. The flag is the only cancellation mechanism; the task
/// is never aborted.
pub struct TaskHandle {
    cancelled: Arc<AtomicBool>,
    join: JoinHandle<()>,
}

impl TaskHandle {
    pub fn new(cancelled: Arc<AtomicBool>, join: JoinHandle<()>) -> Self {
        Self { cancelled, join }
    }

    pub fn request_cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }
}

/// Maps domain name → live task handle. At most one live handle per domain:
/// registering a new task cancels and replaces any predecessor.
#[derive(Default)]
pub struct TaskRegistry {
    tasks: Mutex<HashMap<String, TaskHandle>>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, domain: &str, handle: TaskHandle) {
        let mut tasks = self.tasks.lock().expect("task registry lock poisoned");
        if let Some(old) = tasks.insert(domain.to_string(), handle) {
            if !old.is_finished() {
                info!(domain, "Replacing live task, cancelling predecessor");
                old.request_cancel();
            }
        }
    }

    /// Request cooperative cancellation of the domain's task. Returns true
    /// if a live task was found and signalled, false otherwise (a no-op,
    /// not an error).
    pub fn request_cancel(&self, domain: &str) -> bool {
        let mut tasks = self.tasks.lock().expect("task registry lock poisoned");
        match tasks.remove(domain) {
            Some(handle) if !handle.is_finished() => {
                handle.request_cancel();
                info!(domain, "Cancellation requested");
                true
            }
            Some(_) => {
                debug!(domain, "Task already finished, nothing to cancel");
                false
            }
            None => false,
        }
    }

    /// True when the domain has a registered, unfinished task.
    pub fn is_active(&self, domain: &str) -> bool {
        let tasks = self.tasks.lock().expect("task registry lock poisoned");
        tasks.get(domain).is_some_and(|h| !h.is_finished())
    }

    /// Drop the registry entry without cancelling. Called by a task on its
    /// own natural completion.
    pub fn remove(&self, domain: &str) {
        let mut tasks = self.tasks.lock().expect("task registry lock poisoned");
        tasks.remove(domain);
    }

    pub fn live_count(&self) -> usize {
        let tasks = self.tasks.lock().expect("task registry lock poisoned");
        tasks.values().filter(|h| !h.is_finished()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn spawn_waiting_task(cancelled: Arc<AtomicBool>) -> JoinHandle<()> {
        tokio::spawn(async move {
            while !cancelled.load(Ordering::Relaxed) {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
    }

    #[tokio::test]
    async fn at_most_one_live_handle_per_domain() {
        let registry = TaskRegistry::new();

        let first_flag = Arc::new(AtomicBool::new(false));
        let first = TaskHandle::new(first_flag.clone(), spawn_waiting_task(first_flag.clone()));
        registry.register("shop.example", first);

        let second_flag = Arc::new(AtomicBool::new(false));
        let second = TaskHandle::new(second_flag.clone(), spawn_waiting_task(second_flag.clone()));
        registry.register("shop.example", second);

        // Predecessor was cancelled by the replacement
        assert!(first_flag.load(Ordering::Relaxed));
        assert!(!second_flag.load(Ordering::Relaxed));
        assert_eq!(registry.live_count(), 1);

        assert!(registry.request_cancel("shop.example"));
    }

    #[tokio::test]
    async fn cancel_returns_false_when_no_task() {
        let registry = TaskRegistry::new();
        assert!(!registry.request_cancel("missing.example"));
    }

    #[tokio::test]
    async fn cancel_returns_false_when_task_already_finished() {
        let registry = TaskRegistry::new();

        let flag = Arc::new(AtomicBool::new(false));
        let join = tokio::spawn(async {});
        // Let the trivial task finish
        tokio::time::sleep(Duration::from_millis(20)).await;

        registry.register("done.example", TaskHandle::new(flag, join));
        assert!(!registry.request_cancel("done.example"));
        assert!(!registry.is_active("done.example"));
    }

    #[tokio::test]
    async fn cancelled_task_observes_flag_and_exits() {
        let registry = TaskRegistry::new();

        let flag = Arc::new(AtomicBool::new(false));
        let join = spawn_waiting_task(flag.clone());
        registry.register("loop.example", TaskHandle::new(flag, join));

        assert!(registry.is_active("loop.example"));
        assert!(registry.request_cancel("loop.example"));

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(registry.live_count(), 0);
    }
}
