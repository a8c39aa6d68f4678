// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Quiescence debouncer. Scheduling replaces (aborts) whatever was pending, so
// only the last request after a pause runs.

use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::debug;

#[derive(Debug)]
pub struct Debouncer {
    delay: Duration,
    pending: Option<JoinHandle<()>>,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: None,
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Run `task` once `delay` passes without another call to `schedule`.
    /// Must be called from within a tokio runtime.
    pub fn schedule<F>(&mut self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if self.cancel() {
            debug!("debounced task superseded");
        }
        let delay = self.delay;
        self.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            task.await;
        }));
    }

    /// Abort the pending task. Returns whether one was still waiting or
    /// running.
    pub fn cancel(&mut self) -> bool {
        match self.pending.take() {
            Some(handle) => {
                let live = !handle.is_finished();
                handle.abort();
                live
            }
            None => false,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn recorder() -> Arc<Mutex<Vec<u32>>> {
        Arc::new(Mutex::new(Vec::new()))
    }

    fn push(log: &Arc<Mutex<Vec<u32>>>, value: u32) -> impl Future<Output = ()> + Send + 'static {
        let log = Arc::clone(log);
        async move {
            log.lock().expect("lock").push(value);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn only_the_last_schedule_runs() {
        let log = recorder();
        let mut debouncer = Debouncer::new(Duration::from_millis(300));

        for value in 1..=3 {
            debouncer.schedule(push(&log, value));
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        assert!(debouncer.is_pending());
        assert!(log.lock().expect("lock").is_empty());

        tokio::time::sleep(Duration::from_millis(400)).await;
        assert_eq!(*log.lock().expect("lock"), vec![3]);
        assert!(!debouncer.is_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn spaced_out_schedules_all_run() {
        let log = recorder();
        let mut debouncer = Debouncer::new(Duration::from_millis(300));

        debouncer.schedule(push(&log, 1));
        tokio::time::sleep(Duration::from_millis(350)).await;
        debouncer.schedule(push(&log, 2));
        tokio::time::sleep(Duration::from_millis(350)).await;

        assert_eq!(*log.lock().expect("lock"), vec![1, 2]);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_drops_pending_task() {
        let log = recorder();
        let mut debouncer = Debouncer::new(Duration::from_millis(300));

        debouncer.schedule(push(&log, 1));
        assert!(debouncer.cancel());
        assert!(!debouncer.cancel());
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(log.lock().expect("lock").is_empty());
    }
}
