// src/pipeline/main_queue.rs
//
// Hand-off to the host's main context.
//
// Ray casting is only allowed on the context that owns the tracking
// session. The worker sends closures over an unbounded channel; the host
// drains them from its frame loop with `MainLoop::pump`.
//
//   worker ──run_sync(f)──→ [queue] ──pump()──→ f(&mut ctx) ──oneshot──→ worker
//   worker ──dispatch(f)──→ [queue] ──pump()──→ f(&mut ctx)
//
// `run_sync` blocks the calling thread and must never be called from the
// main context itself or from inside an async task.

use anyhow::{anyhow, Result};
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

type Job<C> = Box<dyn FnOnce(&mut C) + Send>;

pub struct MainQueue<C> {
    tx: mpsc::UnboundedSender<Job<C>>,
}

impl<C> Clone for MainQueue<C> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

/// Host side of the queue; owns the main-context state.
pub struct MainLoop<C> {
    rx: mpsc::UnboundedReceiver<Job<C>>,
    context: C,
}

pub fn main_queue<C: 'static>(context: C) -> (MainQueue<C>, MainLoop<C>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (MainQueue { tx }, MainLoop { rx, context })
}

impl<C: 'static> MainQueue<C> {
    /// Runs `f` on the main context and waits for its result.
    pub fn run_sync<R, F>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&mut C) -> R + Send + 'static,
        R: Send + 'static,
    {
        let (reply_tx, reply_rx) = oneshot::channel();
        let job: Job<C> = Box::new(move |ctx| {
            // Caller may have given up waiting
            let _ = reply_tx.send(f(ctx));
        });

        self.tx
            .send(job)
            .map_err(|_| anyhow!("main context is gone"))?;

        reply_rx
            .blocking_recv()
            .map_err(|_| anyhow!("main context dropped the request"))
    }

    /// Queues `f` on the main context without waiting.
    pub fn dispatch<F>(&self, f: F) -> Result<()>
    where
        F: FnOnce(&mut C) + Send + 'static,
    {
        self.tx
            .send(Box::new(f))
            .map_err(|_| anyhow!("main context is gone"))
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

impl<C: 'static> MainLoop<C> {
    /// Runs every job queued so far. Returns how many ran.
    pub fn pump(&mut self) -> usize {
        let mut ran = 0;
        while let Ok(job) = self.rx.try_recv() {
            job(&mut self.context);
            ran += 1;
        }
        if ran > 0 {
            debug!("Main context ran {} queued jobs", ran);
        }
        ran
    }

    pub fn context(&self) -> &C {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut C {
        &mut self.context
    }

    pub fn into_context(self) -> C {
        self.context
    }

    #[cfg(test)]
    pub(crate) fn pending(&self) -> usize {
        self.rx.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_run_sync_from_worker_thread() {
        let (queue, mut main_loop) = main_queue(10_i32);

        let worker = thread::spawn(move || {
            let doubled = queue.run_sync(|n| *n * 2).unwrap();
            queue.run_sync(move |n| *n += doubled).unwrap();
            doubled
        });

        while !worker.is_finished() {
            main_loop.pump();
            thread::sleep(Duration::from_millis(1));
        }
        assert_eq!(worker.join().unwrap(), 20);
        assert_eq!(*main_loop.context(), 30);
    }

    #[test]
    fn test_dispatch_runs_on_pump() {
        let (queue, mut main_loop) = main_queue(Vec::<&'static str>::new());
        queue.dispatch(|log| log.push("a")).unwrap();
        queue.dispatch(|log| log.push("b")).unwrap();

        assert!(main_loop.context().is_empty());
        assert_eq!(main_loop.pump(), 2);
        assert_eq!(main_loop.into_context(), vec!["a", "b"]);
    }

    #[test]
    fn test_run_sync_fails_when_main_gone() {
        let (queue, main_loop) = main_queue(());
        drop(main_loop);
        assert!(queue.is_closed());
        assert!(queue.run_sync(|_| 1).is_err());
        assert!(queue.dispatch(|_| {}).is_err());
    }
}
