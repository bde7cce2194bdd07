//! In-order background job queue.
//!
//! Bus callbacks are synchronous, so components that react to events with
//! storage work push a job here and return. One tokio task drains the queue
//! in submission order.

use crate::error::DomainError;
use std::future::Future;
use std::sync::{Mutex, PoisonError};
use tally_core::component::{ErrorPhase, ErrorReporter};
use tally_core::event_bus::HandlerError;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

enum Message<J> {
    Job(J),
    Flush(oneshot::Sender<()>),
    Stop,
}

struct Running<J> {
    sender: mpsc::UnboundedSender<Message<J>>,
    handle: JoinHandle<()>,
}

/// Cloneable producer side of a [`JobQueue`].
pub(crate) struct JobSender<J> {
    queue: &'static str,
    sender: mpsc::UnboundedSender<Message<J>>,
}

impl<J> Clone for JobSender<J> {
    fn clone(&self) -> Self {
        Self {
            queue: self.queue,
            sender: self.sender.clone(),
        }
    }
}

impl<J> JobSender<J> {
    /// Enqueues `job`. Fails once the worker has stopped.
    pub(crate) fn send(&self, job: J) -> Result<(), HandlerError> {
        self.sender
            .send(Message::Job(job))
            .map_err(|_| format!("{} worker is not running", self.queue).into())
    }
}

/// A single-consumer job queue whose worker lives between `start` and `stop`.
pub(crate) struct JobQueue<J> {
    name: &'static str,
    running: Mutex<Option<Running<J>>>,
}

impl<J: Send + 'static> JobQueue<J> {
    pub(crate) const fn new(name: &'static str) -> Self {
        Self {
            name,
            running: Mutex::new(None),
        }
    }

    /// Spawns the worker. Handler failures are logged and reported as
    /// runtime errors; the worker keeps going.
    pub(crate) fn start<H, Fut>(&self, reporter: ErrorReporter, handler: H) -> JobSender<J>
    where
        H: Fn(J) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), DomainError>> + Send,
    {
        let (sender, mut receiver) = mpsc::unbounded_channel::<Message<J>>();
        let name = self.name;
        let handle = tokio::spawn(async move {
            while let Some(message) = receiver.recv().await {
                match message {
                    Message::Job(job) => {
                        if let Err(err) = handler(job).await {
                            warn!(queue = name, error = %err, "Background job failed");
                            reporter.report(ErrorPhase::Runtime, &err);
                        }
                    }
                    Message::Flush(done) => {
                        let _ = done.send(());
                    }
                    Message::Stop => break,
                }
            }
            debug!(queue = name, "Worker stopped");
        });

        let producer = JobSender {
            queue: name,
            sender: sender.clone(),
        };
        *self.running.lock().unwrap_or_else(PoisonError::into_inner) =
            Some(Running { sender, handle });
        producer
    }

    /// Waits until every job queued before this call has finished.
    pub(crate) async fn settle(&self) {
        let sender = self
            .running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|running| running.sender.clone());
        let Some(sender) = sender else {
            return;
        };
        let (done, wait) = oneshot::channel();
        if sender.send(Message::Flush(done)).is_ok() {
            let _ = wait.await;
        }
    }

    /// Finishes queued jobs, then stops the worker. Later sends fail.
    pub(crate) async fn stop(&self) {
        let running = self
            .running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(running) = running else {
            return;
        };
        let _ = running.sender.send(Message::Stop);
        if let Err(err) = running.handle.await {
            warn!(queue = self.name, error = %err, "Worker task ended abnormally");
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use std::sync::Arc;
    use tally_core::component::ComponentBase;
    use tally_core::event::EventKind;
    use tally_core::event_bus::EventBus;
    use tally_testing::EventRecorder;

    #[tokio::test]
    async fn jobs_run_in_order_and_settle_waits() {
        let queue = JobQueue::new("test");
        let seen = Arc::new(Mutex::new(Vec::new()));
        let base = ComponentBase::new("test", EventBus::new());

        let sink = Arc::clone(&seen);
        let sender = queue.start(base.reporter(), move |n: u32| {
            let sink = Arc::clone(&sink);
            async move {
                tokio::task::yield_now().await;
                sink.lock().unwrap().push(n);
                Ok(())
            }
        });
        for n in 0..5 {
            sender.send(n).unwrap();
        }
        queue.settle().await;

        assert_eq!(*seen.lock().unwrap(), vec![0, 1, 2, 3, 4]);
        queue.stop().await;
        assert!(sender.send(9).is_err());
    }

    #[tokio::test]
    async fn failures_are_reported_and_worker_continues() {
        let bus = EventBus::new();
        let recorder = EventRecorder::attach(&bus, &[EventKind::ComponentError]);
        let base = ComponentBase::new("test", bus);
        let queue = JobQueue::new("test");
        let done = Arc::new(Mutex::new(0));

        let counter = Arc::clone(&done);
        let sender = queue.start(base.reporter(), move |fail: bool| {
            let counter = Arc::clone(&counter);
            async move {
                if fail {
                    return Err(DomainError::Validation("boom".into()));
                }
                *counter.lock().unwrap() += 1;
                Ok(())
            }
        });
        sender.send(true).unwrap();
        sender.send(false).unwrap();
        queue.settle().await;

        assert_eq!(recorder.count(EventKind::ComponentError), 1);
        assert_eq!(*done.lock().unwrap(), 1);
        queue.stop().await;
    }

    #[tokio::test]
    async fn stop_drains_pending_jobs() {
        let queue = JobQueue::new("test");
        let base = ComponentBase::new("test", EventBus::new());
        let seen = Arc::new(Mutex::new(0));

        let sink = Arc::clone(&seen);
        let sender = queue.start(base.reporter(), move |()| {
            let sink = Arc::clone(&sink);
            async move {
                *sink.lock().unwrap() += 1;
                Ok(())
            }
        });
        for _ in 0..3 {
            sender.send(()).unwrap();
        }
        queue.stop().await;

        assert_eq!(*seen.lock().unwrap(), 3);
    }
}
