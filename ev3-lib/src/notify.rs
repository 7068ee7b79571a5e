//! Change notifications.
//!
//! Handlers run on the context they were registered for: inline on the
//! polling task, on a tokio runtime, or queued for a thread that drains a
//! [`ContextQueue`] itself (typically a UI thread).

use crate::port::BrickSnapshot;
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;
use tracing::trace;

pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Where a notification handler gets executed.
pub trait Dispatcher: Send + Sync {
    fn dispatch(&self, job: Job);
}

/// Runs handlers directly on the notifying task.
#[derive(Debug, Clone, Copy, Default)]
pub struct Inline;

impl Dispatcher for Inline {
    fn dispatch(&self, job: Job) {
        job();
    }
}

impl Dispatcher for tokio::runtime::Handle {
    fn dispatch(&self, job: Job) {
        self.spawn(async move { job() });
    }
}

/// Sending side of a context queue. Cheap to clone.
#[derive(Clone)]
pub struct ContextDispatcher {
    sender: mpsc::UnboundedSender<Job>,
}

impl Dispatcher for ContextDispatcher {
    fn dispatch(&self, job: Job) {
        if self.sender.send(job).is_err() {
            trace!("Context queue closed, notification dropped");
        }
    }
}

/// Jobs waiting for their owning context to run them.
pub struct ContextQueue {
    receiver: mpsc::UnboundedReceiver<Job>,
}

/// Creates a queue for a context that drains its own notifications.
pub fn context_queue() -> (ContextDispatcher, ContextQueue) {
    let (sender, receiver) = mpsc::unbounded_channel();
    (ContextDispatcher { sender }, ContextQueue { receiver })
}

impl ContextQueue {
    /// Runs everything queued so far without waiting. Returns the number of
    /// jobs run.
    pub fn run_pending(&mut self) -> usize {
        let mut count = 0;
        while let Ok(job) = self.receiver.try_recv() {
            job();
            count += 1;
        }
        count
    }

    /// Runs jobs as they arrive until every dispatcher is gone.
    pub async fn run(&mut self) {
        while let Some(job) = self.receiver.recv().await {
            job();
        }
    }
}

pub type SubscriptionId = u64;

type Handler = Arc<dyn Fn(&BrickSnapshot) + Send + Sync>;

#[derive(Clone)]
struct Subscription {
    id: SubscriptionId,
    handler: Handler,
    dispatcher: Option<Arc<dyn Dispatcher>>,
}

#[derive(Default)]
pub(crate) struct Subscribers {
    next_id: AtomicU64,
    entries: Mutex<Vec<Subscription>>,
}

impl Subscribers {
    pub fn add(&self, handler: Handler, dispatcher: Option<Arc<dyn Dispatcher>>) -> SubscriptionId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        self.entries.lock().push(Subscription {
            id,
            handler,
            dispatcher,
        });
        id
    }

    pub fn remove(&self, id: SubscriptionId) -> bool {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|s| s.id != id);
        entries.len() != before
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Hands `snapshot` to every subscriber. Handlers are called outside the
    /// subscriber lock so they may unsubscribe themselves.
    pub fn notify(&self, snapshot: BrickSnapshot) {
        let entries = self.entries.lock().clone();
        let snapshot = Arc::new(snapshot);
        for subscription in entries {
            match subscription.dispatcher {
                None => (subscription.handler)(&snapshot),
                Some(dispatcher) => {
                    let handler = subscription.handler;
                    let snapshot = snapshot.clone();
                    dispatcher.dispatch(Box::new(move || handler(&snapshot)));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::BrickButtons;
    use std::sync::atomic::AtomicUsize;
    use std::thread;

    fn snapshot() -> BrickSnapshot {
        BrickSnapshot {
            ports: Vec::new(),
            buttons: BrickButtons::default(),
        }
    }

    #[test]
    fn test_inline_and_removal() {
        let subscribers = Subscribers::default();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let id = subscribers.add(
            Arc::new(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
            None,
        );
        subscribers.notify(snapshot());
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        assert!(subscribers.remove(id));
        assert!(!subscribers.remove(id));
        subscribers.notify(snapshot());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_queued_handlers_run_on_draining_thread() {
        let (dispatcher, mut queue) = context_queue();
        let subscribers = Arc::new(Subscribers::default());
        let seen_on = Arc::new(Mutex::new(None));
        let slot = seen_on.clone();
        subscribers.add(
            Arc::new(move |_| {
                *slot.lock() = Some(thread::current().id());
            }),
            Some(Arc::new(dispatcher)),
        );

        let notifier = subscribers.clone();
        thread::spawn(move || notifier.notify(snapshot())).join().unwrap();
        assert!(seen_on.lock().is_none());

        assert_eq!(queue.run_pending(), 1);
        assert_eq!(*seen_on.lock(), Some(thread::current().id()));
    }
}
