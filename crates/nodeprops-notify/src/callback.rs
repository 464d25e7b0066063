//! Ordered, asynchronous fan-out of callbacks to registered listeners.
//!
//! Every enqueued callback is delivered once to every listener registered
//! at the time of enqueueing. Each registration owns a FIFO queue and at
//! most one drain task at a time, so:
//! - calls for one listener never overlap and keep enqueue order
//! - different listeners are drained concurrently and independently
//! - producers only push to queues and never wait for listener code
//!
//! A listener whose callback fails (returns an error or panics) is handled
//! according to the manager's [`CallbackExceptionPolicy`].

use std::collections::{HashMap, VecDeque};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use nodeprops_protocol::ListenerError;

use crate::pool::TaskExecutor;

/// A callback delivered to each listener.
pub type AsyncCallback<L> = Arc<dyn Fn(&L) -> Result<(), ListenerError> + Send + Sync>;

/// Build an [`AsyncCallback`] from a closure.
pub fn async_callback<L, F>(f: F) -> AsyncCallback<L>
where
    L: ?Sized,
    F: Fn(&L) -> Result<(), ListenerError> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// What to do with a listener whose callback failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CallbackExceptionPolicy {
    /// Log the failure and cancel the registration; nothing further is
    /// delivered to it.
    #[default]
    LogAndCancelListener,
    /// Log the failure and keep delivering.
    LogAndProceed,
}

/// Handle of one listener registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Registration(u64);

impl Registration {
    pub fn id(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for Registration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "registration-{}", self.0)
    }
}

struct SlotQueue<L: ?Sized> {
    pending: VecDeque<AsyncCallback<L>>,
    /// True while a drain task for this slot is scheduled or running.
    draining: bool,
}

struct ListenerSlot<L: ?Sized> {
    registration: Registration,
    listener: Arc<L>,
    queue: Mutex<SlotQueue<L>>,
    cancelled: AtomicBool,
}

struct Shared<L: ?Sized> {
    slots: Mutex<HashMap<Registration, Arc<ListenerSlot<L>>>>,
    executor: Arc<dyn TaskExecutor>,
    policy: CallbackExceptionPolicy,
    next_id: AtomicU64,
}

/// Delivers callbacks to listeners of type `L`, in order, off-thread.
pub struct OrderedCallbackManager<L: ?Sized + Send + Sync + 'static> {
    shared: Arc<Shared<L>>,
}

impl<L: ?Sized + Send + Sync + 'static> OrderedCallbackManager<L> {
    pub fn new(executor: Arc<dyn TaskExecutor>, policy: CallbackExceptionPolicy) -> Self {
        Self {
            shared: Arc::new(Shared {
                slots: Mutex::new(HashMap::new()),
                executor,
                policy,
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// Register a listener with nothing queued for it yet.
    pub fn add_listener(&self, listener: Arc<L>) -> Registration {
        self.register(listener, None)
    }

    /// Register a listener and queue `initial` as its first callback, ahead
    /// of anything enqueued afterwards.
    pub fn add_listener_and_enqueue_callback(
        &self,
        listener: Arc<L>,
        initial: AsyncCallback<L>,
    ) -> Registration {
        self.register(listener, Some(initial))
    }

    fn register(&self, listener: Arc<L>, initial: Option<AsyncCallback<L>>) -> Registration {
        let registration = Registration(self.shared.next_id.fetch_add(1, Ordering::Relaxed));
        let slot = Arc::new(ListenerSlot {
            registration,
            listener,
            queue: Mutex::new(SlotQueue {
                pending: VecDeque::new(),
                draining: false,
            }),
            cancelled: AtomicBool::new(false),
        });

        let mut slots = self.shared.slots.lock();
        slots.insert(registration, Arc::clone(&slot));
        if let Some(callback) = initial {
            Shared::push(&self.shared, &slot, callback);
        }
        drop(slots);

        tracing::debug!(%registration, "Listener registered");
        registration
    }

    /// Remove a registration. Nothing enqueued after this call reaches it;
    /// callbacks already queued for it are dropped.
    ///
    /// Returns `false` if the registration was unknown or already removed.
    pub fn remove_listener(&self, registration: Registration) -> bool {
        let removed = self.shared.remove(registration);
        if removed {
            tracing::debug!(%registration, "Listener unregistered");
        }
        removed
    }

    /// Queue `callback` for every current listener.
    pub fn enqueue_callback(&self, callback: AsyncCallback<L>) {
        // Holding the registry lock across the loop gives every listener the
        // same relative order of concurrently enqueued callbacks.
        let slots = self.shared.slots.lock();
        for slot in slots.values() {
            Shared::push(&self.shared, slot, Arc::clone(&callback));
        }
    }

    pub fn listener_count(&self) -> usize {
        self.shared.slots.lock().len()
    }

    pub fn is_registered(&self, registration: Registration) -> bool {
        self.shared.slots.lock().contains_key(&registration)
    }

    pub fn policy(&self) -> CallbackExceptionPolicy {
        self.shared.policy
    }
}

impl<L: ?Sized + Send + Sync + 'static> Shared<L> {
    fn remove(&self, registration: Registration) -> bool {
        match self.slots.lock().remove(&registration) {
            Some(slot) => {
                slot.cancelled.store(true, Ordering::SeqCst);
                true
            }
            None => false,
        }
    }

    /// Append to the slot's queue and schedule a drain task if none is active.
    fn push(shared: &Arc<Self>, slot: &Arc<ListenerSlot<L>>, callback: AsyncCallback<L>) {
        let schedule = {
            let mut queue = slot.queue.lock();
            queue.pending.push_back(callback);
            !std::mem::replace(&mut queue.draining, true)
        };
        if !schedule {
            return;
        }

        let task_shared = Arc::clone(shared);
        let task_slot = Arc::clone(slot);
        if let Err(e) = shared
            .executor
            .execute(Box::new(move || Shared::drain(&task_shared, &task_slot)))
        {
            let mut queue = slot.queue.lock();
            let dropped = queue.pending.len();
            queue.pending.clear();
            queue.draining = false;
            tracing::error!(
                registration = %slot.registration,
                dropped,
                error = %e,
                "Could not schedule listener callbacks"
            );
        }
    }

    /// Run the slot's queued callbacks one after another until it is empty
    /// or the registration is cancelled.
    fn drain(shared: &Arc<Self>, slot: &Arc<ListenerSlot<L>>) {
        loop {
            let callback = {
                let mut queue = slot.queue.lock();
                if slot.cancelled.load(Ordering::SeqCst) {
                    queue.pending.clear();
                    queue.draining = false;
                    return;
                }
                match queue.pending.pop_front() {
                    Some(callback) => callback,
                    None => {
                        queue.draining = false;
                        return;
                    }
                }
            };

            let listener: &L = &slot.listener;
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| callback(listener)));
            let error = match outcome {
                Ok(Ok(())) => continue,
                Ok(Err(e)) => e.to_string(),
                Err(payload) => panic_message(payload.as_ref()),
            };

            match shared.policy {
                CallbackExceptionPolicy::LogAndCancelListener => {
                    tracing::warn!(
                        registration = %slot.registration,
                        error = %error,
                        "Listener callback failed; cancelling registration"
                    );
                    shared.remove(slot.registration);
                }
                CallbackExceptionPolicy::LogAndProceed => {
                    tracing::warn!(
                        registration = %slot.registration,
                        error = %error,
                        "Listener callback failed"
                    );
                }
            }
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("panicked: {s}")
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("panicked: {s}")
    } else {
        "panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{WorkerPool, WorkerPoolConfig};
    use std::time::{Duration, Instant};

    trait Sink: Send + Sync {
        fn push(&self, value: u32) -> Result<(), ListenerError>;
    }

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<u32>>,
    }

    impl Sink for Recorder {
        fn push(&self, value: u32) -> Result<(), ListenerError> {
            self.seen.lock().push(value);
            Ok(())
        }
    }

    fn wait_until(cond: impl Fn() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if cond() {
                return true;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        cond()
    }

    fn push(value: u32) -> AsyncCallback<dyn Sink> {
        async_callback::<dyn Sink, _>(move |sink| sink.push(value))
    }

    #[test]
    fn test_initial_callback_precedes_later_ones() {
        let pool = Arc::new(WorkerPool::start(WorkerPoolConfig::default()).unwrap());
        let manager: OrderedCallbackManager<dyn Sink> =
            OrderedCallbackManager::new(pool.clone(), CallbackExceptionPolicy::default());
        let recorder = Arc::new(Recorder::default());

        manager.add_listener_and_enqueue_callback(recorder.clone(), push(0));
        for i in 1..=50 {
            manager.enqueue_callback(push(i));
        }

        assert!(wait_until(|| recorder.seen.lock().len() == 51));
        assert_eq!(*recorder.seen.lock(), (0..=50).collect::<Vec<_>>());
        pool.stop();
    }

    #[test]
    fn test_registrations_are_independent() {
        let pool = Arc::new(WorkerPool::start(WorkerPoolConfig::default()).unwrap());
        let manager: OrderedCallbackManager<dyn Sink> =
            OrderedCallbackManager::new(pool.clone(), CallbackExceptionPolicy::default());
        let recorder = Arc::new(Recorder::default());
        let first = manager.add_listener(recorder.clone());
        let second = manager.add_listener(recorder.clone());
        assert_ne!(first, second);
        assert_eq!(manager.listener_count(), 2);
        assert!(manager.remove_listener(first));
        assert!(!manager.remove_listener(first));
        assert!(manager.is_registered(second));
        pool.stop();
    }
}
