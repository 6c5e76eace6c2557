//! Outbound notifications: observer callbacks and coefficient persistence.
//!
//! Observers run synchronously after every accepted mutation. Persistence is
//! a one-way queue drained by `PersistWorker`; the estimator never waits on it.

use crossbeam_channel as xch;
use residuum_traits::{ParamKey, ParamSink};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Callback invoked with the latest state.
pub type Observer<S> = Box<dyn FnMut(&S) + Send>;

pub struct ObserverList<S> {
    observers: Vec<Observer<S>>,
}

impl<S> Default for ObserverList<S> {
    fn default() -> Self {
        Self {
            observers: Vec::new(),
        }
    }
}

impl<S> ObserverList<S> {
    pub fn push(&mut self, observer: Observer<S>) {
        self.observers.push(observer);
    }

    pub fn notify(&mut self, state: &S) {
        for cb in &mut self.observers {
            cb(state);
        }
    }

    pub fn len(&self) -> usize {
        self.observers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }
}

impl<S> core::fmt::Debug for ObserverList<S> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ObserverList")
            .field("len", &self.observers.len())
            .finish()
    }
}

/// A coefficient change to be persisted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamUpdate {
    pub key: ParamKey,
    pub value: f64,
}

/// Background thread that owns a `ParamSink` and stores queued updates.
///
/// Each worker spawns exactly one thread, joined on drop. Updates still
/// queued at drop time are flushed before the thread exits.
pub struct PersistWorker {
    tx: xch::Sender<ParamUpdate>,
    shutdown: Arc<AtomicBool>,
    join_handle: Option<std::thread::JoinHandle<()>>,
}

impl PersistWorker {
    pub fn spawn<P: ParamSink + Send + 'static>(mut sink: P) -> Self {
        let (tx, rx) = xch::unbounded::<ParamUpdate>();
        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_clone = shutdown.clone();

        let join_handle = std::thread::spawn(move || {
            let mut store = |u: ParamUpdate| {
                if let Err(e) = sink.store(u.key, u.value) {
                    tracing::warn!(
                        key = u.key.as_str(),
                        value = u.value,
                        error = %e,
                        "persisting coefficient failed"
                    );
                } else {
                    tracing::debug!(key = u.key.as_str(), value = u.value, "coefficient persisted");
                }
            };
            loop {
                match rx.recv_timeout(Duration::from_millis(50)) {
                    Ok(u) => store(u),
                    Err(xch::RecvTimeoutError::Timeout) => {
                        if shutdown_clone.load(Ordering::Relaxed) {
                            break;
                        }
                    }
                    Err(xch::RecvTimeoutError::Disconnected) => break,
                }
            }
            for u in rx.try_iter() {
                store(u);
            }
            tracing::trace!("persist worker exiting cleanly");
        });

        Self {
            tx,
            shutdown,
            join_handle: Some(join_handle),
        }
    }

    /// A handle for the estimator to enqueue updates.
    pub fn sender(&self) -> xch::Sender<ParamUpdate> {
        self.tx.clone()
    }
}

impl Drop for PersistWorker {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        if let Some(handle) = self.join_handle.take() {
            match handle.join() {
                Ok(()) => tracing::trace!("persist worker joined"),
                Err(e) => tracing::warn!(?e, "persist worker panicked during shutdown"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::RecordingSink;

    #[test]
    fn observers_are_called_in_order() {
        use std::sync::Mutex;
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut list: ObserverList<u32> = ObserverList::default();
        for tag in 0..2u32 {
            let seen = seen.clone();
            list.push(Box::new(move |v: &u32| seen.lock().unwrap().push((tag, *v))));
        }
        list.notify(&7);
        assert_eq!(*seen.lock().unwrap(), vec![(0, 7), (1, 7)]);
    }

    #[test]
    fn worker_flushes_queued_updates_on_drop() {
        let sink = RecordingSink::default();
        let stored = sink.handle();
        let worker = PersistWorker::spawn(sink);
        let tx = worker.sender();
        tx.send(ParamUpdate {
            key: ParamKey::KWarm,
            value: 4.25,
        })
        .unwrap();
        tx.send(ParamUpdate {
            key: ParamKey::KCold,
            value: 7.5,
        })
        .unwrap();
        drop(worker);
        assert_eq!(
            *stored.lock().unwrap(),
            vec![(ParamKey::KWarm, 4.25), (ParamKey::KCold, 7.5)]
        );
    }
}
