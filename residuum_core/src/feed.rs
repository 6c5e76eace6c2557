//! Background reading feed.
//!
//! Spawns a thread that owns a `ReadingSource` and pushes its readings into a
//! bounded channel. End of stream is signalled by the channel disconnecting;
//! a source error is forwarded once as `FeedItem::Failed` and ends the feed.
//!
//! Each `Feed` spawns exactly one thread, shut down when the `Feed` is dropped.
//! A thread still blocked inside the source (e.g. on stdin) after a short
//! grace period is detached rather than joined.
use crossbeam_channel as xch;
use residuum_traits::{RawReading, ReadingSource};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

const SEND_POLL: Duration = Duration::from_millis(50);
const JOIN_GRACE: Duration = Duration::from_millis(250);

#[derive(Debug, Clone, PartialEq)]
pub enum FeedItem {
    Reading(RawReading),
    Failed(String),
}

pub struct Feed {
    rx: xch::Receiver<FeedItem>,
    shutdown: Arc<AtomicBool>,
    join_handle: Option<std::thread::JoinHandle<()>>,
}

impl Feed {
    pub fn spawn<S: ReadingSource + Send + 'static>(mut source: S, capacity: usize) -> Self {
        let (tx, rx) = xch::bounded(capacity.max(1));
        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_clone = shutdown.clone();

        let join_handle = std::thread::spawn(move || {
            // Blocks until delivered; false when the feed should stop.
            let deliver = |mut item: FeedItem| -> bool {
                loop {
                    if shutdown_clone.load(Ordering::Relaxed) {
                        return false;
                    }
                    match tx.send_timeout(item, SEND_POLL) {
                        Ok(()) => return true,
                        Err(xch::SendTimeoutError::Timeout(back)) => item = back,
                        Err(xch::SendTimeoutError::Disconnected(_)) => {
                            tracing::debug!("feed consumer disconnected, exiting thread");
                            return false;
                        }
                    }
                }
            };

            loop {
                if shutdown_clone.load(Ordering::Relaxed) {
                    tracing::debug!("feed thread received shutdown signal");
                    break;
                }
                match source.next_reading() {
                    Ok(Some(r)) => {
                        if !deliver(FeedItem::Reading(r)) {
                            break;
                        }
                    }
                    Ok(None) => {
                        tracing::debug!("reading source exhausted");
                        break;
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "reading source failed");
                        deliver(FeedItem::Failed(e.to_string()));
                        break;
                    }
                }
            }
            tracing::trace!("feed thread exiting cleanly");
        });

        Self {
            rx,
            shutdown,
            join_handle: Some(join_handle),
        }
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Result<FeedItem, xch::RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }

    /// Readings currently buffered.
    pub fn pending(&self) -> usize {
        self.rx.len()
    }
}

impl Drop for Feed {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        if let Some(handle) = self.join_handle.take() {
            let deadline = Instant::now() + JOIN_GRACE;
            while !handle.is_finished() && Instant::now() < deadline {
                std::thread::sleep(Duration::from_millis(5));
            }
            if !handle.is_finished() {
                tracing::debug!("feed thread still blocked in source; detaching");
                return;
            }
            match handle.join() {
                Ok(()) => tracing::trace!("feed thread joined successfully"),
                Err(e) => tracing::warn!(?e, "feed thread panicked during shutdown"),
            }
        }
    }
}
