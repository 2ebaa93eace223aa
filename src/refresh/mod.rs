use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread::JoinHandle;
use std::time::Duration;

pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(300_000);

/// Calls `tick` every `interval` on a background thread until stopped.
///
/// Dropping the handle stops the timer; no tick runs after `stop`/drop returns.
pub struct AutoRefresh {
    stop_tx: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl AutoRefresh {
    pub fn start<F>(interval: Duration, mut tick: F) -> Self
    where
        F: FnMut() + Send + 'static,
    {
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let interval = interval.max(Duration::from_millis(1));
        let handle = std::thread::spawn(move || {
            loop {
                match stop_rx.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => tick(),
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            }
        });
        Self {
            stop_tx: Some(stop_tx),
            handle: Some(handle),
        }
    }

    pub fn stop(&mut self) {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::warn!("auto-refresh thread panicked");
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }
}

impl Drop for AutoRefresh {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn ticks_until_stopped() {
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        let mut timer = AutoRefresh::start(Duration::from_millis(5), move || {
            c.fetch_add(1, Ordering::SeqCst);
        });
        while count.load(Ordering::SeqCst) < 2 {
            std::thread::sleep(Duration::from_millis(1));
        }
        timer.stop();
        let after_stop = count.load(Ordering::SeqCst);
        std::thread::sleep(Duration::from_millis(30));
        assert_eq!(count.load(Ordering::SeqCst), after_stop);
        assert!(!timer.is_running());
    }

    #[test]
    fn drop_before_first_tick_never_fires() {
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        let timer = AutoRefresh::start(DEFAULT_INTERVAL, move || {
            c.fetch_add(1, Ordering::SeqCst);
        });
        drop(timer);
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }
}
