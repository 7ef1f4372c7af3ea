//! A cancellable repeating task on its own thread.

use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread;
use std::time::Duration;

/// Shared cancellation flag between a [`RepeatingTask`] and its tick closure.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Runs `tick` every `interval` until cancelled or until `tick` returns false.
///
/// Cancelling never joins the thread, so it is safe to cancel from inside a
/// lock the tick itself takes. Ticks must check the token under that lock.
/// Dropping the task cancels it.
#[derive(Debug)]
pub struct RepeatingTask {
    token: CancelToken,
    wake: Sender<()>,
}

impl RepeatingTask {
    pub fn spawn<F>(name: &str, interval: Duration, mut tick: F) -> io::Result<Self>
    where
        F: FnMut(&CancelToken) -> bool + Send + 'static,
    {
        let token = CancelToken::default();
        let (wake, wake_rx) = mpsc::channel::<()>();

        let token_for_thread = token.clone();
        thread::Builder::new().name(name.to_string()).spawn(move || {
            loop {
                match wake_rx.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => {
                        if token_for_thread.is_cancelled() || !tick(&token_for_thread) {
                            break;
                        }
                    }
                    // Woken by cancel, or the task handle is gone.
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            }
        })?;

        Ok(Self { token, wake })
    }

    pub fn cancel(&self) {
        self.token.cancel();
        let _ = self.wake.send(());
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

impl Drop for RepeatingTask {
    fn drop(&mut self) {
        self.cancel();
    }
}
