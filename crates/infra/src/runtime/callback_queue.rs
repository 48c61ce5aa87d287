//! Completion delivery on a host-chosen context
//!
//! Background operations post their completions here instead of calling
//! them on a worker task. The host drains the queue from the context it
//! wants callbacks on (a UI thread, a dedicated task).

use std::sync::Arc;

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::Mutex;
use tracing::trace;

type Callback = Box<dyn FnOnce() + Send + 'static>;

/// Multi-producer queue of pending callbacks.
#[derive(Clone)]
pub struct CallbackQueue {
    sender: UnboundedSender<Callback>,
    receiver: Arc<Mutex<UnboundedReceiver<Callback>>>,
}

impl Default for CallbackQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl CallbackQueue {
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self { sender, receiver: Arc::new(Mutex::new(receiver)) }
    }

    /// Queue `callback` for the next drain.
    pub fn post(&self, callback: impl FnOnce() + Send + 'static) {
        if self.sender.send(Box::new(callback)).is_err() {
            trace!("callback queue closed, dropping callback");
        }
    }

    /// Run every queued callback on the calling thread, in posting order.
    ///
    /// Returns the number of callbacks run; 0 when another drain is in
    /// progress.
    pub fn drain(&self) -> usize {
        let Ok(mut receiver) = self.receiver.try_lock() else {
            return 0;
        };
        let mut ran = 0;
        while let Ok(callback) = receiver.try_recv() {
            callback();
            ran += 1;
        }
        ran
    }

    /// Wait until at least one callback is queued, then drain.
    pub async fn drain_next(&self) -> usize {
        let mut receiver = self.receiver.lock().await;
        let Some(first) = receiver.recv().await else {
            return 0;
        };
        first();
        let mut ran = 1;
        while let Ok(callback) = receiver.try_recv() {
            callback();
            ran += 1;
        }
        ran
    }
}
