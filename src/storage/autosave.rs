//! Debounced background saving.
//!
//! One worker thread per store. Every mutation sends [`AutoSaveMessage::Dirty`];
//! the worker saves once no message has arrived for the configured delay, so
//! a burst of writes costs a single snapshot.

use crate::vector::store::StoreShared;
use crossbeam_channel::{RecvTimeoutError, Sender, unbounded};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, error};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AutoSaveMessage {
    Dirty,
    Shutdown,
}

/// Handle to a store's autosave worker.
#[derive(Debug)]
pub(crate) struct AutoSaver {
    sender: Sender<AutoSaveMessage>,
    handle: Option<JoinHandle<()>>,
}

impl AutoSaver {
    pub(crate) fn spawn(shared: Arc<StoreShared>, delay: Duration) -> std::io::Result<Self> {
        let (sender, receiver) = unbounded();

        let handle = std::thread::Builder::new()
            .name("kbsearch-autosave".to_string())
            .spawn(move || {
                let mut pending = false;
                loop {
                    let message = if pending {
                        match receiver.recv_timeout(delay) {
                            Ok(message) => message,
                            Err(RecvTimeoutError::Timeout) => {
                                pending = false;
                                if let Err(e) = shared.save() {
                                    error!("Autosave failed: {e}");
                                }
                                continue;
                            }
                            Err(RecvTimeoutError::Disconnected) => break,
                        }
                    } else {
                        match receiver.recv() {
                            Ok(message) => message,
                            Err(_) => break,
                        }
                    };

                    match message {
                        // Restart the quiet period
                        AutoSaveMessage::Dirty => pending = true,
                        AutoSaveMessage::Shutdown => break,
                    }
                }
                debug!("Autosave worker stopped");
            })?;

        Ok(Self {
            sender,
            handle: Some(handle),
        })
    }

    /// Record that the store changed.
    pub(crate) fn notify(&self) {
        // A stopped worker has nothing left to do
        let _ = self.sender.send(AutoSaveMessage::Dirty);
    }

    /// Stop the worker and wait for it. Pending saves are left to the caller.
    pub(crate) fn shutdown(mut self) {
        let _ = self.sender.send(AutoSaveMessage::Shutdown);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!("Autosave worker panicked");
            }
        }
    }
}
