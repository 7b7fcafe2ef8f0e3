//! Connected/disconnected signal from the external video source.

use std::sync::Arc;

use tokio::sync::watch;

/// Whether live video is currently flowing. The video layer sets it; the
/// dispatcher reads it to gate click moves and overlays.
#[derive(Debug, Clone)]
pub struct VideoSignal {
    tx: Arc<watch::Sender<bool>>,
}

impl VideoSignal {
    pub fn new(connected: bool) -> Self {
        let (tx, _) = watch::channel(connected);
        Self { tx: Arc::new(tx) }
    }

    pub fn set_connected(&self, connected: bool) {
        self.tx.send_if_modified(|current| {
            let changed = *current != connected;
            *current = connected;
            changed
        });
    }

    pub fn is_connected(&self) -> bool {
        *self.tx.borrow()
    }

    /// Observe connectivity changes.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}

impl Default for VideoSignal {
    fn default() -> Self {
        Self::new(false)
    }
}
