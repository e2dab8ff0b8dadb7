// Connectivity Signal Port
// Binary online/offline state shared between the probe and the dispatcher

use tokio::sync::watch;

/// Publishing side, owned by whatever observes the network
pub struct ConnectivityPublisher {
    tx: watch::Sender<bool>,
}

impl ConnectivityPublisher {
    /// Update the state; subscribers are only woken on an actual transition.
    ///
    /// Returns true if the state changed.
    pub fn set_online(&self, online: bool) -> bool {
        self.tx.send_if_modified(|current| {
            if *current == online {
                false
            } else {
                *current = online;
                true
            }
        })
    }

    pub fn is_online(&self) -> bool {
        *self.tx.borrow()
    }

    /// A fresh watch handle
    pub fn watch(&self) -> ConnectivityWatch {
        ConnectivityWatch {
            rx: self.tx.subscribe(),
        }
    }
}

/// Observing side
#[derive(Clone)]
pub struct ConnectivityWatch {
    rx: watch::Receiver<bool>,
}

impl ConnectivityWatch {
    pub fn is_online(&self) -> bool {
        *self.rx.borrow()
    }

    /// Wait for the next transition and return the new state.
    ///
    /// Returns None once the publisher is gone.
    pub async fn changed(&mut self) -> Option<bool> {
        self.rx.changed().await.ok()?;
        Some(*self.rx.borrow_and_update())
    }
}

/// Create a connectivity channel starting in `initial` state
pub fn connectivity_channel(initial: bool) -> (ConnectivityPublisher, ConnectivityWatch) {
    let (tx, rx) = watch::channel(initial);
    (ConnectivityPublisher { tx }, ConnectivityWatch { rx })
}
