//! Shared bridge state: the running flag and the device link state

use core::fmt;
use std::sync::Arc;

use aquatimer_core::ConnectError;
use tokio::sync::watch;

// ----------------------------------------------------------------------------
// Running Flag
// ----------------------------------------------------------------------------

/// Create a linked stop handle and running flag
pub fn running_flag() -> (BridgeHandle, RunningFlag) {
    let (sender, receiver) = watch::channel(true);
    (
        BridgeHandle {
            sender: Arc::new(sender),
        },
        RunningFlag { receiver },
    )
}

/// Requests a cooperative stop of every bridge task
#[derive(Debug, Clone)]
pub struct BridgeHandle {
    sender: Arc<watch::Sender<bool>>,
}

impl BridgeHandle {
    pub fn stop(&self) {
        self.sender.send_replace(false);
    }

    pub fn is_running(&self) -> bool {
        *self.sender.borrow()
    }
}

/// Observed by tasks at each suspension point
#[derive(Debug, Clone)]
pub struct RunningFlag {
    receiver: watch::Receiver<bool>,
}

impl RunningFlag {
    pub fn is_running(&self) -> bool {
        *self.receiver.borrow()
    }

    /// Resolve once a stop has been requested
    ///
    /// A dropped handle counts as a stop request.
    pub async fn stopped(&mut self) {
        while *self.receiver.borrow_and_update() {
            if self.receiver.changed().await.is_err() {
                return;
            }
        }
    }
}

// ----------------------------------------------------------------------------
// Link State
// ----------------------------------------------------------------------------

/// Lifecycle of the BLE link to the timer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkState {
    /// No device; carries the fault that ended the last attempt, if any
    Disconnected(Option<ConnectError>),
    Scanning,
    Connecting,
    ServiceDiscovery,
    /// Device facade installed, commands reach the timer
    Ready,
    Stopped,
}

impl LinkState {
    pub fn is_ready(&self) -> bool {
        matches!(self, LinkState::Ready)
    }
}

impl fmt::Display for LinkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkState::Disconnected(None) => write!(f, "disconnected"),
            LinkState::Disconnected(Some(err)) => write!(f, "disconnected ({})", err),
            LinkState::Scanning => write!(f, "scanning"),
            LinkState::Connecting => write!(f, "connecting"),
            LinkState::ServiceDiscovery => write!(f, "discovering services"),
            LinkState::Ready => write!(f, "ready"),
            LinkState::Stopped => write!(f, "stopped"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_stop_wakes_waiters() {
        let (handle, flag) = running_flag();
        let mut waiter = flag.clone();
        let task = tokio::spawn(async move { waiter.stopped().await });

        assert!(flag.is_running());
        handle.stop();
        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .unwrap()
            .unwrap();
        assert!(!flag.is_running());
        assert!(!handle.is_running());
    }

    #[tokio::test]
    async fn test_dropped_handle_counts_as_stop() {
        let (handle, mut flag) = running_flag();
        drop(handle);
        tokio::time::timeout(Duration::from_secs(1), flag.stopped())
            .await
            .unwrap();
    }
}
