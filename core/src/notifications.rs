//! Notification handlers attached to the node and wallet sessions.

use std::sync::Arc;

use tokio::sync::Notify;
use tracing::{debug, info, warn};

use stakepool_rpc::{Notification, NotificationHandler};

/// Node notifications. A connected block wakes the reconcile loop.
pub struct NodeNotifications {
    block_connected: Arc<Notify>,
}

impl NodeNotifications {
    pub fn new(block_connected: Arc<Notify>) -> Self {
        Self { block_connected }
    }
}

impl NotificationHandler for NodeNotifications {
    fn on_notification(&self, notification: Notification) {
        match notification.method.as_str() {
            "blockconnected" => {
                debug!("block connected");
                self.block_connected.notify_one();
            }
            "blockdisconnected" => debug!("block disconnected"),
            "reorganization" => {
                info!(params = ?notification.params, "chain reorganization");
            }
            "newtickets" | "spentandmissedtickets" | "winningtickets" => {
                debug!(method = %notification.method, "stake notification");
            }
            other => warn!(method = other, "unhandled node notification"),
        }
    }
}

/// Wallet notifications are only logged.
pub struct WalletNotifications;

impl NotificationHandler for WalletNotifications {
    fn on_notification(&self, notification: Notification) {
        debug!(method = %notification.method, "wallet notification");
    }
}
