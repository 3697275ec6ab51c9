use std::fmt;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionType {
    Wifi,
    Cellular,
    Ethernet,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Online(ConnectionType),
    Offline,
}

impl ConnectionState {
    pub fn is_online(&self) -> bool {
        matches!(self, ConnectionState::Online(_))
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Online(ConnectionType::Wifi) => write!(f, "online (Wi-Fi)"),
            ConnectionState::Online(ConnectionType::Cellular) => write!(f, "online (cellular)"),
            ConnectionState::Online(ConnectionType::Ethernet) => write!(f, "online (ethernet)"),
            ConnectionState::Online(ConnectionType::Unknown) => write!(f, "online"),
            ConnectionState::Offline => write!(f, "offline"),
        }
    }
}

/// Observable network reachability. The platform layer reports changes with
/// [`ConnectivityMonitor::set_state`]; consumers hold a clone or a receiver.
#[derive(Clone)]
pub struct ConnectivityMonitor {
    sender: Arc<watch::Sender<ConnectionState>>,
}

impl Default for ConnectivityMonitor {
    fn default() -> Self {
        Self::new(ConnectionState::Online(ConnectionType::Unknown))
    }
}

impl ConnectivityMonitor {
    pub fn new(initial: ConnectionState) -> Self {
        let (sender, _) = watch::channel(initial);
        Self {
            sender: Arc::new(sender),
        }
    }

    pub fn set_state(&self, state: ConnectionState) {
        let changed = self.sender.send_if_modified(|current| {
            if *current == state {
                return false;
            }
            *current = state;
            true
        });
        if changed {
            info!("Connectivity changed: {}", state);
        }
    }

    pub fn state(&self) -> ConnectionState {
        *self.sender.borrow()
    }

    pub fn is_online(&self) -> bool {
        self.state().is_online()
    }

    pub fn watch(&self) -> watch::Receiver<ConnectionState> {
        self.sender.subscribe()
    }
}
