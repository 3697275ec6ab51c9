pub mod connectivity;
pub mod controller;

pub use connectivity::{ConnectionState, ConnectionType, ConnectivityMonitor};
pub use controller::{ControllerConfig, ControllerEvent, SessionController};
