pub mod monitor;

pub use monitor::{CommunicationMonitor, CommunicationMonitorConfig, MonitorStatus, StatusChange};
