//! In-pod monitors: process lifecycle, network connections, and file
//! integrity, each producing typed `SecurityEvent`s onto a shared channel
//! for the Collector to relay.

pub mod file;
pub mod indicators;
pub mod net_addr;
pub mod network;
pub mod process;

pub use file::{FileDropCounters, FileMonitor};
pub use network::{NetworkDropCounters, NetworkMonitor};
pub use process::{ProcessDropCounters, ProcessMonitor};
