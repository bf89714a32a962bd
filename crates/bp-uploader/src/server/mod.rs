//! Embedded file server reachable through the reverse tunnel

mod file_server;
mod progress;

pub use file_server::FileServer;
pub use progress::ProgressTracker;
