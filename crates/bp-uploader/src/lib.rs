//! bp-uploader: inverted-pull bundle installation
//!
//! The operator's machine connects out to the device, forwards a remote
//! loopback port back to an embedded file server, and asks the device's
//! update program to fetch each bundle from that port, one at a time.

pub mod bundles;
pub mod command;
pub mod reboot;
pub mod server;
pub mod uploader;

pub use bundles::{Bundle, BundleSizeTable};
pub use command::{CommandRunner, ConsoleSink, OutputSink};
pub use reboot::RebootState;
pub use server::{FileServer, ProgressTracker};
pub use uploader::{RunReport, Uploader};
