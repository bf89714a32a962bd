//! Remote command execution with tagged output

mod output;
mod runner;

pub use output::{ConsoleSink, OutputSink};
pub use runner::CommandRunner;
