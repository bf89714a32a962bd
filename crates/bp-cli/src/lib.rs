//! bundlepush: command-line front end
//!
//! Parses operator input into an upload job and hands it to the uploader.

pub mod commands;
pub mod output;
