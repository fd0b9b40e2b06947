//! Library half of the `xframe` binary, split out so commands can be tested
//! without spawning a process.

pub mod args;
pub mod cli;
pub mod commands;
pub mod error;
pub mod logging;
pub mod output;
