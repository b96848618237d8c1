#![allow(missing_docs)]

pub mod cli;
pub mod cmd;
pub mod logging;
pub mod settings;
pub mod terminal;
