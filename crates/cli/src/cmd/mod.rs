//! Command implementations

pub mod config;
pub mod folder;
pub mod process;
pub mod rule;
pub mod run;
pub mod transfer;
