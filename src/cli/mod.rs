//! Command-line interface components
//!
//! This module contains CLI-specific code for the INEI Fetcher application:
//! argument parsing and the command handlers.

pub mod args;
pub mod commands;

pub use args::{
    CatalogArgs, Cli, Commands, DownloadArgs, GlobalArgs, OrganizeArgs, OrganizeFlags,
    RetrievalArgs, RunArgs, SelectionArgs,
};
pub use commands::{handle_catalog, handle_download, handle_organize, handle_run};
