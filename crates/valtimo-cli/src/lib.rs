//! valtimo-plugin command line library - exposes modules for testing

pub mod app;
pub mod builtin;
pub mod commands;
pub mod common;
pub mod errors;

pub use common::GlobalOpts;
