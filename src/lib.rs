pub mod action;
pub mod aggregate;
pub mod app;
pub mod config;
pub mod event;
pub mod format;
pub mod logging;
pub mod memory;
pub mod monitor;
pub mod options;
pub mod system;
pub mod ui;
