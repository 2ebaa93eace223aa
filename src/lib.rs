pub mod analytics;
pub mod api;
pub mod cache;
pub mod cli;
pub mod config;
pub mod console;
pub mod core;
pub mod exit;
pub mod lifecycle;
pub mod logs;
pub mod pages;
pub mod platform;
pub mod refresh;
pub mod session;
pub mod tui;
pub mod ui;
pub mod validate;
