pub mod app;
pub mod commands;
pub mod config;

pub use app::{App, Flow};
pub use commands::Command;
pub use config::AppConfig;
