pub mod cli;
pub mod client;
pub mod error;
pub mod models;
pub mod server;
pub mod services;

#[cfg(test)]
mod test_support;

pub use cli::{Cli, Commands};
pub use models::{Config, OutputFormat};
