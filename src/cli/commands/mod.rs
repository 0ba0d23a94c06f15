mod config;
mod extract;
mod serve;
mod status;

pub use config::ConfigCommand;
pub use extract::ExtractArgs;
pub use serve::ServeArgs;

pub use config::handle_config;
pub use extract::handle_extract;
pub use serve::handle_serve;
pub use status::handle_status;
