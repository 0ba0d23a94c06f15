use anyhow::Result;
use clap::Args;

use crate::models::Config;
use crate::server::run_bridge;

#[derive(Debug, Args)]
pub struct ServeArgs {
    /// Address to listen on
    #[arg(long)]
    pub host: Option<String>,

    /// Port to listen on
    #[arg(long, short = 'p')]
    pub port: Option<u16>,

    /// Route that accepts extraction requests
    #[arg(long)]
    pub path: Option<String>,
}

impl ServeArgs {
    fn apply(self, config: &mut Config) {
        if let Some(host) = self.host {
            config.server.host = host;
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(path) = self.path {
            config.server.path = path;
        }
    }
}

pub async fn handle_serve(args: ServeArgs) -> Result<()> {
    let mut config = Config::load()?;
    args.apply(&mut config);
    config.validate()?;

    eprintln!(
        "Bridge listening on http://{}:{}{}",
        config.server.host, config.server.port, config.server.path
    );
    run_bridge(config).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_override_config() {
        let mut config = Config::default();
        ServeArgs {
            host: Some("0.0.0.0".to_string()),
            port: Some(9000),
            path: None,
        }
        .apply(&mut config);

        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.path, crate::models::DEFAULT_SERVER_PATH);
    }
}
