use anyhow::Result;

use crate::cli::output::{StatusInfo, get_formatter};
use crate::client::BridgeClient;
use crate::models::{Config, OutputFormat};

pub async fn handle_status(format: OutputFormat, verbose: bool) -> Result<()> {
    let config = Config::load()?;
    let formatter = get_formatter(format);

    let health = match BridgeClient::new(&config.bridge) {
        Ok(client) => client.health().await,
        Err(e) => Err(e),
    };
    if verbose && let Err(ref e) = health {
        eprintln!("Bridge check failed: {}", e);
    }
    let health = health.ok();

    let status = StatusInfo {
        bridge_url: config.bridge.url.clone(),
        bridge_reachable: health.is_some(),
        bridge_model: health.as_ref().map(|h| h.model.clone()),
        bridge_credential: health.as_ref().map(|h| h.credential_configured),
        model: config.gemini.model.clone(),
        api_key_env: config.gemini.api_key_env.clone(),
        api_key_configured: config.gemini.api_key().is_some(),
    };

    print!("{}", formatter.format_status(&status));

    if !status.bridge_reachable {
        eprintln!();
        eprintln!("Hint: bridge not reachable. Start it with: cfex serve");
        if status.api_key_configured {
            eprintln!("      Or call the model directly with: cfex extract --direct <FILES>");
        }
    } else if status.bridge_credential == Some(false) {
        eprintln!();
        eprintln!("Warning: the bridge has no API key and will reject every request.");
    }

    Ok(())
}
