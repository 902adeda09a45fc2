use anyhow::{anyhow, Result};
use tracing::error;

use default_allow_pe::{cli, config::Config, tracing::setup_tracing, WebhookServer};

#[tokio::main]
async fn main() -> Result<()> {
    let matches = cli::build_cli().get_matches();
    let config = Config::from_args(&matches)?;

    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow!("Failed to install crypto provider"))?;

    setup_tracing(&config.log_level, &config.log_fmt, config.log_no_color)?;

    let server = match WebhookServer::new_from_config(config).await {
        Ok(server) => server,
        Err(e) => {
            error!(error = %e, "cannot initialize the webhook server");
            return Err(e);
        }
    };

    server.run().await.inspect_err(|e| {
        error!(error = %e, "webhook server failed");
    })
}
