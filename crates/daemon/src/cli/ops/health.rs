use std::convert::Infallible;

use clap::Args;
use reqwest::Client;
use url::Url;

use depot_daemon::state::AppState;

#[derive(Args, Debug, Clone)]
pub struct Health;

/// Probe one status endpoint and describe the outcome.
async fn probe(client: &Client, base: &Url, endpoint: &str) -> String {
    let url = format!(
        "{}/_status/{}",
        base.as_str().trim_end_matches('/'),
        endpoint
    );
    match client.get(&url).send().await {
        Ok(resp) if resp.status().is_success() => "OK".to_string(),
        Ok(resp) => format!("UNHEALTHY ({})", resp.status()),
        Err(_) => "NOT REACHABLE".to_string(),
    }
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Health {
    type Error = Infallible;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let mut lines = vec!["Config:".to_string()];
        match AppState::load(ctx.config_path.clone()) {
            Ok(state) => {
                lines.push(format!("  directory:    {}", state.depot_dir.display()));
                lines.push("  config.toml:  OK".to_string());
                let storage = if state.storage_root.is_dir() {
                    "OK"
                } else {
                    "MISSING"
                };
                lines.push(format!(
                    "  storage:      {} ({})",
                    storage,
                    state.storage_root.display()
                ));
                lines.push(format!("  api_port:     {}", state.config.api_port));
                let auth = if state.config.api_token.is_some() {
                    "bearer token"
                } else {
                    "open"
                };
                lines.push(format!("  auth:         {}", auth));
            }
            Err(e) => {
                lines.push(format!("  error: {}", e));
            }
        }

        let base = ctx.client.base_url();
        let client = ctx.client.http_client();

        lines.push(String::new());
        lines.push(format!("Daemon ({}):", base));
        for endpoint in ["livez", "readyz"] {
            let status = probe(client, base, endpoint).await;
            lines.push(format!("  {:<7} {}", format!("{}:", endpoint), status));
        }

        Ok(lines.join("\n"))
    }
}
