//! Edge server in front of an OrgPilot backend
//!
//! ```text
//! ORGPILOT_API_URL=http://localhost:8080 cargo run --example proxy -- orgpilot.yaml
//! ```

use orgpilot::prelude::*;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,orgpilot=debug")),
        )
        .init();

    let config_path = std::env::args().nth(1);
    let config = OrgPilotConfig::load(config_path.as_deref())?;

    println!("🚀 OrgPilot edge server");
    println!("   backend: {}", config.base_url());
    println!("   listening on: http://{}", config.server.bind_addr);
    println!();
    println!("   GET  /api/multimedia/{{id}}");
    println!("   POST /api/auth/login | /api/auth/register | /api/auth/logout");
    println!("   GET  /api/session");
    println!("   GET  /health");

    ServerBuilder::new().with_config(config).serve().await
}
