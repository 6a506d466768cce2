//! Log in, page through organizations and watch the cache react to writes
//!
//! ```text
//! ORGPILOT_LOGIN=admin@example.com ORGPILOT_PASSWORD=secret cargo run --example browse
//! ```

use orgpilot::prelude::*;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let config = OrgPilotConfig::load(std::env::args().nth(1).as_deref())?;
    let client = OrgPilotClient::builder().with_config(config).build()?;

    if let Some(user) = client.initialize().await? {
        println!("🔑 Restored session for {}", user.login);
    } else {
        let user = client
            .login(LoginRequest {
                login: std::env::var("ORGPILOT_LOGIN")?,
                password: std::env::var("ORGPILOT_PASSWORD")?,
            })
            .await?;
        println!("🔑 Logged in as {}", user.login);
    }

    let mut events = client.subscribe_events();
    tokio::spawn(async move {
        while let Ok(envelope) = events.recv().await {
            println!(
                "   📣 {}.{}",
                envelope.event.event_kind(),
                envelope.event.action()
            );
        }
    });

    let mut pagination = PaginationState::new(5);
    let mut organizations = client.subscribe_organizations(pagination.request()).await;
    let Some(snapshot) = organizations.wait_until_settled().await else {
        return Ok(());
    };
    if let Some(error) = &snapshot.error {
        println!("❌ {}", error.user_message());
        return Ok(());
    }

    if let Some(page) = snapshot.data() {
        pagination.apply(page);
        println!("\n📋 Organizations ({})", pagination.range_label());
        for org in &page.content {
            println!(
                "   #{} {} [{}] {} location(s)",
                org.id,
                org.name,
                if org.active { "active" } else { "inactive" },
                org.locations.len()
            );
        }
    }

    let Some(first) = snapshot.data().and_then(|page| page.content.first()).cloned() else {
        println!("\nNo organizations yet.");
        return Ok(());
    };

    println!("\n✏️  Renaming #{} and back", first.id);
    let mut update = UpdateOrganizationRequest::from_organization(&first);
    update.name = format!("{} (renamed)", first.name);
    client.update_organization(update).await?;
    client
        .update_organization(UpdateOrganizationRequest::from_organization(&first))
        .await?;

    if let Some(snapshot) = organizations.wait_until_settled().await {
        println!(
            "   list refetched: {} organization(s), stale = {}",
            snapshot.data().map(|page| page.content.len()).unwrap_or_default(),
            snapshot.stale
        );
    }

    client.logout().await?;
    println!("\n👋 Logged out");
    Ok(())
}
