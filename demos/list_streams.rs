//! List the authenticated user's categories and tags.
//!
//! Credentials are read from `~/.config/feedly` (`access.token`, and
//! optionally `refresh.token` so an expired token is refreshed).
//!
//! Run with: cargo run --example list_streams

use feedly_rs::api::Streamable;
use feedly_rs::auth::FileAuthStore;
use feedly_rs::{ClientConfig, FeedlySession};

#[tokio::main]
async fn main() -> feedly_rs::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    let store = FileAuthStore::new(FileAuthStore::default_dir()?)?;
    let session = FeedlySession::new(store, ClientConfig::default()).await?;

    let profile = session.user().profile().await?;
    println!(
        "Signed in as {} ({})",
        profile.full_name.as_deref().unwrap_or("unknown"),
        profile.id
    );

    let categories = session.user().categories().await?;
    println!("\n{} categor(ies):", categories.len());
    for category in &categories {
        println!(
            "  - {:<30} {}",
            category.label().unwrap_or("-"),
            category.stream_id()
        );
    }

    let tags = session.user().tags().await?;
    println!("\n{} tag(s):", tags.len());
    for tag in &tags {
        println!("  - {:<30} {}", tag.label().unwrap_or("-"), tag.stream_id());
    }

    if profile.is_enterprise() {
        let team = session.user().enterprise_categories().await?;
        println!("\n{} team categor(ies)", team.len());
    }

    if let Some(remaining) = session.rate_limit().remaining() {
        println!("\nRequests left in this window: {}", remaining);
    }

    Ok(())
}
