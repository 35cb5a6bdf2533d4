//! Print the newest entries of a category.
//!
//! Run with: cargo run --example stream_entries -- "Category Name"
//!
//! The access token is taken from `FEEDLY_ACCESS_TOKEN`.

use futures_util::StreamExt;

use feedly_rs::api::Streamable;
use feedly_rs::{FeedlySession, StreamOptions};

#[tokio::main]
async fn main() -> feedly_rs::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    let token = std::env::var("FEEDLY_ACCESS_TOKEN")
        .expect("FEEDLY_ACCESS_TOKEN environment variable required");
    let name = std::env::args().nth(1).unwrap_or_else(|| "global.all".to_string());

    let session = FeedlySession::with_token(token).await?;
    let categories = session.user().categories().await?;
    let category = match categories.get(&name) {
        Ok(category) => category.clone(),
        // Not listed; system categories such as global.all still resolve
        Err(_) => session.user().category(&name).await?,
    };

    println!("Newest entries in {}:", category.stream_id());

    let options = StreamOptions::default().with_max_count(10).unread_only(true);
    let mut entries = category.stream_contents(options);
    while let Some(entry) = entries.next().await {
        let entry = entry?;
        let published = entry
            .published()
            .and_then(chrono::DateTime::<chrono::Utc>::from_timestamp_millis)
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_default();
        println!(
            "  {:>16}  {}",
            published,
            entry.title.as_deref().unwrap_or("(untitled)")
        );
    }

    println!("\nFetched {} page(s)", entries.pages_fetched());
    Ok(())
}
