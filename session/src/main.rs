//! Tally demo - runs a scripted milestone session against the in-memory store.

use std::sync::Arc;

use tally_engine::{Item, ItemPatch, UnitMode, Variant};
use tally_session::{Config, EditOp, EditSession, InMemoryStore, ParentResource, SessionError};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const PROJECT_ID: u64 = 42;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tally_session=debug,tally=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;
    let rates = config.rate_provider()?;

    tracing::info!(
        unit_mode = ?config.unit_mode,
        btc_usd = config.btc_usd,
        "Starting Tally demo"
    );

    let store = InMemoryStore::new_shared();
    let existing = store.seed(
        Variant::Milestone,
        PROJECT_ID,
        vec![Item::new(PROJECT_ID, "Prototype", 1_000_000).with_description("First batch")],
    );

    let mut session = EditSession::open(
        ParentResource::new(Variant::Milestone, PROJECT_ID, existing),
        Arc::clone(&store),
        config.session_options(Variant::Milestone, &rates),
    )?;
    session.on_change(|version| tracing::trace!(version, "Draft changed"));

    let index = session.add()?;
    session.edit(EditOp::Edit {
        index,
        patch: ItemPatch::name("Production run"),
    })?;
    session.edit(EditOp::SetUnitMode {
        mode: UnitMode::Display,
    })?;
    session.set_display_amount(index, 3_000.0)?;

    // Left blank; dropped on confirm
    session.add()?;

    let items = match session.confirm().await {
        Ok(items) => items,
        Err(SessionError::Invalid(errors)) => {
            println!("{}", serde_json::to_string_pretty(&errors)?);
            return Err("milestones are invalid".into());
        }
        Err(err) => return Err(err.into()),
    };

    tracing::info!(
        items = items.len(),
        requests = store.call_count().await,
        "Session committed"
    );
    println!("{}", serde_json::to_string_pretty(&items)?);

    Ok(())
}
