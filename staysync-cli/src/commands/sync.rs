use anyhow::Result;
use owo_colors::OwoColorize;
use staysync_core::config::Config;
use staysync_core::store::{SourceFilter, Store};
use staysync_core::sync::Syncer;

use crate::render::Render;
use crate::utils::tui;

pub async fn run(
    store: Store,
    config: Config,
    source: Option<i64>,
    property: Option<i64>,
    force: bool,
) -> Result<()> {
    let filter = SourceFilter {
        source_id: source,
        property_id: property,
    };
    let syncer = Syncer::new(store, config)?;

    let sources = syncer.store().sources(&filter).await?;
    if sources.is_empty() {
        println!("No enabled sources match.");
        return Ok(());
    }

    if !syncer.acquire_guard(force).await? {
        println!(
            "A sync already ran inside the debounce window. {}",
            "Use --force to run anyway.".dimmed()
        );
        return Ok(());
    }

    let mut outcomes = Vec::with_capacity(sources.len());

    for source in &sources {
        let spinner = tui::create_spinner(format!("Syncing source #{}", source.id));
        let outcome = syncer.sync_source(source).await;
        spinner.finish_and_clear();

        println!("{}", outcome.render());
        outcomes.push(outcome);
    }

    let created: usize = outcomes.iter().map(|o| o.created).sum();
    let updated: usize = outcomes.iter().map(|o| o.updated).sum();
    let deleted: usize = outcomes.iter().map(|o| o.deleted).sum();
    let vanished: usize = outcomes.iter().map(|o| o.vanished).sum();
    let conflicts: usize = outcomes.iter().map(|o| o.conflicts).sum();
    let failures = outcomes.iter().filter(|o| o.error.is_some()).count();

    println!(
        "\nSynced {} sources: {} created, {} updated, {} deleted, {} vanished",
        outcomes.len(),
        created,
        updated,
        deleted,
        vanished
    );
    if conflicts > 0 {
        println!(
            "{}",
            format!("{conflicts} local edits kept over remote changes").yellow()
        );
    }
    if failures > 0 {
        println!("{}", format!("{failures} sources failed").red());
    }

    // Individual source failures are counted, not fatal.
    Ok(())
}
