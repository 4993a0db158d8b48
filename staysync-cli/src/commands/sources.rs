use anyhow::Result;
use staysync_core::store::Store;

use crate::render::Render;

pub async fn run(store: Store) -> Result<()> {
    let sources = store.all_sources().await?;

    if sources.is_empty() {
        println!("No feed sources configured.");
        return Ok(());
    }

    for source in &sources {
        println!("{}", source.render());
    }

    Ok(())
}
