use anyhow::Result;
use chrono::Utc;
use staysync_core::store::Store;

use crate::render::Render;

pub async fn run(store: Store, unit: Option<i64>) -> Result<()> {
    let today = Utc::now().date_naive();
    let bookings = store.upcoming_bookings(unit, today).await?;

    if bookings.is_empty() {
        println!("No upcoming bookings.");
        return Ok(());
    }

    for booking in &bookings {
        println!("{}", booking.render());
    }
    println!("\n{} upcoming bookings", bookings.len());

    Ok(())
}
