use crate::commands::{block_on, format_number, load_state};
use crate::services::TierStatus;

pub fn run() {
    println!("📊 Instrument Cache Status\n");

    match block_on(show_status()) {
        Ok(()) => {}
        Err(e) => {
            eprintln!("❌ Error: {}", e);
            std::process::exit(1);
        }
    }
}

async fn show_status() -> Result<(), crate::error::Error> {
    let state = load_state().await?;
    let statuses = state.pipeline.tier_statuses().await;

    if !state.persistent_enabled {
        println!("💡 Persistent cache not configured; the memory tier only lives inside `serve`.\n");
    }

    for status in &statuses {
        show_tier(status);
        println!();
    }

    println!("⏳ Cache TTL: {} minutes", state.pipeline.ttl().num_minutes());
    Ok(())
}

fn show_tier(status: &TierStatus) {
    println!("🔹 {} tier", status.tier);

    if let Some(error) = &status.error {
        println!("   ⚠️  Unavailable: {}", error);
        return;
    }

    let Some(last_updated) = status.last_updated else {
        println!("   No data");
        return;
    };

    let age_minutes = status.cache_age_ms.unwrap_or_default() / 60_000;
    println!("   Records:      {}", format_number(status.record_count));
    println!("   Last updated: {} ({} minutes ago)", last_updated.to_rfc3339(), age_minutes);
    println!("   Fresh:        {}", if status.is_fresh { "yes" } else { "no (stale)" });

    if let Some(metadata) = &status.metadata {
        println!(
            "   Source CSV:   {} bytes, {} lines",
            format_number(metadata.size_bytes),
            format_number(metadata.line_count)
        );
        for (segment, count) in &metadata.segments_included {
            println!("      {:<8} {:>10}", segment, format_number(*count));
        }
    }
}
