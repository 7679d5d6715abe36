use crate::commands::{block_on, format_number, load_state};
use crate::models::segment_stats;
use crate::services::PipelineOutcome;

pub fn run(force: bool) {
    if force {
        println!("📥 Force refreshing instruments from upstream mirrors...");
    } else {
        println!("📥 Loading instruments (cache first)...");
    }

    match block_on(pull(force)) {
        Ok(outcome) => print_summary(&outcome),
        Err(e) => {
            eprintln!("\n❌ Pull failed: {}", e);
            std::process::exit(1);
        }
    }
}

async fn pull(force: bool) -> Result<PipelineOutcome, crate::error::Error> {
    let state = load_state().await?;
    if !state.persistent_enabled {
        println!("💡 INSTRUMENTS_DATABASE_URL is not set, result will not outlive this process");
    }
    state.pipeline.run(force).await
}

fn print_summary(outcome: &PipelineOutcome) {
    if outcome.cache_status.is_fresh_data() {
        println!("\n✅ Instruments updated successfully!");
    } else {
        println!("\n⚠️  Served without a fresh download");
    }

    println!("   📈 Instruments:  {}", format_number(outcome.instruments.len()));
    println!("   🏷️  Status:       {}", outcome.cache_status);
    println!("   🕒 Last updated: {}", outcome.last_updated.to_rfc3339());
    println!("   📂 Segments:");
    for (segment, count) in segment_stats(&outcome.instruments) {
        println!("      {:<8} {:>10}", segment, format_number(count));
    }
}
