use crate::commands::{block_on, format_number};
use crate::error::Error;
use crate::models::PipelineConfig;
use crate::services::{HttpFetcher, ProbeResult};

pub fn run() {
    println!("🔍 Probing instrument mirrors...\n");

    let results = block_on(async {
        let fetcher = HttpFetcher::from_config(&PipelineConfig::from_env())?;
        Ok::<_, Error>(fetcher.probe().await)
    });

    match results {
        Ok(results) => {
            for result in &results {
                show_result(result);
            }
            let reachable = results.iter().filter(|r| r.success).count();
            println!("\n{} of {} mirrors reachable", reachable, results.len());
            if reachable == 0 {
                std::process::exit(1);
            }
        }
        Err(e) => {
            eprintln!("❌ Error: {}", e);
            std::process::exit(1);
        }
    }
}

fn show_result(result: &ProbeResult) {
    let icon = if result.success { "✅" } else { "❌" };
    println!("{} {}", icon, result.url);

    if let Some(status) = result.status {
        println!("   HTTP {} in {}ms", status, result.download_ms);
    }
    if let Some(error) = &result.error {
        println!("   Error: {}", error);
    }
    if result.success {
        println!("   Size: {} characters", format_number(result.content_size));
        if let Some(first_line) = result.content_preview.lines().next() {
            println!("   Header: {}", first_line);
        }
    }
}
