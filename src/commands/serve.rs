use crate::commands::{block_on, format_number, load_state};
use crate::server;
use crate::utils::{format_mb, get_port};

pub fn run(port: Option<u16>) {
    let port = port.unwrap_or_else(get_port);
    println!("🚀 Starting tradesymbols server on port {}", port);

    let result = block_on(async move {
        let state = load_state().await?;

        println!("🔗 Mirrors:");
        for url in state.fetcher.urls() {
            println!("   {}", url);
        }
        if state.persistent_enabled {
            println!("💾 Persistent cache: enabled");
        } else {
            println!("💾 Persistent cache: disabled (memory only)");
        }

        // Warm the memory tier so the first request does not wait on the download
        match state.pipeline.run(false).await {
            Ok(outcome) => {
                let memory_mb = format_mb(state.memory.estimate_memory_usage().await);
                println!(
                    "✅ Loaded {} instruments ({})",
                    format_number(outcome.instruments.len()),
                    outcome.cache_status
                );
                println!("   💾 Memory usage:   {:.2} MB", memory_mb);
            }
            Err(e) => {
                eprintln!("⚠️  Warning: Initial load failed: {}", e);
                eprintln!("   Server will start with empty cache. First request will retry.");
            }
        }

        println!("🌐 Starting HTTP server...");
        server::serve(state, port).await
    });

    if let Err(e) = result {
        eprintln!("❌ Server error: {}", e);
        std::process::exit(1);
    }
}
