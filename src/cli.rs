use clap::{Parser, Subcommand};

use crate::commands;

#[derive(Parser)]
#[command(name = "tradesymbols")]
#[command(about = "Kite instrument list downloader and corporate-action exporter", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP server
    Serve {
        /// Port to listen on (defaults to PORT or 3000)
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Run the pipeline once and print a summary
    Pull {
        /// Skip every cache tier and download from the mirrors
        #[arg(short, long)]
        force: bool,
    },
    /// Show cache tier status without downloading
    Status,
    /// Probe every mirror and report what came back
    Probe,
}

pub fn run() {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { port } => {
            commands::serve::run(port);
        }
        Commands::Pull { force } => {
            commands::pull::run(force);
        }
        Commands::Status => {
            commands::status::run();
        }
        Commands::Probe => {
            commands::probe::run();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_subcommands() {
        let cli = Cli::try_parse_from(["tradesymbols", "pull", "--force"]).unwrap();
        assert!(matches!(cli.command, Commands::Pull { force: true }));

        let cli = Cli::try_parse_from(["tradesymbols", "serve", "-p", "8080"]).unwrap();
        assert!(matches!(cli.command, Commands::Serve { port: Some(8080) }));

        let cli = Cli::try_parse_from(["tradesymbols", "status"]).unwrap();
        assert!(matches!(cli.command, Commands::Status));

        assert!(Cli::try_parse_from(["tradesymbols", "serve", "--port", "http"]).is_err());
    }
}
