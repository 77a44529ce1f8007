use std::path::PathBuf;

use anyhow::anyhow;
use clap::Parser;
use tracing::info;

use leadline::{EngineConfig, SessionController, UiEvent};

/// Leadline - real-time voice lead-intake session engine
#[derive(Parser, Debug)]
#[command(name = "leadline")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to configuration file (YAML)
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Override the live agent endpoint
    #[arg(long = "endpoint")]
    endpoint: Option<String>,

    /// Override the conversation model
    #[arg(long = "model")]
    model: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if it exists (must be done before config loading)
    let _ = dotenvy::dotenv();

    // Initialize tracing
    tracing_subscriber::fmt::init();

    // Initialize crypto provider for TLS connections
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow!("Failed to install default crypto provider"))?;

    let cli = Cli::parse();

    let mut config = if let Some(config_path) = cli.config {
        println!("Loading configuration from {}", config_path.display());
        EngineConfig::from_file(&config_path)?
    } else {
        EngineConfig::from_env()?
    };
    if let Some(endpoint) = cli.endpoint {
        config.agent.endpoint = endpoint;
    }
    if let Some(model) = cli.model {
        config.agent.model = model;
    }

    let controller = SessionController::new(config)?;
    let mut ui_events = controller
        .take_ui_events()
        .expect("fresh controller always yields the UI event stream");

    controller.start().await?;
    println!("Session active. Speak into the microphone; Ctrl-C to hang up.");

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                println!("Hanging up.");
                controller.stop().await;
                break;
            }
            maybe_event = ui_events.recv() => {
                match maybe_event {
                    Some(UiEvent::TranscriptUpdated) => {
                        if let Some(entry) = controller.transcript().last() {
                            let speaker = match entry.persona {
                                Some(_) => controller.active_agent_label(),
                                None => "Caller".to_string(),
                            };
                            println!("[{speaker}] {}", entry.text);
                        }
                    }
                    Some(UiEvent::LeadCaptured(lead)) => {
                        println!(
                            ">> Lead captured: {} ({}){}",
                            lead.name,
                            lead.phone,
                            if lead.is_hot_install { " [HOT INSTALL]" } else { "" }
                        );
                    }
                    Some(UiEvent::EmergencyChanged(active)) => {
                        println!(
                            ">> Emergency {}",
                            if active { "ACTIVE - dispatcher on the line" } else { "cleared" }
                        );
                    }
                    Some(UiEvent::SessionEnded) => {
                        info!("session ended");
                        break;
                    }
                    None => break,
                }
            }
        }
    }

    Ok(())
}
