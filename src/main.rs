//! Vigil - Main Entry Point

use std::env;
use std::sync::Arc;

use vigil::capture::FrameSource;
use vigil::logging::init_logging;
use vigil::{
    Config, DashboardServer, DetectionEngine, FrameSpool, HttpGateway, Modality, RiskLedger,
    RiskState, TextBuffer,
};

use tracing::{error, info};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

const USAGE: &str = "\
Usage: vigil <command>

Commands:
  serve                      Run the dashboard server
  detect <weapon|violence>   Capture one frame and run a detection
  analyze <text>             Run text analysis on <text>
  help                       Show this message

Environment:
  VIGIL_GATEWAY_URL, VIGIL_GATEWAY_TIMEOUT_SECS, VIGIL_DASHBOARD_PORT,
  VIGIL_FRAME_DIR, VIGIL_LOG_DIR, RUST_LOG";

/// Wire the engine from configuration
fn build_engine(config: &Config, frames: Arc<FrameSpool>) -> Result<DetectionEngine, BoxError> {
    let gateway = HttpGateway::new(&config.gateway_url, config.gateway_timeout)?;
    info!("Detection gateway at {}", gateway.base_url());

    let state = RiskLedger::spawn(RiskState::new());
    Ok(DetectionEngine::new(frames, TextBuffer::new(), Arc::new(gateway), state))
}

async fn run_server(config: Config) -> Result<(), BoxError> {
    info!("Starting Vigil dashboard...");

    let frames = Arc::new(FrameSpool::new(&config.frame_dir));
    let engine = build_engine(&config, frames)?;
    info!("Detection engine initialized");

    let mut snapshots = engine.state().subscribe();
    let watcher = tokio::spawn(async move {
        while snapshots.changed().await.is_ok() {
            let snapshot = snapshots.borrow_and_update().clone();
            info!(
                alert = snapshot.alert_message.as_deref().unwrap_or(""),
                "Risk {}",
                snapshot
            );
        }
    });

    let dashboard = DashboardServer::new(config.dashboard_port, engine);
    let result = dashboard.run().await;
    watcher.abort();

    result.map_err(Into::into)
}

async fn run_once(config: Config, modality: Modality, text: Option<String>) -> Result<(), BoxError> {
    let frames = Arc::new(FrameSpool::new(&config.frame_dir));
    if modality.is_image() {
        frames.start()?;
    }
    let engine = build_engine(&config, frames)?;
    if let Some(text) = text {
        engine.set_text(text);
    }

    let outcome = engine.run_detection(modality).await?;
    let snapshot = &outcome.snapshot;

    println!("{}", snapshot);
    if let Some(alert) = &snapshot.alert_message {
        println!("Alert: {}", alert);
    }
    if let Some(summary) = &snapshot.text_summary {
        println!("Summary: {}", summary);
    }
    Ok(())
}

fn run_main(command: Command) -> Result<(), BoxError> {
    let config = Config::from_env();

    // Initialize logging
    let _guard = init_logging(&config.log_dir)?;

    info!("Vigil starting...");

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async {
        match command {
            Command::Serve => run_server(config).await,
            Command::Detect(modality) => run_once(config, modality, None).await,
            Command::Analyze(text) => run_once(config, Modality::TextAnalysis, Some(text)).await,
        }
    })
}

enum Command {
    Serve,
    Detect(Modality),
    Analyze(String),
}

fn parse_args(args: &[String]) -> Result<Option<Command>, String> {
    match args.get(1).map(|s| s.as_str()) {
        Some("serve") => Ok(Some(Command::Serve)),
        Some("detect") => {
            let name = args.get(2).ok_or("detect needs a modality")?;
            let modality: Modality = name.parse().map_err(|e: vigil::engine::UnknownModality| e.to_string())?;
            if !modality.is_image() {
                return Err("detect takes weapon or violence; use analyze for text".to_string());
            }
            Ok(Some(Command::Detect(modality)))
        }
        Some("analyze") => {
            if args.len() < 3 {
                return Err("analyze needs some text".to_string());
            }
            Ok(Some(Command::Analyze(args[2..].join(" "))))
        }
        Some("help") | Some("--help") | Some("-h") | None => Ok(None),
        Some(other) => Err(format!("Unknown command: {}", other)),
    }
}

fn main() {
    let args: Vec<String> = env::args().collect();

    let command = match parse_args(&args) {
        Ok(Some(command)) => command,
        Ok(None) => {
            println!("{}", USAGE);
            return;
        }
        Err(e) => {
            eprintln!("Error: {}\n\n{}", e, USAGE);
            std::process::exit(2);
        }
    };

    if let Err(e) = run_main(command) {
        error!("{}", e);
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
