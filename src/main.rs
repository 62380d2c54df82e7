use anyhow::Result;
use loadmetrics::{
    pipeline::{self, SessionStatus},
    settings::Settings,
};
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

fn main() -> Result<()> {
    // ─── 1) init logging ─────────────────────────────────────────────
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder().with_env_filter(env).init();
    info!("startup");

    // ─── 2) configure dirs ───────────────────────────────────────────
    let settings = Settings::from_env();
    settings.ensure_dirs()?;

    // ─── 3) run a session over the input files ───────────────────────
    let files: Vec<String> = std::env::args().skip(1).collect();
    if files.is_empty() {
        anyhow::bail!("usage: loadmetrics <file.csv> [file.csv ...]");
    }

    let session_id = format!("session-{}", chrono::Utc::now().timestamp_micros());
    let state = pipeline::run(&settings, &session_id, &files);

    match state.status {
        SessionStatus::Completed => {
            if let Some(summary) = &state.summary {
                println!("{}", serde_json::to_string_pretty(summary)?);
            }
            if let Some(csv) = &state.processed_csv_path {
                info!("processed CSV: {}", csv.display());
            }
            if let Some(xlsx) = &state.processed_excel_path {
                info!("processed spreadsheet: {}", xlsx.display());
            }
            Ok(())
        }
        _ => {
            let message = state
                .error_message
                .unwrap_or_else(|| "unknown failure".to_string());
            error!(
                "pipeline failed at {}: {}",
                state.current_stage.as_deref().unwrap_or("?"),
                message
            );
            std::process::exit(1);
        }
    }
}
