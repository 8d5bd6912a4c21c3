mod cli;

use pushwire::adapters::SubscriptionStore;
use pushwire::config::AppConfig;
use pushwire::state::AppState;
use pushwire::types::push::NotifyResponse;
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = cli::parse();
    init_tracing(cli.verbose);

    match cli::run(cli) {
        cli::RunOutcome::Exit(code) => ExitCode::from(code),
        cli::RunOutcome::Serve { addr, config } => {
            let state = match build_state(config) {
                Ok(state) => state,
                Err(err) => {
                    eprintln!("error: {err}");
                    return ExitCode::FAILURE;
                }
            };
            match pushwire::serve(addr, state).await {
                Ok(()) => ExitCode::SUCCESS,
                Err(err) => {
                    tracing::error!(error = %err, "server error");
                    ExitCode::FAILURE
                }
            }
        }
        cli::RunOutcome::Send { config, request } => {
            let state = match build_state(config) {
                Ok(state) => state,
                Err(err) => {
                    eprintln!("error: {err}");
                    return ExitCode::FAILURE;
                }
            };
            let report = match state.push.notify(&state.config, &request).await {
                Ok(report) => report,
                Err(err) => {
                    eprintln!("error: {err}");
                    return ExitCode::FAILURE;
                }
            };
            match serde_json::to_string_pretty(&NotifyResponse::from(report)) {
                Ok(json) => {
                    println!("{json}");
                    ExitCode::SUCCESS
                }
                Err(err) => {
                    eprintln!("error: {err}");
                    ExitCode::FAILURE
                }
            }
        }
    }
}

fn init_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = if verbose {
        EnvFilter::new("pushwire=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("pushwire=info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn build_state(config: AppConfig) -> Result<AppState, String> {
    let store = match config.subscriptions.as_deref() {
        Some(path) => SubscriptionStore::load(path).map_err(|err| err.to_string())?,
        None => {
            tracing::warn!("no --subscriptions file given; starting with an empty in-memory store");
            SubscriptionStore::default()
        }
    };
    AppState::new(config, store).map_err(|err| format!("failed to build HTTP client: {err}"))
}
