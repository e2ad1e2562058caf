use clap::Parser;
use nq_lib::cli::{self, Cli};
use nq_lib::env_file::load_environment;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "warn,nq=info,nq_lib=info";

fn init_tracing() {
    let filter = EnvFilter::try_from_env("NQ_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    // Route `log` records from the library crates into tracing.
    let _ = tracing_log::LogTracer::init();

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    #[cfg(feature = "logs-json")]
    let _ = builder.json().try_init();
    #[cfg(not(feature = "logs-json"))]
    let _ = builder.without_time().try_init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // NQ_LOG may come from the .env file, so load it before logging starts.
    let env_result = load_environment(cli.env_file.as_deref());
    init_tracing();
    if let Ok(Some(path)) = &env_result {
        tracing::debug!(path = %path.display(), "loaded env file");
    }

    let result = match env_result {
        Ok(_) => cli::run(cli).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::debug!(error = ?e, "command failed");
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
