use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use bank0_guardian::ConsentApi;
use bank0_lib::{commands, logging, AppConfig, Bank0App, Bank0Result};
use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "bank0", version, about = "Two-factor authenticator for bank0")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Preference file holding the enrollment (overrides the configuration)
    #[arg(long)]
    store: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show the enrollment held on this device
    Status,
    /// Print the current code
    Code,
    /// Follow codes as they change
    Watch {
        /// Stop after this many codes
        #[arg(short = 'n', long)]
        count: Option<usize>,
    },
    /// Store an enrollment JSON record
    Import { file: PathBuf },
    /// Remove the enrollment from this device
    Forget,
    /// Show the request carried by a notification JSON file
    Consent { notification: PathBuf },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => AppConfig::load(path),
        None => Ok(AppConfig::default()),
    };
    let mut config = match config {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::FAILURE;
        }
    };
    if let Some(store) = cli.store {
        config.store_path = Some(store);
    }

    logging::init(&config.log_filter);

    match run(cli.command, config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{}", e);
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Command, config: AppConfig) -> Bank0Result<()> {
    let (mut app, mut updates) = Bank0App::open(config)?;
    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    match command {
        Command::Status => {
            app.load()?;
            commands::status(&app, &mut out)
        }
        Command::Code => {
            app.load()?;
            commands::code(&app, &mut out)
        }
        Command::Watch { count } => {
            let shutdown = async {
                let _ = tokio::signal::ctrl_c().await;
            };
            commands::watch(&mut app, &mut updates, count, shutdown, &mut out).await
        }
        Command::Import { file } => commands::import(&mut app, &file, &mut out),
        Command::Forget => commands::forget(&mut app, &mut out),
        Command::Consent { notification } => {
            app.load()?;
            let client = app.config().consent_client();
            let consent = client
                .as_ref()
                .map(|c| c as &dyn ConsentApi)
                .map_err(Clone::clone);
            commands::consent(&app, &notification, consent, &mut out).await
        }
    }?;
    out.flush().map_err(|e| bank0_lib::Bank0Error::Storage(e.to_string()))
}
