//! MagicMimi - Screen-scanning QR ticket grabber for game client logins
//!
//! Main entry point for the command-line application.
//!
//! # Overview
//!
//! This binary is a headless control surface over the [`ScanEngine`]. It initializes:
//! - Configuration ([`ConfigManager`]: `Settings.yaml`, `Accounts.yaml`, env overrides)
//! - Logging infrastructure (file rotation + console output)
//! - Tokio runtime (session loop + blocking pool for capture, decode and login)
//! - The engine with snapshot capture, QR decoding and the HTTP login client
//!
//! # Execution Flow
//!
//! 1. Parse arguments, load settings from `MagicMimi Data/`
//! 2. Initialize logging → logs/magicmimi.<date>
//! 3. Handle listing commands (`--list-accounts`, `--list-windows`) and exit
//! 4. Create tokio runtime and the scan engine
//! 5. Start a session and mirror engine events to the console
//! 6. Wait for Ctrl-C or for the session to end by itself
//! 7. Stop the session and shut down with a 5s bound

use anyhow::{Context, Result, bail};
use camino::Utf8PathBuf;
use clap::Parser;
use magicmimi::config::DEFAULT_DATA_DIR;
use magicmimi::logging::{LogFormat, LogOptions};
use magicmimi::models::WindowHandle;
use magicmimi::services::{MihoyoLoginClient, QrDecoder, SnapshotSource};
use magicmimi::{
    APP_NAME, ConfigManager, Event, GameId, ScanEngine, ScanRuntime, ScanServices, ScanSettings,
    ScanTarget, VERSION,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;

const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Parser, Debug)]
#[command(name = "magicmimi", version, about = "Scan a game window for login QR codes and claim them")]
struct Cli {
    /// Directory holding Settings.yaml and Accounts.yaml
    #[arg(long, default_value = DEFAULT_DATA_DIR)]
    data_dir: Utf8PathBuf,

    /// Account to claim tickets for (defaults to the first stored account)
    #[arg(short, long)]
    account: Option<String>,

    /// Game whose tickets to claim (genshin or starrail)
    #[arg(short, long, default_value = "genshin")]
    game: GameId,

    /// Window handle to scan (decimal or 0x hex); scans the desktop center if omitted
    #[arg(short, long)]
    window: Option<WindowHandle>,

    /// Verbose logging
    #[arg(long)]
    debug: bool,

    /// Write the log file as JSON lines
    #[arg(long)]
    log_json: bool,

    /// List windows with a registered snapshot and exit
    #[arg(long)]
    list_windows: bool,

    /// List stored accounts and exit
    #[arg(long)]
    list_accounts: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_manager = ConfigManager::new(&cli.data_dir)?;
    let app_config = config_manager.load_app_config()?;

    // Keep the guard alive for the whole run so buffered lines reach the file
    let _log_guard = magicmimi::logging::setup_logging_with_options(&LogOptions {
        log_dir: "logs",
        log_prefix: "magicmimi",
        debug_mode: cli.debug || app_config.debug_mode,
        console_output: true,
        file_format: if cli.log_json {
            LogFormat::Json
        } else {
            LogFormat::Text
        },
    })?;

    tracing::info!("Starting {} v{}", APP_NAME, VERSION);

    let accounts = config_manager.load_accounts()?;
    let frame_source = SnapshotSource::from_settings(&app_config.capture);

    if cli.list_accounts {
        if accounts.is_empty() {
            println!("No accounts in {}", config_manager.accounts_path());
        }
        for (name, account) in &accounts {
            println!("{}\t{}", name, account.masked_uid());
        }
        return Ok(());
    }

    if cli.list_windows {
        let mut any = false;
        for (handle, path) in frame_source.windows() {
            any = true;
            println!("{}\t{}", handle, path);
        }
        if !any {
            println!("No window snapshots registered in {}", config_manager.settings_path());
        }
        return Ok(());
    }

    let account_name = match cli.account {
        Some(name) => name,
        None => match accounts.keys().next() {
            Some(name) => name.clone(),
            None => bail!(
                "No accounts configured, add one to {}",
                config_manager.accounts_path()
            ),
        },
    };

    let target = match cli.window {
        Some(handle) => ScanTarget::window(handle),
        None => ScanTarget::DesktopCenter {
            width: app_config.capture.desktop_region.width,
            height: app_config.capture.desktop_region.height,
        },
    };

    // Session loop plus blocking pool for capture, decode and login calls
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .worker_threads(2)
        .thread_name("magicmimi-worker")
        .build()?;

    tracing::info!("Tokio runtime initialized with {} worker threads", 2);

    let login_client =
        MihoyoLoginClient::new(&app_config.api).context("Failed to create login client")?;

    let engine = Arc::new(ScanEngine::new(
        ScanRuntime::new(runtime.handle().clone()),
        ScanServices::new(
            Arc::new(frame_source),
            Arc::new(QrDecoder::new()),
            Arc::new(login_client),
        ),
        Arc::new(accounts),
        app_config.scan,
    ));

    let observer = spawn_console_observer(&engine);

    engine
        .start(ScanSettings {
            target,
            game: cli.game,
            account: account_name.clone(),
        })
        .with_context(|| format!("Failed to start scan for account '{}'", account_name))?;

    println!("Scanning {} for {} QR codes, press Ctrl-C to stop", target, cli.game);

    let stopped_cleanly = runtime.block_on(async {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => match signal {
                Ok(()) => tracing::info!("Ctrl-C received, stopping scan"),
                Err(e) => tracing::warn!("Failed to listen for Ctrl-C: {}", e),
            },
            _ = engine.wait_idle() => tracing::info!("Scan session ended by itself"),
        }

        engine.shutdown(SHUTDOWN_TIMEOUT).await
    });

    if !stopped_cleanly {
        tracing::warn!("Scan did not stop within {}s", SHUTDOWN_TIMEOUT.as_secs());
    }

    // The event channel closes once both the engine and any leftover session task are
    // gone, which ends the observer
    drop(engine);
    runtime.shutdown_timeout(SHUTDOWN_TIMEOUT);
    if observer.join().is_err() {
        tracing::error!("Console observer thread panicked");
    }

    tracing::info!("Application shutdown complete");
    Ok(())
}

/// Print user-facing engine events on a dedicated thread until the channel closes.
fn spawn_console_observer(engine: &ScanEngine) -> std::thread::JoinHandle<()> {
    let mut rx = engine.subscribe();

    std::thread::spawn(move || {
        tracing::debug!("Console observer thread started");

        loop {
            match rx.blocking_recv() {
                Ok(Event::Log(entry)) => println!("{}", entry),
                Ok(Event::Outcome { success, message }) => {
                    tracing::debug!("Claim outcome: success={}, {}", success, message)
                }
                Ok(Event::Fps { value }) => tracing::trace!("FPS {:.1}", value),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!("Console fell behind, skipped {} events", skipped);
                }
                Err(RecvError::Closed) => break,
            }
        }

        tracing::debug!("Console observer thread terminated");
    })
}
