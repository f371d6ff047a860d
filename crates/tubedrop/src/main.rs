use anyhow::Result;
use dotenvy::dotenv;
use futures_util::StreamExt;
use std::sync::Arc;

use dropcore::core::metrics::init_metrics;
use dropcore::core::validation::DownloadUrl;
use dropcore::core::{config, init_logger, log_startup_configuration};
use dropcore::relay::{RelayRun, ScriptLauncher};
use dropcore::search::YtDlpSearch;
use dropcore::{AppConfig, ClientSignal, ClientState, DownloadRelay, DownloadSession, RelayEvent, SearchService};
use tubedrop::cli::{Cli, Commands};
use tubedrop::{start_web_server, AppState};

/// Main entry point
///
/// Parses CLI arguments and dispatches to the selected subcommand.
///
/// # Errors
/// Returns an error if initialization fails or the subcommand fails.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse_args();

    std::panic::set_hook(Box::new(|panic_info| {
        log::error!("Panic caught: {:?}", panic_info);
        if let Some(location) = panic_info.location() {
            log::error!("Panic at {}:{}:{}", location.file(), location.line(), location.column());
        }
    }));

    // .env must be loaded before the config statics are first read
    let _ = dotenv();

    init_logger(&config::LOG_FILE_PATH)?;
    init_metrics();

    let mut app_config = AppConfig::from_env();

    match cli.command {
        Some(Commands::Serve { port }) => {
            if let Some(port) = port {
                app_config.port = port;
            }
            run_server(app_config).await
        }
        Some(Commands::Search { query, json }) => run_cli_search(app_config, query.join(" "), json).await,
        Some(Commands::Download { url }) => run_cli_download(app_config, url).await,
        None => {
            log::info!("No command specified, starting web server");
            run_server(app_config).await
        }
    }
}

async fn run_server(app_config: AppConfig) -> Result<()> {
    log_startup_configuration(&app_config);
    start_web_server(AppState::from_config(app_config)).await
}

/// Run CLI search command
async fn run_cli_search(app_config: AppConfig, query: String, json: bool) -> Result<()> {
    let service = SearchService::new(
        Arc::new(YtDlpSearch::new(app_config.ytdl_bin.clone())),
        app_config.search_max_results,
    )
    .with_thumbnail_hosts(app_config.thumbnail_hosts.clone());
    let response = service.search(Some(&query)).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&response)?);
        return Ok(());
    }

    if response.items.is_empty() {
        println!("No results for {:?}", query);
        return Ok(());
    }
    for (i, item) in response.items.iter().enumerate() {
        let duration = if item.duration.is_empty() { "live" } else { &item.duration };
        println!("{:>2}. {} [{}]", i + 1, item.title, duration);
        println!("    https://www.youtube.com/watch?v={}", item.video_id);
    }
    Ok(())
}

/// Run CLI download command
///
/// Drives the relay in-process and prints every status change. Ctrl-C drops
/// the event stream, which kills the downloader.
async fn run_cli_download(app_config: AppConfig, url: String) -> Result<()> {
    let url = DownloadUrl::parse(Some(&url)).map_err(|e| anyhow::anyhow!("{}: {}", e, url))?;
    log_startup_configuration(&app_config);

    println!("🎵 tubedrop download");
    println!("URL: {}", url);

    let relay = DownloadRelay::new(
        Arc::new(ScriptLauncher::from_config(&app_config)),
        app_config.relay_settings(),
    );
    let RelayRun { mut events, outcome } = relay.spawn(url);

    let mut session = DownloadSession::new();
    session.apply(ClientSignal::Open);
    println!("   {}", session.status());

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let interrupted = loop {
        tokio::select! {
            _ = &mut ctrl_c => break true,
            event = events.next() => match event {
                Some(RelayEvent::Message(message)) => {
                    if session.apply(message.into()) {
                        println!("   [{:>5.1}%] {}", session.progress(), session.status());
                    }
                }
                Some(RelayEvent::KeepAlive) => {}
                None => {
                    session.apply(ClientSignal::Closed);
                    break false;
                }
            },
        }
    };

    if interrupted {
        session.apply(ClientSignal::Cancel);
        drop(events);
    }

    match outcome.await {
        Ok(outcome) => log::info!("Relay finished: {}", outcome),
        Err(e) => log::error!("Relay task failed: {}", e),
    }

    match session.state() {
        ClientState::Done { file } => {
            println!("\n✅ Saved {}", app_config.download_dir.join(file).display());
            if let Some(link) = session.save_url() {
                println!("   Served by the web server at {}", link);
            }
            Ok(())
        }
        ClientState::Cancelled => {
            println!("\n🛑 Download cancelled");
            Ok(())
        }
        ClientState::Error { message } => Err(anyhow::anyhow!("Download failed: {}", message)),
        other => Err(anyhow::anyhow!("Download ended in unexpected state {:?}", other)),
    }
}
