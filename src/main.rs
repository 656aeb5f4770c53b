use anyhow::Result;
use dotenvy::dotenv;
use std::sync::Arc;
use std::time::Duration;
use teloxide::prelude::*;
use teloxide::update_listeners::webhooks;
use tokio::time::sleep;

use clipdrop::cli::{Cli, Commands};
use clipdrop::core::{config, human_bytes, init_logger, log_cookies_configuration};
use clipdrop::download::source::ytdlp::YtDlpBackend;
use clipdrop::download::thumbnail::ThumbnailFetcher;
use clipdrop::download::{CookieStore, JobContext, MediaBackend, MediaKind, PipelineSettings, Resolved};
use clipdrop::telegram::preview::present_formats;
use clipdrop::telegram::{create_bot, schema, setup_bot_commands, HandlerDeps, TelegramGateway};

/// Bot API startup retries while a local server is still booting (60 * 5s)
const STARTUP_MAX_RETRIES: u32 = 60;
const STARTUP_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Main entry point for the Telegram bot
///
/// Parses CLI arguments and dispatches to appropriate subcommand.
#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse_args();

    // Log panics from spawned jobs instead of losing them on stderr
    std::panic::set_hook(Box::new(|panic_info| {
        log::error!("Panic caught: {:?}", panic_info);
        if let Some(location) = panic_info.location() {
            log::error!("Panic at {}:{}:{}", location.file(), location.line(), location.column());
        }
        if let Some(msg) = panic_info.payload().downcast_ref::<&str>() {
            log::error!("Panic message: {}", msg);
        }
    }));

    // .env must be loaded before any config static is touched
    let _ = dotenv();

    init_logger(&config::LOG_FILE_PATH)?;

    match cli.command {
        Some(Commands::Run { webhook }) => {
            log::info!("Running bot (webhook: {})", webhook);
            run_bot(webhook).await
        }
        Some(Commands::Info { url, kind, json }) => run_cli_info(url, kind, json).await,
        None => {
            log::info!("No command specified, running bot in default mode");
            run_bot(false).await
        }
    }
}

/// Resolves a link and prints the menu the bot would offer for it.
async fn run_cli_info(url: String, kind: MediaKind, json: bool) -> Result<()> {
    let url = url::Url::parse(&url)?;
    let backend = YtDlpBackend::from_config(CookieStore::from_config());

    let resolved = backend
        .resolve(&url)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to get info: {}", e))?;

    match resolved {
        Resolved::Single(info) => {
            let options = present_formats(&info.formats, kind);
            if json {
                println!("{}", serde_json::to_string_pretty(&options)?);
                return Ok(());
            }

            println!("🎬 {}", info.title);
            println!("URL: {}\n", url);
            if options.is_empty() {
                println!("No separate {} formats listed, the bot will offer ⭐ Best only.", kind);
            }
            for (index, option) in options.iter().enumerate() {
                let size = option.approx_size.map(human_bytes).unwrap_or_else(|| "?".to_string());
                println!(
                    "{:>2}. {:<10} {:<5} {:>10}  [{}]",
                    index + 1,
                    option.quality,
                    option.container,
                    size,
                    option.format_id
                );
            }
        }
        Resolved::Playlist(playlist) => {
            if json {
                println!("{}", serde_json::to_string_pretty(&playlist)?);
                return Ok(());
            }

            println!("📁 {} ({} videos)", playlist.title, playlist.entries.len());
            for entry in &playlist.entries {
                println!("{:>3}. {}", entry.index, entry.title);
            }
        }
    }

    Ok(())
}

/// Starts the bot with long polling or, when requested and configured, a webhook.
async fn run_bot(use_webhook: bool) -> Result<()> {
    let bot_init_start = std::time::Instant::now();
    log::info!("Starting bot...");

    log_cookies_configuration();

    let bot = create_bot()?;

    // Retry while a local Bot API server is still initializing
    let bot_info = {
        let mut startup_retry = 0;
        loop {
            match bot.get_me().await {
                Ok(info) => break info,
                Err(e) => {
                    let err_str = e.to_string();
                    let is_retryable = err_str.contains("restart")
                        || err_str.contains("network")
                        || err_str.contains("connection")
                        || err_str.contains("timed out")
                        || err_str.contains("Connection refused");

                    startup_retry += 1;
                    if startup_retry >= STARTUP_MAX_RETRIES || !is_retryable {
                        return Err(anyhow::anyhow!(
                            "Failed to connect to Bot API after {} retries: {}",
                            startup_retry,
                            e
                        ));
                    }

                    log::warn!(
                        "Bot API not ready (attempt {}/{}): {}. Retrying in 5 seconds...",
                        startup_retry,
                        STARTUP_MAX_RETRIES,
                        err_str
                    );
                    sleep(STARTUP_RETRY_DELAY).await;
                }
            }
        }
    };
    log::info!("Bot username: {:?}, Bot ID: {}", bot_info.username.as_deref(), bot_info.id);

    setup_bot_commands(&bot).await?;

    let max_upload_bytes = *config::upload::MAX_UPLOAD_BYTES;
    log::info!(
        "Upload limit: {} ({} Bot API)",
        human_bytes(max_upload_bytes),
        if config::is_local_bot_api() { "local" } else { "cloud" }
    );

    let cookies = CookieStore::from_config();
    let jobs = JobContext {
        backend: Arc::new(YtDlpBackend::from_config(cookies.clone())),
        gateway: Arc::new(TelegramGateway::new(bot.clone(), max_upload_bytes)),
        thumbnails: ThumbnailFetcher::from_config()?,
        settings: Arc::new(PipelineSettings::from_config()),
    };
    let deps = HandlerDeps::new(jobs, cookies, config::ADMIN_IDS.clone());
    let handler = schema(deps);

    let webhook_url = if use_webhook { config::WEBHOOK_URL.clone() } else { None };
    if use_webhook && webhook_url.is_none() {
        log::warn!("--webhook given but WEBHOOK_URL is not set, falling back to long polling");
    }

    let mut dispatcher = Dispatcher::builder(bot.clone(), handler)
        .dependencies(DependencyMap::new())
        .enable_ctrlc_handler()
        .build();

    log::info!("================================================");
    log::info!(
        "🎉 Bot initialization complete in {:.2}s",
        bot_init_start.elapsed().as_secs_f64()
    );
    log::info!("📡 Ready to receive updates!");
    log::info!("================================================");

    if let Some(url) = webhook_url {
        log::info!("Starting bot in webhook mode at {} (port {})", url, *config::WEBHOOK_PORT);
        let options = webhooks::Options::new(([0, 0, 0, 0], *config::WEBHOOK_PORT).into(), url::Url::parse(&url)?);
        let listener = webhooks::axum(bot, options).await?;

        dispatcher
            .dispatch_with_listener(
                listener,
                LoggingErrorHandler::with_custom_text("An error from the update listener"),
            )
            .await;
    } else {
        use teloxide::update_listeners::Polling;

        log::info!("Starting bot in long polling mode");
        let listener = Polling::builder(bot).drop_pending_updates().build();

        dispatcher
            .dispatch_with_listener(
                listener,
                LoggingErrorHandler::with_custom_text("An error from the update listener"),
            )
            .await;
    }

    log::info!("Dispatcher shutdown gracefully");
    Ok(())
}
