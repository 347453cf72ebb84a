use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use serde_json::json;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use url::Url;

use wp_blog_poster::config::Config;
use wp_blog_poster::content::{ContentLocator, Draft, Platform, SelectorLocator};
use wp_blog_poster::messages::{Request, Response, TestConnectionRequest};
use wp_blog_poster::service::Publisher;
use wp_blog_poster::settings::{JsonFileStore, SettingsStore, StoredSettings};
use wp_blog_poster::wordpress::PostStatus;
use wp_blog_poster::worker;

mod cli;

use cli::{Cli, Commands};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            error!("Fatal error: {e:#}");
            std::process::exit(1);
        }
    }
}

/// Returns whether the command succeeded.
async fn run(cli: Cli) -> Result<bool> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    init_tracing()?;

    let mut config = Config::from_env().context("Failed to load configuration")?;
    if let Some(path) = cli.settings {
        config.settings_path = path;
    }
    config.validate().context("Invalid configuration")?;

    let store = Arc::new(JsonFileStore::new(config.settings_path.clone()));
    info!(settings = %store.path().display(), "Configuration loaded");

    match cli.command {
        Commands::Configure {
            url,
            user,
            password,
            token,
            default_status,
            auto_create_terms,
        } => {
            let mut settings = store.load().await.context("Failed to load settings")?;
            if let Some(url) = url {
                Url::parse(url.trim()).with_context(|| format!("Invalid site URL: {url}"))?;
                settings.wp_url = url.trim().trim_end_matches('/').to_string();
            }
            if user.is_some() {
                settings.wp_user = user;
            }
            if password.is_some() {
                settings.wp_password = password;
            }
            if token.is_some() {
                settings.wp_token = token;
            }
            if let Some(status) = default_status {
                settings.default_status = parse_status(&status)?;
            }
            if let Some(enabled) = auto_create_terms {
                settings.auto_create_terms = enabled;
            }
            store.save(&settings).await.context("Failed to save settings")?;
            print_json(&redacted(&settings))?;
            Ok(true)
        }

        Commands::TestConnection { allow_query_token } => {
            let settings = store.load().await.context("Failed to load settings")?;
            let request = Request::TestConnection(TestConnectionRequest {
                wp_url: settings.wp_url.clone(),
                wp_user: settings.wp_user.clone(),
                wp_password: settings.wp_password.clone(),
                wp_token: settings.wp_token.clone(),
                token_transport: None,
                query_fallback_consented: allow_query_token.then_some(true),
            });
            send(&config, store, &request).await
        }

        Commands::Publish {
            file,
            status,
            allow_query_token,
            no_recent_tags,
            dry_run,
        } => {
            let raw = tokio::fs::read_to_string(&file)
                .await
                .with_context(|| format!("Failed to read draft: {}", file.display()))?;
            let mut settings = store.load().await.context("Failed to load settings")?;

            let mut draft = Draft::from_chat_text(&raw, settings.default_status);
            if let Some(status) = status {
                draft.status = parse_status(&status)?;
            }
            info!(title = %draft.title, status = draft.status.as_str(), "Draft parsed");
            let mut post = draft.into_request();
            if post.tags.is_empty() && !no_recent_tags {
                post.tags = settings.remembered_tags().to_vec();
                if !post.tags.is_empty() {
                    info!(tags = ?post.tags, "Reusing tags from the previous post");
                }
            }
            let request = Request::CreatePost(post);

            if dry_run {
                print_json(&request.to_message())?;
                return Ok(true);
            }

            if allow_query_token && !settings.query_fallback_consented {
                settings.query_fallback_consented = true;
                store.save(&settings).await.context("Failed to save settings")?;
            }
            send(&config, store, &request).await
        }

        Commands::Scan {
            html_file,
            platform,
            url,
        } => {
            let html = tokio::fs::read_to_string(&html_file)
                .await
                .with_context(|| format!("Failed to read page: {}", html_file.display()))?;
            let platform = resolve_platform(platform.as_deref(), url.as_deref())?;
            let locator = SelectorLocator::for_platform(platform);

            let regions: Vec<_> = locator
                .locate(&html)
                .into_iter()
                .map(|region| {
                    let draft = Draft::from_chat_text(&region.text, PostStatus::Draft);
                    json!({
                        "rule": region.rule,
                        "title": draft.title,
                        "characters": region.text.chars().count(),
                        "text": region.text,
                    })
                })
                .collect();
            info!(platform = platform.as_str(), found = regions.len(), "Page scanned");
            print_json(&regions)?;
            Ok(true)
        }
    }
}

async fn send(config: &Config, store: Arc<JsonFileStore>, request: &Request) -> Result<bool> {
    let publisher = Publisher::from_config(config, store);
    let (handle, task) = worker::spawn(publisher, config.worker_queue_capacity);

    let response: Response = handle
        .request(request)
        .await
        .context("Publisher worker failed")?;
    drop(handle);
    task.await.context("Publisher worker panicked")?;

    print_json(&response)?;
    Ok(response.success)
}

fn parse_status(value: &str) -> Result<PostStatus> {
    match PostStatus::parse(value) {
        Some(status) => Ok(status),
        None => bail!("Unknown post status: {value}"),
    }
}

fn resolve_platform(platform: Option<&str>, url: Option<&str>) -> Result<Platform> {
    if let Some(name) = platform {
        return Platform::parse(name).with_context(|| format!("Unknown platform: {name}"));
    }
    let Some(url) = url else {
        bail!("Pass --platform or --url");
    };
    let parsed = Url::parse(url).with_context(|| format!("Invalid page URL: {url}"))?;
    parsed
        .host_str()
        .and_then(Platform::from_host)
        .with_context(|| format!("Not a supported chat site: {url}"))
}

fn redacted(settings: &StoredSettings) -> serde_json::Value {
    let mut value = serde_json::to_value(settings).unwrap_or_default();
    for key in ["wpPassword", "wpToken"] {
        if let Some(secret) = value.get_mut(key) {
            if !secret.is_null() {
                *secret = json!("<redacted>");
            }
        }
    }
    value
}

fn print_json(value: &impl serde::Serialize) -> Result<()> {
    let out = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    println!("{out}");
    Ok(())
}

fn init_tracing() -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,wp_blog_poster=debug"));

    // Check if JSON logging is requested
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| matches!(v.to_lowercase().as_str(), "json" | "structured"))
        .unwrap_or(false);

    // Logs go to stderr so stdout stays machine readable
    if use_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .try_init()
            .map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {e}"))?;
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .try_init()
            .map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {e}"))?;
    }

    Ok(())
}
