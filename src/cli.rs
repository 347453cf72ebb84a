//! Command line definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Publish markdown drafts from AI chats to WordPress.
#[derive(Parser)]
#[command(name = "wp-blog-poster")]
#[command(version)]
pub(crate) struct Cli {
    /// Settings file (overrides SETTINGS_PATH)
    #[arg(short, long, global = true)]
    pub settings: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Store site URL, credentials and publishing defaults
    Configure {
        /// WordPress site URL
        #[arg(long)]
        url: Option<String>,

        /// WordPress user name
        #[arg(long)]
        user: Option<String>,

        /// Application password
        #[arg(long, env = "WP_APP_PASSWORD", hide_env_values = true)]
        password: Option<String>,

        /// Token issued by the token auth plugin
        #[arg(long, env = "WP_TOKEN", hide_env_values = true)]
        token: Option<String>,

        /// Status used when a draft does not set one
        #[arg(long)]
        default_status: Option<String>,

        /// Create missing categories and tags when publishing
        #[arg(long)]
        auto_create_terms: Option<bool>,
    },

    /// Check the stored credentials against the site
    TestConnection {
        /// Allow sending the token as a URL parameter if the header is blocked
        #[arg(long)]
        allow_query_token: bool,
    },

    /// Publish a markdown draft file
    Publish {
        /// Markdown file, optionally with front matter
        file: PathBuf,

        /// Post status (draft, publish, future, pending, private)
        #[arg(long)]
        status: Option<String>,

        /// Allow sending the token as a URL parameter if the header is blocked
        #[arg(long)]
        allow_query_token: bool,

        /// Do not reuse the previous post's tags when the draft has none
        #[arg(long)]
        no_recent_tags: bool,

        /// Print the request instead of sending it
        #[arg(long)]
        dry_run: bool,
    },

    /// List draft-like text found in a saved chat page
    Scan {
        /// Saved HTML of the chat page
        html_file: PathBuf,

        /// chatgpt, claude or gemini
        #[arg(long)]
        platform: Option<String>,

        /// Page URL, used to detect the platform
        #[arg(long)]
        url: Option<String>,
    },
}
