use clap::ValueHint;
use std::path::PathBuf;

use crate::{classify::ResourceType, download::BackoffKind};

static LONG_ABT: &str = r#"
docsweep - A crawler that maps a documentation site into a categorized sitemap

• docsweep walks every in-domain page reachable from the seed URLs, breadth-first and one request at a time, up to a depth and page-count limit.
• Links, embedded media and downloadable resources are classified (html, image, video, pdf, document, youtube, vimeo, other) and written to a JSON sitemap, while PDFs and images are downloaded with their SHA-256 checksums.
"#;

#[derive(clap::Parser, Debug)]
#[command(
    author,
    version,
    about = "A crawler that maps a documentation site into a categorized sitemap",
    long_about = LONG_ABT
)]
pub struct Args {
    /// Seed URLs (depth 0). May instead come from the config file.
    #[arg(value_hint = ValueHint::Url)]
    pub seeds: Vec<String>,

    /// Output directory for the sitemap, raw pages and downloads.
    #[arg(short, long, value_hint = ValueHint::DirPath)]
    pub output: Option<PathBuf>,

    /// TOML file with the same keys as the flags; flags win.
    #[arg(short, long, value_hint = ValueHint::FilePath)]
    pub config: Option<PathBuf>,

    /// Domain the crawl may visit, subdomains included. Defaults to the seed hosts.
    #[arg(short = 'd', long = "allowed-domain")]
    pub allowed_domains: Vec<String>,

    #[arg(short, long)]
    pub max_depth: Option<u32>,

    #[arg(short = 'p', long)]
    pub max_pages: Option<usize>,

    /// Base politeness delay before every request.
    #[arg(long)]
    pub delay_ms: Option<u64>,

    /// Upper bound of the random delay added to `--delay-ms`.
    #[arg(long)]
    pub jitter_ms: Option<u64>,

    /// Request timeout in seconds.
    #[arg(long)]
    pub timeout: Option<u64>,

    #[arg(long)]
    pub user_agent: Option<String>,

    /// Resource type to download; repeat for several.
    #[arg(long = "download", value_enum)]
    pub download: Vec<ResourceType>,

    /// Record resources without downloading any.
    #[arg(long, conflicts_with = "download")]
    pub no_download: bool,

    #[arg(long)]
    pub max_retries: Option<u32>,

    #[arg(long, value_enum)]
    pub backoff: Option<BackoffKind>,

    /// Fixed pause, or the base of the exponential one, between download attempts.
    #[arg(long)]
    pub retry_delay_ms: Option<u64>,

    /// Keep each URL at most once per sitemap bucket.
    #[arg(long)]
    pub dedup: bool,

    /// Skip writing the raw HTML of every page.
    #[arg(long)]
    pub no_save_html: bool,

    #[arg(short, long, value_hint = ValueHint::FilePath, global = true)]
    pub log_file: Option<PathBuf>,

    #[arg(short, long, global = true)]
    pub verbose: bool,
}
