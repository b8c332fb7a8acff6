use std::{path::PathBuf, time::Duration};

use owo_colors::OwoColorize;
use serde::Deserialize;
use url::Url;

use crate::{
    classify::{ResourceType, normalize},
    cli::Args,
    download::{Backoff, BackoffKind, RetryPolicy},
    error::{Res, ResErr, ResExt},
    fetch::{AllowedDomains, Politeness},
};

/// Static configuration of one crawl session.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CrawlConfig {
    pub seeds: Vec<String>,
    pub allowed_domains: Vec<String>,
    pub output_dir: PathBuf,
    pub max_depth: u32,
    pub max_pages: usize,
    pub delay_ms: u64,
    pub jitter_ms: u64,
    pub timeout_secs: u64,
    pub user_agent: String,
    pub download_types: Vec<ResourceType>,
    pub max_retries: u32,
    pub backoff: BackoffKind,
    pub retry_delay_ms: u64,
    pub dedup: bool,
    pub save_html: bool,
    pub verbose: bool,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        CrawlConfig {
            seeds: Vec::new(),
            allowed_domains: Vec::new(),
            output_dir: PathBuf::from("docsweep-output"),
            max_depth: 10,
            max_pages: 1000,
            delay_ms: 500,
            jitter_ms: 500,
            timeout_secs: 30,
            user_agent: format!("docsweep/{}", env!("CARGO_PKG_VERSION")),
            download_types: vec![ResourceType::Pdf, ResourceType::Image],
            max_retries: 3,
            backoff: BackoffKind::Exponential,
            retry_delay_ms: 1000,
            dedup: false,
            save_html: true,
            verbose: false,
        }
    }
}

impl CrawlConfig {
    pub fn from_toml(text: &str) -> Res<Self> {
        toml::from_str(text).context("Failed to parse config file")
    }

    /// Config file (if any) first, then every flag that was given on top.
    pub async fn from_args(args: Args) -> Res<Self> {
        let mut config = match &args.config {
            Some(path) => {
                let text = tokio::fs::read_to_string(path).await.with_context(format_args!(
                    "Failed to read config file: {}",
                    path.to_string_lossy().red().bold()
                ))?;

                CrawlConfig::from_toml(&text)?
            }
            None => CrawlConfig::default(),
        };

        if !args.seeds.is_empty() {
            config.seeds = args.seeds;
        }
        if !args.allowed_domains.is_empty() {
            config.allowed_domains = args.allowed_domains;
        }
        if let Some(output) = args.output {
            config.output_dir = output;
        }
        if let Some(max_depth) = args.max_depth {
            config.max_depth = max_depth;
        }
        if let Some(max_pages) = args.max_pages {
            config.max_pages = max_pages;
        }
        if let Some(delay_ms) = args.delay_ms {
            config.delay_ms = delay_ms;
        }
        if let Some(jitter_ms) = args.jitter_ms {
            config.jitter_ms = jitter_ms;
        }
        if let Some(timeout) = args.timeout {
            config.timeout_secs = timeout;
        }
        if let Some(user_agent) = args.user_agent {
            config.user_agent = user_agent;
        }
        if args.no_download {
            config.download_types.clear();
        } else if !args.download.is_empty() {
            config.download_types = args.download;
        }
        if let Some(max_retries) = args.max_retries {
            config.max_retries = max_retries;
        }
        if let Some(backoff) = args.backoff {
            config.backoff = backoff;
        }
        if let Some(retry_delay_ms) = args.retry_delay_ms {
            config.retry_delay_ms = retry_delay_ms;
        }
        config.dedup |= args.dedup;
        config.save_html &= !args.no_save_html;
        config.verbose |= args.verbose;

        config.validate()?;

        Ok(config)
    }

    pub fn validate(&self) -> Res<()> {
        if self.seeds.is_empty() {
            return Err(ResErr::new(
                "Invalid configuration",
                String::from("At least one seed URL is required"),
            ));
        }

        for seed in &self.seeds {
            Url::parse(seed).with_context(format_args!(
                "Failed to parse seed URL: {}",
                seed.bright_blue().italic()
            ))?;
        }

        if self.allowed().is_empty() {
            return Err(ResErr::new(
                "Invalid configuration",
                String::from("No allowed domain given and none could be derived from the seeds"),
            ));
        }

        Ok(())
    }

    /// Seeds resolved the same way as discovered links.
    pub fn seed_urls(&self) -> Vec<String> {
        self.seeds.iter().map(|seed| normalize(seed, seed)).collect()
    }

    /// Configured domains, or the seed hosts when none are configured.
    pub fn allowed(&self) -> AllowedDomains {
        if !self.allowed_domains.is_empty() {
            return AllowedDomains::new(&self.allowed_domains);
        }

        AllowedDomains::new(
            self.seeds
                .iter()
                .filter_map(|seed| Url::parse(seed).ok())
                .filter_map(|url| url.host_str().map(str::to_owned)),
        )
    }

    pub fn politeness(&self) -> Politeness {
        Politeness {
            delay: Duration::from_millis(self.delay_ms),
            jitter: Duration::from_millis(self.jitter_ms),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        let delay = Duration::from_millis(self.retry_delay_ms);

        RetryPolicy {
            max_retries: self.max_retries,
            backoff: match self.backoff {
                BackoffKind::Fixed => Backoff::Fixed(delay),
                BackoffKind::Exponential => Backoff::Exponential { base: delay },
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{path::PathBuf, time::Duration};

    use clap::Parser;
    use url::Url;

    use crate::{
        classify::ResourceType,
        cli::Args,
        config::CrawlConfig,
        download::{Backoff, BackoffKind},
        error::{Res, ResExt},
    };

    #[test]
    fn test_from_toml() -> Res<()> {
        let config = CrawlConfig::from_toml(
            r#"
seeds = ["https://academy.test/"]
allowed_domains = ["academy.test", "cdn.academy.test"]
output_dir = "out"
max_depth = 2
download_types = ["pdf"]
backoff = "fixed"
retry_delay_ms = 250
dedup = true
"#,
        )?;

        assert_eq!(config.max_depth, 2);
        assert_eq!(config.max_pages, 1000);
        assert_eq!(config.output_dir, PathBuf::from("out"));
        assert_eq!(config.download_types, vec![ResourceType::Pdf]);
        assert!(config.dedup);
        assert_eq!(
            config.retry_policy().backoff,
            Backoff::Fixed(Duration::from_millis(250))
        );

        Ok(())
    }

    #[test]
    fn test_from_toml_rejects_unknown_keys() {
        assert!(CrawlConfig::from_toml("max_dept = 3").is_err());
    }

    #[test]
    fn test_defaults() {
        let config = CrawlConfig::default();

        assert_eq!(config.max_depth, 10);
        assert_eq!(config.timeout(), Duration::from_secs(30));
        assert_eq!(config.retry_policy().max_retries, 3);
        assert_eq!(
            config.retry_policy().backoff,
            Backoff::Exponential {
                base: Duration::from_secs(1)
            }
        );
        assert_eq!(
            config.download_types,
            vec![ResourceType::Pdf, ResourceType::Image]
        );
    }

    #[tokio::test]
    async fn test_flags_override_defaults() -> Res<()> {
        let args = Args::try_parse_from([
            "docsweep",
            "https://academy.test/start",
            "-o",
            "out",
            "-m",
            "2",
            "--max-pages",
            "10",
            "--no-download",
            "--backoff",
            "fixed",
            "--dedup",
            "--no-save-html",
        ])
        .map_err(|err| err.to_string())
        .context("Failed to parse test arguments")?;

        let config = CrawlConfig::from_args(args).await?;

        assert_eq!(config.seeds, vec!["https://academy.test/start"]);
        assert_eq!(config.max_depth, 2);
        assert_eq!(config.max_pages, 10);
        assert!(config.download_types.is_empty());
        assert_eq!(config.backoff, BackoffKind::Fixed);
        assert!(config.dedup);
        assert!(!config.save_html);

        let allowed = config.allowed();
        let url = Url::parse("https://academy.test/course").context("parse")?;
        assert!(allowed.permits(&url));

        Ok(())
    }

    #[tokio::test]
    async fn test_missing_seed_is_rejected() -> Res<()> {
        let args = Args::try_parse_from(["docsweep", "-o", "out"])
            .map_err(|err| err.to_string())
            .context("Failed to parse test arguments")?;

        assert!(CrawlConfig::from_args(args).await.is_err());

        Ok(())
    }
}
