use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    time::Duration,
};

use owo_colors::OwoColorize;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::{
    fs::{self, File},
    io::{AsyncReadExt, AsyncWriteExt, BufWriter},
};

use crate::{
    classify::ResourceType,
    error::{Log, Res, ResExt},
    fetch::{SweepClient, content_type_of},
    output::{RESOURCES_DIR, page_hash},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum BackoffKind {
    Fixed,
    Exponential,
}

/// Pause between two download attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    Fixed(Duration),
    /// `base * 2^attempt`, attempts counted from zero.
    Exponential { base: Duration },
}

impl Backoff {
    pub fn delay(&self, attempt: u32) -> Duration {
        match self {
            Backoff::Fixed(delay) => *delay,
            Backoff::Exponential { base } => base.saturating_mul(2u32.saturating_pow(attempt)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub backoff: Backoff,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_retries: 3,
            backoff: Backoff::Exponential {
                base: Duration::from_secs(1),
            },
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadResult {
    pub success: bool,
    pub size: Option<u64>,
    pub checksum: Option<String>,
    pub content_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip)]
    pub status: Option<u16>,
}

impl DownloadResult {
    fn failed(error: String) -> Self {
        DownloadResult {
            success: false,
            error: Some(error),
            ..DownloadResult::default()
        }
    }
}

/// Retried download-to-disk. The SHA-256 checksum is recorded, never verified.
#[derive(Debug, Clone)]
pub struct Downloader {
    root: PathBuf,
    policy: RetryPolicy,
}

impl Downloader {
    pub fn new(output_dir: &Path, policy: RetryPolicy) -> Self {
        Downloader {
            root: output_dir.join(RESOURCES_DIR),
            policy,
        }
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Where a resource of `kind` fetched from `url` is stored.
    pub fn destination(&self, url: &str, kind: ResourceType) -> PathBuf {
        self.root.join(kind.as_str()).join(resource_filename(url))
    }

    /// Never fails: after `max_retries` failed attempts the last error is returned in the result.
    pub async fn download(&self, client: &SweepClient, url: &str, destination: &Path) -> DownloadResult {
        let attempts = self.policy.max_retries.max(1);
        let mut last_error = String::new();

        for attempt in 0..attempts {
            match self.attempt(client, url, destination).await {
                Ok(result) => return result,
                Err(err) => {
                    last_error = err.to_string();

                    // logger failures are dropped: a download reports through its result
                    let _ = format!(
                        "Download attempt {}/{} failed for URL: {}\n{}",
                        attempt + 1,
                        attempts,
                        url.bright_blue().italic(),
                        err
                    )
                    .log("[WARN]")
                    .await;

                    let _ = fs::remove_file(destination).await;

                    if attempt + 1 < attempts {
                        let pause = self.policy.backoff.delay(attempt);
                        if !pause.is_zero() {
                            tokio::time::sleep(pause).await;
                        }
                    }
                }
            }
        }

        DownloadResult::failed(last_error)
    }

    async fn attempt(&self, client: &SweepClient, url: &str, destination: &Path) -> Res<DownloadResult> {
        let mut res = client.get(url).await?;
        let stat = res.status();

        res.error_for_status_ref().with_context(format_args!(
            "Server returned status code: {}",
            stat.as_str().red().bold()
        ))?;

        let content_type = content_type_of(res.headers());

        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent).await.with_context(format_args!(
                "Failed to create directory: {}",
                parent.to_string_lossy().red().bold()
            ))?;
        }

        let file = File::create(destination).await.with_context(format_args!(
            "Failed to create file: {}",
            destination.to_string_lossy().red().bold()
        ))?;
        let mut wtr = BufWriter::new(file);
        let mut size = 0u64;

        while let Some(chunk) = res
            .chunk()
            .await
            .context("Failed to read response body")?
        {
            wtr.write_all(&chunk).await?;
            size += chunk.len() as u64;
        }

        wtr.flush()
            .await
            .context("Failed to flush downloaded file")?;

        let checksum = file_checksum(destination)
            .await
            .context("Failed to compute checksum of downloaded file")?;

        Ok(DownloadResult {
            success: true,
            size: Some(size),
            checksum: Some(checksum),
            content_type: (!content_type.is_empty()).then_some(content_type),
            error: None,
            status: Some(stat.as_u16()),
        })
    }
}

pub async fn file_checksum(path: &Path) -> Res<String> {
    let mut file = File::open(path).await?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; 64 * 1024];

    loop {
        let read = file.read(&mut buf).await?;
        if read == 0 {
            break;
        }
        hasher.update(&buf[..read]);
    }

    Ok(hex::encode(hasher.finalize()))
}

/// `<12 hex chars of the URL hash>_<last path segment>`, restricted to filesystem-safe characters.
pub fn resource_filename(url: &str) -> String {
    let hash = page_hash(url);

    let segment = url
        .split(['?', '#'])
        .next()
        .unwrap_or_default()
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or_default();

    let name: String = segment
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();

    if name.is_empty() || name.contains("..") {
        hash[..12].to_owned()
    } else {
        format!("{}_{}", &hash[..12], name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceIndexEntry {
    pub url: String,
    #[serde(rename = "type")]
    pub resource_type: ResourceType,
    pub source_pages: Vec<String>,
    pub filename: Option<String>,
    pub download_result: Option<DownloadResult>,
}

/// Per-URL view of every discovered resource, with the pages that referenced it.
#[derive(Debug, Default)]
pub struct ResourceIndex {
    entries: Vec<ResourceIndexEntry>,
    positions: HashMap<String, usize>,
}

impl ResourceIndex {
    pub fn new() -> Self {
        ResourceIndex::default()
    }

    pub fn note_source(&mut self, url: &str, kind: ResourceType, page: &str) {
        let entry = self.entry(url, kind);

        if !entry.source_pages.iter().any(|p| p == page) {
            entry.source_pages.push(page.to_owned());
        }
    }

    pub fn record_download(&mut self, url: &str, kind: ResourceType, filename: String, result: DownloadResult) {
        let entry = self.entry(url, kind);
        entry.filename = Some(filename);
        entry.download_result = Some(result);
    }

    pub fn get(&self, url: &str) -> Option<&ResourceIndexEntry> {
        self.positions.get(url).map(|i| &self.entries[*i])
    }

    pub fn entries(&self) -> &[ResourceIndexEntry] {
        &self.entries
    }

    fn entry(&mut self, url: &str, kind: ResourceType) -> &mut ResourceIndexEntry {
        let idx = match self.positions.get(url) {
            Some(idx) => *idx,
            None => {
                self.entries.push(ResourceIndexEntry {
                    url: url.to_owned(),
                    resource_type: kind,
                    source_pages: Vec::new(),
                    filename: None,
                    download_result: None,
                });
                self.positions.insert(url.to_owned(), self.entries.len() - 1);
                self.entries.len() - 1
            }
        };

        &mut self.entries[idx]
    }
}
