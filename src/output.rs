use std::path::{Path, PathBuf};

use owo_colors::OwoColorize;
use serde::Serialize;
use sha2::{Digest, Sha256};
use tokio::{
    fs::{self, File, OpenOptions},
    io::{AsyncWriteExt, BufWriter},
};

use crate::error::{Res, ResExt};

pub const SITEMAP_FILE: &str = "sitemap.json";
pub const RESOURCE_INDEX_FILE: &str = "resource_index.json";
pub const PAGES_DIR: &str = "pages";
pub const RESOURCES_DIR: &str = "resources";

/// Hex SHA-256 of the URL's UTF-8 bytes; names the raw HTML file of a page.
pub fn page_hash(url: &str) -> String {
    hex::encode(Sha256::digest(url.as_bytes()))
}

pub fn page_html_path(output_dir: &Path, url: &str) -> PathBuf {
    output_dir
        .join(PAGES_DIR)
        .join(format!("{}.html", page_hash(url)))
}

async fn create_file(path: &Path) -> Res<BufWriter<File>> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await.with_context(format_args!(
            "Failed to create directory: {}",
            parent.to_string_lossy().red().bold()
        ))?;
    }

    let file = OpenOptions::new()
        .write(true)
        .truncate(true)
        .create(true)
        .open(path)
        .await
        .with_context(format_args!(
            "Failed to open output file: {}",
            path.to_string_lossy().red().bold()
        ))?;

    Ok(BufWriter::with_capacity(8192, file))
}

pub async fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Res<()> {
    let bytes = serde_json::to_vec_pretty(value).context("Failed to serialize JSON output")?;

    let mut wtr = create_file(path).await?;

    wtr.write_all(&bytes).await?;
    wtr.write_all(b"\n").await?;

    wtr.flush()
        .await
        .context("Failed to flush writer into output file")
}

pub async fn write_page_html(output_dir: &Path, url: &str, html: &str) -> Res<PathBuf> {
    let path = page_html_path(output_dir, url);

    let mut wtr = create_file(&path).await?;

    wtr.write_all(html.as_bytes()).await?;

    wtr.flush().await.with_context(format_args!(
        "Failed to write raw HTML for URL: {}",
        url.bright_blue().italic()
    ))?;

    Ok(path)
}
