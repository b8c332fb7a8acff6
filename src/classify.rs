use std::{fmt, sync::LazyLock};

use regex::Regex;
use serde::{Deserialize, Serialize};
use url::Url;

/// What a URL points at, judged from its path extension alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ResourceType {
    Html,
    Image,
    Video,
    Pdf,
    Document,
    Other,
}

impl ResourceType {
    pub fn as_str(self) -> &'static str {
        match self {
            ResourceType::Html => "html",
            ResourceType::Image => "image",
            ResourceType::Video => "video",
            ResourceType::Pdf => "pdf",
            ResourceType::Document => "document",
            ResourceType::Other => "other",
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Platform {
    Youtube,
    Vimeo,
}

/// Tag attached to media found inside a page. Hosting platforms win over extensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Youtube,
    Vimeo,
    Video,
    Image,
    Pdf,
    Document,
    Html,
    Other,
}

impl MediaType {
    /// The downloadable file type behind this tag, if any.
    pub fn resource_type(self) -> Option<ResourceType> {
        match self {
            MediaType::Youtube | MediaType::Vimeo | MediaType::Html => None,
            MediaType::Video => Some(ResourceType::Video),
            MediaType::Image => Some(ResourceType::Image),
            MediaType::Pdf => Some(ResourceType::Pdf),
            MediaType::Document => Some(ResourceType::Document),
            MediaType::Other => Some(ResourceType::Other),
        }
    }
}

impl From<ResourceType> for MediaType {
    fn from(value: ResourceType) -> Self {
        match value {
            ResourceType::Html => MediaType::Html,
            ResourceType::Image => MediaType::Image,
            ResourceType::Video => MediaType::Video,
            ResourceType::Pdf => MediaType::Pdf,
            ResourceType::Document => MediaType::Document,
            ResourceType::Other => MediaType::Other,
        }
    }
}

impl From<Platform> for MediaType {
    fn from(value: Platform) -> Self {
        match value {
            Platform::Youtube => MediaType::Youtube,
            Platform::Vimeo => MediaType::Vimeo,
        }
    }
}

const EXTENSIONS: [(&str, ResourceType); 28] = [
    ("jpg", ResourceType::Image),
    ("jpeg", ResourceType::Image),
    ("png", ResourceType::Image),
    ("gif", ResourceType::Image),
    ("svg", ResourceType::Image),
    ("webp", ResourceType::Image),
    ("ico", ResourceType::Image),
    ("mp4", ResourceType::Video),
    ("webm", ResourceType::Video),
    ("ogg", ResourceType::Video),
    ("avi", ResourceType::Video),
    ("mov", ResourceType::Video),
    ("m4v", ResourceType::Video),
    ("pdf", ResourceType::Pdf),
    ("doc", ResourceType::Document),
    ("docx", ResourceType::Document),
    ("xls", ResourceType::Document),
    ("xlsx", ResourceType::Document),
    ("ppt", ResourceType::Document),
    ("pptx", ResourceType::Document),
    ("zip", ResourceType::Other),
    ("rar", ResourceType::Other),
    ("tar", ResourceType::Other),
    ("gz", ResourceType::Other),
    ("css", ResourceType::Other),
    ("js", ResourceType::Other),
    ("json", ResourceType::Other),
    ("xml", ResourceType::Other),
];

static YOUTUBE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:youtube\.com/watch\?v=|youtu\.be/|/embed/)([A-Za-z0-9_-]{11})")
        .expect("hardcoded regex pattern is valid")
});

static VIMEO_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:player\.vimeo\.com/video/|vimeo\.com/)(\d+)")
        .expect("hardcoded regex pattern is valid")
});

/// Resolves `raw_href` against `base_url` into an absolute URL without its fragment.
///
/// Handles protocol-relative (`//host/x`), root-relative (`/x`) and relative (`x`) forms.
/// Input that cannot be resolved comes back trimmed but otherwise unchanged, so callers
/// must still treat the result as untrusted.
pub fn normalize(raw_href: &str, base_url: &str) -> String {
    let href = raw_href.trim();

    let resolved = match Url::parse(base_url) {
        Ok(base) => base.join(href),
        Err(_) => Url::parse(href),
    };

    match resolved {
        Ok(mut url) => {
            url.set_fragment(None);
            url.to_string()
        }
        Err(_) => href.to_owned(),
    }
}

/// Lowercased extension of the last path segment, query and fragment excluded.
pub fn path_extension(url: &str) -> Option<String> {
    let path = match Url::parse(url) {
        Ok(parsed) => parsed.path().to_owned(),
        Err(_) => url.split(['?', '#']).next().unwrap_or_default().to_owned(),
    };

    let file = path.rsplit('/').next().unwrap_or_default();

    match file.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => Some(ext.to_ascii_lowercase()),
        _ => None,
    }
}

pub fn classify(url: &str) -> ResourceType {
    let Some(ext) = path_extension(url) else {
        return ResourceType::Html;
    };

    EXTENSIONS
        .iter()
        .find(|(known, _)| *known == ext)
        .map(|(_, kind)| *kind)
        .unwrap_or(ResourceType::Html)
}

pub fn detect_platform(url: &str) -> Option<Platform> {
    video_key(url).map(|(platform, _)| platform)
}

/// Platform and id of the first video reference in `text`.
pub fn video_key(text: &str) -> Option<(Platform, String)> {
    if let Some(caps) = YOUTUBE_PATTERN.captures(text) {
        return Some((Platform::Youtube, caps[1].to_owned()));
    }

    VIMEO_PATTERN
        .captures(text)
        .map(|caps| (Platform::Vimeo, caps[1].to_owned()))
}

pub fn media_type(url: &str) -> MediaType {
    match detect_platform(url) {
        Some(platform) => platform.into(),
        None => classify(url).into(),
    }
}

/// Every youtube/vimeo reference in free text, as canonical watch URLs, first occurrence only.
pub fn embedded_videos(text: &str) -> Vec<(String, Platform, String)> {
    let youtube = YOUTUBE_PATTERN
        .captures_iter(text)
        .map(|caps| (Platform::Youtube, caps[1].to_owned()));

    let vimeo = VIMEO_PATTERN
        .captures_iter(text)
        .map(|caps| (Platform::Vimeo, caps[1].to_owned()));

    let mut found: Vec<(String, Platform, String)> = Vec::new();

    for (platform, id) in youtube.chain(vimeo) {
        if found.iter().any(|(_, p, known)| *p == platform && *known == id) {
            continue;
        }

        found.push((canonical_video_url(platform, &id), platform, id));
    }

    found
}

fn canonical_video_url(platform: Platform, id: &str) -> String {
    match platform {
        Platform::Youtube => format!("https://www.youtube.com/watch?v={}", id),
        Platform::Vimeo => format!("https://vimeo.com/{}", id),
    }
}
