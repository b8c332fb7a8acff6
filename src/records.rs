use time::{OffsetDateTime, format_description::well_known::Rfc3339};

use crate::{
    classify::{MediaType, ResourceType},
    error::{Res, ResExt},
};

/// One fetched HTML document. Built once, never mutated.
#[derive(Debug, Clone, PartialEq)]
pub struct PageRecord {
    pub url: String,
    pub title: Option<String>,
    pub content_type: String,
    pub status: u16,
    pub html: String,
    pub text: String,
    pub links: Vec<String>,
    pub media: Vec<(String, MediaType)>,
    pub resources: Vec<(String, ResourceType)>,
    pub timestamp: String,
    pub depth: u32,
    pub parent: Option<String>,
}

/// One non-HTML asset. `status`, `size` and `content_type` are absent when the type was
/// recorded without being downloaded.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceRecord {
    pub url: String,
    pub resource_type: ResourceType,
    pub content_type: Option<String>,
    pub size: Option<u64>,
    pub status: Option<u16>,
    pub parent_page: String,
    pub timestamp: String,
}

pub fn timestamp_now() -> Res<String> {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .map_err(|_| String::from("Format Failure"))
        .context("Failed to format record timestamp")
}
