use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::{
    classify::{MediaType, ResourceType},
    records::{PageRecord, ResourceRecord},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Bucket {
    HtmlPages,
    Youtube,
    Vimeo,
    DirectVideo,
    Pdf,
    Image,
    Other,
}

impl Bucket {
    pub fn for_media(kind: MediaType) -> Bucket {
        match kind {
            MediaType::Youtube => Bucket::Youtube,
            MediaType::Vimeo => Bucket::Vimeo,
            MediaType::Video => Bucket::DirectVideo,
            MediaType::Pdf => Bucket::Pdf,
            MediaType::Image => Bucket::Image,
            MediaType::Document | MediaType::Html | MediaType::Other => Bucket::Other,
        }
    }

    pub fn for_resource(kind: ResourceType) -> Bucket {
        match kind {
            ResourceType::Video => Bucket::DirectVideo,
            ResourceType::Pdf => Bucket::Pdf,
            ResourceType::Image => Bucket::Image,
            ResourceType::Html | ResourceType::Document | ResourceType::Other => Bucket::Other,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageEntry {
    pub url: String,
    pub title: Option<String>,
    pub content_type: String,
    pub timestamp: String,
    pub depth: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceEntry {
    pub url: String,
    pub parent_page: String,
    pub media_type: MediaType,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Videos {
    pub youtube: Vec<ResourceEntry>,
    pub vimeo: Vec<ResourceEntry>,
    pub direct: Vec<ResourceEntry>,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    pub html_pages: usize,
    pub youtube: usize,
    pub vimeo: usize,
    pub direct_videos: usize,
    pub pdfs: usize,
    pub images: usize,
    pub other_resources: usize,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SitemapDocument {
    pub html_pages: Vec<PageEntry>,
    pub videos: Videos,
    pub pdfs: Vec<ResourceEntry>,
    pub images: Vec<ResourceEntry>,
    pub other_resources: Vec<ResourceEntry>,
    pub summary: Summary,
}

impl SitemapDocument {
    fn bucket_mut(&mut self, bucket: Bucket) -> Option<&mut Vec<ResourceEntry>> {
        match bucket {
            Bucket::HtmlPages => None,
            Bucket::Youtube => Some(&mut self.videos.youtube),
            Bucket::Vimeo => Some(&mut self.videos.vimeo),
            Bucket::DirectVideo => Some(&mut self.videos.direct),
            Bucket::Pdf => Some(&mut self.pdfs),
            Bucket::Image => Some(&mut self.images),
            Bucket::Other => Some(&mut self.other_resources),
        }
    }

    pub fn len(&self, bucket: Bucket) -> usize {
        match bucket {
            Bucket::HtmlPages => self.html_pages.len(),
            Bucket::Youtube => self.videos.youtube.len(),
            Bucket::Vimeo => self.videos.vimeo.len(),
            Bucket::DirectVideo => self.videos.direct.len(),
            Bucket::Pdf => self.pdfs.len(),
            Bucket::Image => self.images.len(),
            Bucket::Other => self.other_resources.len(),
        }
    }

    fn count(&self) -> Summary {
        Summary {
            html_pages: self.len(Bucket::HtmlPages),
            youtube: self.len(Bucket::Youtube),
            vimeo: self.len(Bucket::Vimeo),
            direct_videos: self.len(Bucket::DirectVideo),
            pdfs: self.len(Bucket::Pdf),
            images: self.len(Bucket::Image),
            other_resources: self.len(Bucket::Other),
        }
    }
}

/// Accumulates page and resource records into sitemap buckets.
///
/// Media embedded in a page are bucketed when the page is recorded, downloaded resources
/// when they arrive. The same URL can therefore land in a bucket twice; with `dedup` on,
/// each URL is kept at most once per bucket.
#[derive(Debug, Default)]
pub struct Aggregator {
    document: SitemapDocument,
    dedup: bool,
    seen: HashSet<(Bucket, String)>,
}

impl Aggregator {
    pub fn new(dedup: bool) -> Self {
        Aggregator {
            dedup,
            ..Aggregator::default()
        }
    }

    pub fn record_page(&mut self, page: &PageRecord) {
        if self.admit(Bucket::HtmlPages, &page.url) {
            self.document.html_pages.push(PageEntry {
                url: page.url.clone(),
                title: page.title.clone(),
                content_type: page.content_type.clone(),
                timestamp: page.timestamp.clone(),
                depth: page.depth,
            });
        }

        for (url, kind) in &page.media {
            self.push(Bucket::for_media(*kind), url, &page.url, *kind);
        }
    }

    pub fn record_resource(&mut self, resource: &ResourceRecord) {
        self.push(
            Bucket::for_resource(resource.resource_type),
            &resource.url,
            &resource.parent_page,
            resource.resource_type.into(),
        );
    }

    pub fn summary(&self) -> Summary {
        self.document.count()
    }

    pub fn len(&self, bucket: Bucket) -> usize {
        self.document.len(bucket)
    }

    /// Consumes the aggregator, so a session can produce its sitemap only once.
    pub fn finalize(self) -> SitemapDocument {
        let mut document = self.document;
        document.summary = document.count();
        document
    }

    fn push(&mut self, bucket: Bucket, url: &str, parent_page: &str, media_type: MediaType) {
        if !self.admit(bucket, url) {
            return;
        }

        if let Some(entries) = self.document.bucket_mut(bucket) {
            entries.push(ResourceEntry {
                url: url.to_owned(),
                parent_page: parent_page.to_owned(),
                media_type,
            });
        }
    }

    fn admit(&mut self, bucket: Bucket, url: &str) -> bool {
        !self.dedup || self.seen.insert((bucket, url.to_owned()))
    }
}
