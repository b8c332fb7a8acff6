use owo_colors::OwoColorize;
use url::Url;

use crate::{
    classify::{ResourceType, classify, path_extension},
    config::CrawlConfig,
    download::{Downloader, ResourceIndex},
    error::{Log, Res, ResExt},
    extract::{Extractor, ParsedPage},
    fetch::{AllowedDomains, SweepClient, fetch_page},
    match_option,
    output::{RESOURCE_INDEX_FILE, SITEMAP_FILE, write_json, write_page_html},
    records::{PageRecord, ResourceRecord, timestamp_now},
    repo::{CrawlTask, InMemoryRepo, UrlRepo, UrlState},
    sitemap::{Aggregator, SitemapDocument},
};

/// Extensions never followed as pages.
const SKIP_EXTENSIONS: [&str; 6] = ["css", "js", "ico", "zip", "tar", "gz"];

/// Whether a discovered link may become a page fetch: http(s), allowed host, not a
/// skipped asset, and not a file resource (those go through resource scheduling).
pub fn should_crawl(allowed: &AllowedDomains, link: &Url) -> bool {
    if !matches!(link.scheme(), "http" | "https") {
        return false;
    }

    if !allowed.permits(link) {
        return false;
    }

    if let Some(ext) = path_extension(link.as_str())
        && SKIP_EXTENSIONS.contains(&ext.as_str())
    {
        return false;
    }

    classify(link.as_str()) == ResourceType::Html
}

#[derive(Debug)]
pub struct CrawlReport {
    pub sitemap: SitemapDocument,
    pub pages_fetched: usize,
    pub pages_failed: usize,
    pub resources_downloaded: usize,
    pub resources_failed: usize,
    pub resources_recorded: usize,
    /// Tasks still queued when the page ceiling stopped the crawl.
    pub abandoned: usize,
}

/// Everything one crawl run owns: frontier, visited set, aggregator and downloader.
///
/// Sessions share nothing, so several can run in one process.
pub struct CrawlSession {
    config: CrawlConfig,
    client: SweepClient,
    allowed: AllowedDomains,
    extractor: Extractor,
    repo: InMemoryRepo,
    aggregator: Aggregator,
    downloader: Downloader,
    index: ResourceIndex,
    pages_fetched: usize,
}

impl CrawlSession {
    pub fn new(config: CrawlConfig) -> Res<Self> {
        config.validate()?;

        let allowed = config.allowed();
        let client = SweepClient::new(
            &config.user_agent,
            config.timeout(),
            config.politeness(),
            &allowed,
        )?;

        Ok(CrawlSession {
            allowed,
            extractor: Extractor::new()?,
            repo: InMemoryRepo::new(),
            aggregator: Aggregator::new(config.dedup),
            downloader: Downloader::new(&config.output_dir, config.retry_policy()),
            index: ResourceIndex::new(),
            pages_fetched: 0,
            client,
            config,
        })
    }

    /// Crawls until the frontier is empty or the page ceiling is hit, then writes the
    /// sitemap (exactly once) and the resource index.
    pub async fn run(mut self) -> Res<CrawlReport> {
        for seed in self.config.seed_urls() {
            let url = match_option!(
                Url::parse(&seed)
                    .with_context(format_args!(
                        "Failed to parse seed URL: {}",
                        seed.bright_blue().italic()
                    ))
                    .log("[WARN]")
                    .await?
            );

            if !self.allowed.permits(&url) {
                format!(
                    "Seed URL is outside the allowed domains, skipping: {}",
                    seed.bright_blue().italic()
                )
                .log("[WARN]")
                .await?;
                continue;
            }

            self.repo
                .add(CrawlTask::Page {
                    url: seed,
                    depth: 0,
                    parent: None,
                })
                .await?;
        }

        while let Some(task) = self.repo.pop().await? {
            match task {
                CrawlTask::Page { url, depth, parent } => {
                    if self.pages_fetched >= self.config.max_pages {
                        if self.config.verbose {
                            format!(
                                "Page ceiling of {} reached, abandoning {} queued URLs",
                                self.config.max_pages,
                                self.repo.pending() + 1
                            )
                            .log("[INFO]")
                            .await?;
                        }
                        break;
                    }

                    self.pages_fetched += 1;
                    self.crawl_page(url, depth, parent).await?;
                }

                CrawlTask::Resource {
                    url,
                    resource_type,
                    parent,
                } => {
                    self.process_resource(url, resource_type, parent).await?;
                }
            }
        }

        self.finish().await
    }

    async fn crawl_page(&mut self, url: String, depth: u32, parent: Option<String>) -> Res<()> {
        if self.config.verbose {
            format!(
                "Sent request to URL (depth {}): {}",
                depth,
                url.bright_blue().italic()
            )
            .log("[INFO]")
            .await?;
        }

        let fetched = fetch_page(&self.client, &self.allowed, &url)
            .await
            .log("[WARN]")
            .await?;

        let Some(fetched) = fetched else {
            return self.repo.settle(&url, UrlState::Failed).await;
        };

        self.repo.settle(&url, UrlState::Fetched).await?;

        let parsed = if fetched.is_html() {
            self.extractor.parse(&fetched.body, &fetched.url)
        } else {
            format!(
                "Skipping extraction of non-HTML content ({}) at URL: {}",
                fetched.content_type().yellow(),
                url.bright_blue().italic()
            )
            .log("[WARN]")
            .await?;

            ParsedPage::default()
        };

        let record = PageRecord {
            content_type: fetched.content_type(),
            status: fetched.status,
            title: parsed.title,
            text: parsed.text,
            links: parsed.extraction.links,
            media: parsed.extraction.media,
            resources: parsed.extraction.resources,
            html: fetched.body,
            timestamp: timestamp_now()?,
            url,
            depth,
            parent,
        };

        self.aggregator.record_page(&record);

        if self.config.save_html {
            write_page_html(&self.config.output_dir, &record.url, &record.html)
                .await
                .log("[WARN]")
                .await?;
        }

        self.discover(&record).await
    }

    /// Queues the page's unseen in-domain links one level deeper, and its file resources.
    async fn discover(&mut self, page: &PageRecord) -> Res<()> {
        if page.depth < self.config.max_depth {
            for link in &page.links {
                let Ok(parsed) = Url::parse(link) else {
                    continue;
                };

                if self.repo.is_visited(link) || !should_crawl(&self.allowed, &parsed) {
                    continue;
                }

                self.repo
                    .add(CrawlTask::Page {
                        url: link.clone(),
                        depth: page.depth + 1,
                        parent: Some(page.url.clone()),
                    })
                    .await?;
            }
        }

        let media_files = page
            .media
            .iter()
            .filter_map(|(url, kind)| kind.resource_type().map(|t| (url, t)));

        let resources = page.resources.iter().map(|(url, kind)| (url, *kind));

        for (url, kind) in resources.chain(media_files) {
            let Ok(parsed) = Url::parse(url) else {
                continue;
            };

            if !matches!(parsed.scheme(), "http" | "https") {
                continue;
            }

            self.index.note_source(url, kind, &page.url);

            self.repo
                .add(CrawlTask::Resource {
                    url: url.clone(),
                    resource_type: kind,
                    parent: page.url.clone(),
                })
                .await?;
        }

        Ok(())
    }

    async fn process_resource(&mut self, url: String, kind: ResourceType, parent: String) -> Res<()> {
        if !self.config.download_types.contains(&kind) {
            let record = ResourceRecord {
                url,
                resource_type: kind,
                content_type: None,
                size: None,
                status: None,
                parent_page: parent,
                timestamp: timestamp_now()?,
            };

            self.aggregator.record_resource(&record);
            return self.repo.settle(&record.url, UrlState::Recorded).await;
        }

        if self.config.verbose {
            format!(
                "Downloading {} resource: {}",
                kind.yellow(),
                url.bright_blue().italic()
            )
            .log("[INFO]")
            .await?;
        }

        let destination = self.downloader.destination(&url, kind);
        let result = self
            .downloader
            .download(&self.client, &url, &destination)
            .await;

        let filename = destination
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        self.index
            .record_download(&url, kind, filename, result.clone());

        if !result.success {
            format!(
                "Giving up on resource after {} attempts: {}",
                self.downloader.policy().max_retries.max(1),
                url.bright_blue().italic()
            )
            .log("[WARN]")
            .await?;

            return self.repo.settle(&url, UrlState::Failed).await;
        }

        let record = ResourceRecord {
            url,
            resource_type: kind,
            content_type: result.content_type,
            size: result.size,
            status: result.status,
            parent_page: parent,
            timestamp: timestamp_now()?,
        };

        self.aggregator.record_resource(&record);
        self.repo.settle(&record.url, UrlState::Fetched).await
    }

    async fn finish(self) -> Res<CrawlReport> {
        let abandoned = self.repo.count(UrlState::Queued);
        let output_dir = self.config.output_dir.clone();

        let pages_failed = self
            .repo
            .count(UrlState::Failed)
            .saturating_sub(self.failed_downloads());
        let resources_failed = self.failed_downloads();
        let resources_downloaded = self
            .index
            .entries()
            .iter()
            .filter(|e| e.download_result.as_ref().is_some_and(|r| r.success))
            .count();
        let resources_recorded = self.repo.count(UrlState::Recorded);

        write_json(&output_dir.join(RESOURCE_INDEX_FILE), self.index.entries())
            .await
            .log("[WARN]")
            .await?;

        let sitemap = self.aggregator.finalize();

        write_json(&output_dir.join(SITEMAP_FILE), &sitemap)
            .await
            .context("Failed to write sitemap")?;

        Ok(CrawlReport {
            sitemap,
            pages_fetched: self.pages_fetched,
            pages_failed,
            resources_downloaded,
            resources_failed,
            resources_recorded,
            abandoned,
        })
    }

    fn failed_downloads(&self) -> usize {
        self.index
            .entries()
            .iter()
            .filter(|e| e.download_result.as_ref().is_some_and(|r| !r.success))
            .count()
    }
}
