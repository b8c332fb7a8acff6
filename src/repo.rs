use std::collections::{HashMap, VecDeque};

use crate::{
    classify::ResourceType,
    error::{Res, ResErr},
};

/// One unit of frontier work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CrawlTask {
    Page {
        url: String,
        depth: u32,
        parent: Option<String>,
    },
    Resource {
        url: String,
        resource_type: ResourceType,
        parent: String,
    },
}

impl CrawlTask {
    pub fn url(&self) -> &str {
        match self {
            CrawlTask::Page { url, .. } | CrawlTask::Resource { url, .. } => url,
        }
    }
}

/// Lifecycle of a URL inside one session. A URL that is absent has never been seen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UrlState {
    Queued,
    Fetched,
    /// Resource recorded in the sitemap without being downloaded.
    Recorded,
    Failed,
}

#[allow(async_fn_in_trait)]
pub trait UrlRepo {
    /// Queues `task` unless its URL was seen before. Returns whether it was queued.
    async fn add(&mut self, task: CrawlTask) -> Res<bool>;

    async fn pop(&mut self) -> Res<Option<CrawlTask>>;

    /// Moves a queued URL to its terminal state.
    async fn settle(&mut self, url: &str, state: UrlState) -> Res<()>;

    fn state(&self, url: &str) -> Option<UrlState>;

    fn is_visited(&self, url: &str) -> bool {
        self.state(url).is_some()
    }
}

/// FIFO frontier plus the visited set, owned by a single crawl session.
#[derive(Debug, Default)]
pub struct InMemoryRepo {
    urls: VecDeque<CrawlTask>,
    visited: HashMap<String, UrlState>,
}

impl InMemoryRepo {
    pub fn new() -> Self {
        InMemoryRepo::default()
    }

    pub fn pending(&self) -> usize {
        self.urls.len()
    }

    pub fn count(&self, state: UrlState) -> usize {
        self.visited.values().filter(|s| **s == state).count()
    }
}

impl UrlRepo for InMemoryRepo {
    async fn add(&mut self, task: CrawlTask) -> Res<bool> {
        if task.url().is_empty() || self.visited.contains_key(task.url()) {
            return Ok(false);
        }

        self.visited.insert(task.url().to_owned(), UrlState::Queued);
        self.urls.push_back(task);

        Ok(true)
    }

    async fn pop(&mut self) -> Res<Option<CrawlTask>> {
        Ok(self.urls.pop_front())
    }

    async fn settle(&mut self, url: &str, state: UrlState) -> Res<()> {
        let Some(current) = self.visited.get_mut(url) else {
            return Err(ResErr::new(
                "Failed to settle URL",
                format!("URL was never queued: {}", url),
            ));
        };

        if *current != UrlState::Queued {
            return Err(ResErr::new(
                "Failed to settle URL",
                format!("URL already settled as {:?}: {}", current, url),
            ));
        }

        *current = state;

        Ok(())
    }

    fn state(&self, url: &str) -> Option<UrlState> {
        self.visited.get(url).copied()
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        classify::ResourceType,
        error::{Res, ResExt},
        repo::{CrawlTask, InMemoryRepo, UrlRepo, UrlState},
    };

    fn page(url: &str, depth: u32) -> CrawlTask {
        CrawlTask::Page {
            url: url.to_owned(),
            depth,
            parent: None,
        }
    }

    #[tokio::test]
    async fn test_inmemoryrepo_fifo() -> Res<()> {
        let mut repo = InMemoryRepo::new();

        for i in 0..50 {
            repo.add(page(&format!("https://example.com/index{}.html", i), 0))
                .await
                .context("Failed to add URL to repo")?;
        }

        let mut popped = Vec::new();
        while let Some(task) = repo.pop().await.context("Failed to pop URL from repo")? {
            popped.push(task.url().to_owned());
        }

        assert_eq!(popped.len(), 50);
        assert_eq!(popped[0], "https://example.com/index0.html");
        assert_eq!(popped[49], "https://example.com/index49.html");

        Ok(())
    }

    #[tokio::test]
    async fn test_inmemoryrepo_at_most_once() -> Res<()> {
        let mut repo = InMemoryRepo::new();

        assert!(repo.add(page("https://example.com/", 0)).await?);
        assert!(!repo.add(page("https://example.com/", 1)).await?);
        assert!(
            !repo
                .add(CrawlTask::Resource {
                    url: String::from("https://example.com/"),
                    resource_type: ResourceType::Pdf,
                    parent: String::from("https://example.com/a"),
                })
                .await?
        );
        assert!(!repo.add(page("", 0)).await?);

        let task = repo.pop().await?;
        assert_eq!(task, Some(page("https://example.com/", 0)));
        assert_eq!(repo.pop().await?, None);

        repo.settle("https://example.com/", UrlState::Fetched).await?;

        // settled URLs never come back
        assert!(!repo.add(page("https://example.com/", 0)).await?);
        assert_eq!(repo.pending(), 0);

        Ok(())
    }

    #[tokio::test]
    async fn test_inmemoryrepo_settle_transitions() -> Res<()> {
        let mut repo = InMemoryRepo::new();

        repo.add(page("https://example.com/a", 0)).await?;
        repo.add(page("https://example.com/b", 0)).await?;

        repo.settle("https://example.com/a", UrlState::Failed).await?;
        assert_eq!(repo.state("https://example.com/a"), Some(UrlState::Failed));
        assert!(repo.settle("https://example.com/a", UrlState::Fetched).await.is_err());
        assert!(repo.settle("https://example.com/c", UrlState::Fetched).await.is_err());

        assert_eq!(repo.count(UrlState::Queued), 1);
        assert_eq!(repo.count(UrlState::Failed), 1);
        assert!(repo.is_visited("https://example.com/b"));
        assert!(!repo.is_visited("https://example.com/c"));

        Ok(())
    }
}
