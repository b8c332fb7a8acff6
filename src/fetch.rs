use std::time::Duration;

use owo_colors::OwoColorize;
use reqwest::{
    Client, Response, StatusCode,
    header::{CONTENT_TYPE, HeaderMap},
    redirect::Policy,
};
use url::Url;

use crate::error::{Res, ResErr, ResExt};

const TOO_MANY_REQUESTS_PAUSE: Duration = Duration::from_millis(2500);
const MAX_REDIRECTS: usize = 10;

/// Pause taken before every request: a fixed base plus a uniformly random jitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Politeness {
    pub delay: Duration,
    pub jitter: Duration,
}

impl Politeness {
    pub fn none() -> Self {
        Politeness {
            delay: Duration::ZERO,
            jitter: Duration::ZERO,
        }
    }

    pub fn next_pause(&self) -> Duration {
        if self.jitter.is_zero() {
            return self.delay;
        }

        let jitter_ms = self.jitter.as_millis() as u64;
        self.delay + Duration::from_millis(rand::random_range(0..=jitter_ms))
    }

    pub async fn wait(&self) {
        let pause = self.next_pause();

        if !pause.is_zero() {
            tokio::time::sleep(pause).await;
        }
    }
}

/// HTTP clients shared by the page fetcher and the downloader.
///
/// Pages go through a client whose redirects never leave the allowed domains; resource
/// downloads may be redirected anywhere. Both apply the politeness delay, so the whole
/// session issues one paced request stream.
#[derive(Debug)]
pub struct SweepClient {
    pages: Client,
    files: Client,
    politeness: Politeness,
}

impl SweepClient {
    pub fn new(
        user_agent: &str,
        timeout: Duration,
        politeness: Politeness,
        allowed: &AllowedDomains,
    ) -> Res<Self> {
        let allowed = allowed.clone();

        let pages = Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .redirect(Policy::custom(move |attempt| {
                if attempt.previous().len() >= MAX_REDIRECTS {
                    attempt.error("too many redirects")
                } else if allowed.permits(attempt.url()) {
                    attempt.follow()
                } else {
                    let refused = format!(
                        "redirect to host outside the allowed domains: {}",
                        attempt.url().host_str().unwrap_or_default()
                    );
                    attempt.error(refused)
                }
            }))
            .build()
            .context("Failed to build page client")?;

        let files = Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .redirect(Policy::limited(MAX_REDIRECTS))
            .build()
            .context("Failed to build download client")?;

        Ok(SweepClient {
            pages,
            files,
            politeness,
        })
    }

    /// Requests a page. Redirects out of the allowed domains fail the request.
    pub async fn get_page(&self, url: &str) -> Res<Response> {
        self.send(&self.pages, url).await
    }

    /// Requests a resource file.
    pub async fn get(&self, url: &str) -> Res<Response> {
        self.send(&self.files, url).await
    }

    async fn send(&self, client: &Client, url: &str) -> Res<Response> {
        self.politeness.wait().await;

        client
            .get(url)
            .send()
            .await
            .with_context(format_args!(
                "Failed to send request to URL: {}",
                url.bright_blue().italic()
            ))
    }

    pub async fn pause(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Hosts a crawl may visit. A listed domain also admits its subdomains.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllowedDomains {
    domains: Vec<String>,
}

impl AllowedDomains {
    pub fn new<I, S>(domains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        AllowedDomains {
            domains: domains
                .into_iter()
                .map(|d| d.as_ref().trim().trim_start_matches('.').to_lowercase())
                .filter(|d| !d.is_empty())
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.domains.is_empty()
    }

    pub fn permits(&self, url: &Url) -> bool {
        let Some(host) = url.host_str() else {
            return false;
        };
        let host = host.to_lowercase();

        self.domains
            .iter()
            .any(|d| host == *d || host.ends_with(&format!(".{}", d)))
    }
}

#[derive(Debug)]
pub struct FetchResult {
    /// Where the body came from, after redirects.
    pub url: String,
    pub status: u16,
    pub headers: HeaderMap,
    pub body: String,
}

impl FetchResult {
    pub fn content_type(&self) -> String {
        content_type_of(&self.headers)
    }

    /// Missing content types are treated as HTML.
    pub fn is_html(&self) -> bool {
        let content_type = self.content_type().to_ascii_lowercase();
        content_type.is_empty() || content_type.contains("html")
    }
}

pub fn content_type_of(headers: &HeaderMap) -> String {
    headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_owned()
}

/// Fetches one page. Never retries: a failed page is logged by the caller and skipped.
pub async fn fetch_page(client: &SweepClient, allowed: &AllowedDomains, url: &str) -> Res<FetchResult> {
    let parsed = Url::parse(url).with_context(format_args!(
        "Failed to parse URL: {}",
        url.bright_blue().italic()
    ))?;

    if !allowed.permits(&parsed) {
        return Err(ResErr::new(
            "Refused to fetch URL outside the allowed domains",
            format!("Host not allowed: {}", parsed.host_str().unwrap_or_default()),
        ));
    }

    let res = client.get_page(url).await?;
    let stat = res.status();

    if !allowed.permits(res.url()) {
        return Err(ResErr::new(
            "Refused to read page served from outside the allowed domains",
            format!("Host not allowed: {}", res.url().host_str().unwrap_or_default()),
        ));
    }

    if !stat.is_success() {
        if let StatusCode::TOO_MANY_REQUESTS = stat {
            client.pause(TOO_MANY_REQUESTS_PAUSE).await;
            res.error_for_status_ref()
                .with_context(format_args!(
                    "Failed to fetch URL: {}",
                    url.bright_blue().italic()
                ))
                .with_context(format_args!(
                    "Server returned {} response, status code: {}",
                    "`TOO_MANY_REQUESTS`".yellow(),
                    "429".red().bold()
                ))
                .context(
                    "Waited for 2.5 second timeout to avoid more bad responses and IP bans",
                )?;
        } else {
            res.error_for_status_ref()
                .with_context(format_args!(
                    "Failed to fetch URL: {}",
                    url.bright_blue().italic()
                ))
                .with_context(format_args!(
                    "Server returned status code: {}",
                    stat.as_str().red().bold()
                ))?;
        }
    }

    let headers = res.headers().clone();
    let final_url = res.url().to_string();

    let body = res.text().await.with_context(format_args!(
        "Failed to fetch HTML (content) from URL: {}",
        url.bright_blue().italic()
    ))?;

    Ok(FetchResult {
        url: final_url,
        status: stat.as_u16(),
        headers,
        body,
    })
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use url::Url;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{method, path},
    };

    use crate::{
        error::{Res, ResExt},
        fetch::{AllowedDomains, Politeness, SweepClient, fetch_page},
    };

    fn test_client(allowed: &AllowedDomains) -> Res<SweepClient> {
        SweepClient::new(
            "docsweep-test",
            Duration::from_secs(5),
            Politeness::none(),
            allowed,
        )
    }

    fn host_of(server: &MockServer) -> String {
        Url::parse(&server.uri())
            .ok()
            .and_then(|u| u.host_str().map(str::to_owned))
            .unwrap_or_default()
    }

    #[test]
    fn test_allowed_domains() -> Res<()> {
        let allowed = AllowedDomains::new(["Academy.Example.com", ".docs.test"]);

        let yes = Url::parse("https://academy.example.com/course").context("parse")?;
        let sub = Url::parse("https://cdn.docs.test/a").context("parse")?;
        let no = Url::parse("https://example.com/").context("parse")?;
        let lookalike = Url::parse("https://evildocs.test/").context("parse")?;

        assert!(allowed.permits(&yes));
        assert!(allowed.permits(&sub));
        assert!(!allowed.permits(&no));
        assert!(!allowed.permits(&lookalike));

        Ok(())
    }

    #[test]
    fn test_politeness_pause_bounds() {
        let politeness = Politeness {
            delay: Duration::from_millis(200),
            jitter: Duration::from_millis(300),
        };

        for _ in 0..100 {
            let pause = politeness.next_pause();
            assert!(pause >= Duration::from_millis(200));
            assert!(pause <= Duration::from_millis(500));
        }

        assert_eq!(Politeness::none().next_pause(), Duration::ZERO);
    }

    #[tokio::test]
    async fn test_fetch_page_success() -> Res<()> {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/course"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw("<html><title>Course</title></html>", "text/html; charset=utf-8"),
            )
            .expect(1)
            .mount(&server)
            .await;

        let allowed = AllowedDomains::new([host_of(&server)]);
        let client = test_client(&allowed)?;

        let fetched = fetch_page(&client, &allowed, &format!("{}/course", server.uri())).await?;

        assert_eq!(fetched.status, 200);
        assert!(fetched.is_html());
        assert!(fetched.body.contains("<title>Course</title>"));

        Ok(())
    }

    #[tokio::test]
    async fn test_fetch_page_error_status() -> Res<()> {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/gone"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let allowed = AllowedDomains::new([host_of(&server)]);
        let client = test_client(&allowed)?;

        let res = fetch_page(&client, &allowed, &format!("{}/gone", server.uri())).await;

        assert!(res.is_err());

        Ok(())
    }

    #[tokio::test]
    async fn test_fetch_page_refuses_foreign_host() -> Res<()> {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let allowed = AllowedDomains::new(["academy.example.com"]);
        let client = test_client(&allowed)?;

        let res = fetch_page(&client, &allowed, &format!("{}/", server.uri())).await;

        assert!(res.is_err());

        Ok(())
    }

    #[tokio::test]
    async fn test_fetch_page_follows_redirect_within_domain() -> Res<()> {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/old"))
            .respond_with(ResponseTemplate::new(301).insert_header("Location", "/new"))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/new"))
            .respond_with(
                ResponseTemplate::new(200).set_body_raw("<html></html>", "text/html"),
            )
            .expect(1)
            .mount(&server)
            .await;

        let allowed = AllowedDomains::new([host_of(&server)]);
        let client = test_client(&allowed)?;

        let fetched = fetch_page(&client, &allowed, &format!("{}/old", server.uri())).await?;

        assert_eq!(fetched.status, 200);
        assert_eq!(fetched.url, format!("{}/new", server.uri()));

        Ok(())
    }

    #[tokio::test]
    async fn test_fetch_page_refuses_redirect_to_foreign_host() -> Res<()> {
        let server = MockServer::start().await;
        let foreign = MockServer::start().await;

        // same listener address, host name outside the allow-list
        let target = format!(
            "{}/secret",
            foreign.uri().replace("127.0.0.1", "localhost")
        );

        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(302).insert_header("Location", target.as_str()))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200).set_body_raw("<title>Foreign</title>", "text/html"),
            )
            .expect(0)
            .mount(&foreign)
            .await;

        let allowed = AllowedDomains::new([host_of(&server)]);
        let client = test_client(&allowed)?;

        let res = fetch_page(&client, &allowed, &format!("{}/", server.uri())).await;

        assert!(res.is_err());
        foreign.verify().await;

        Ok(())
    }

    #[tokio::test]
    async fn test_politeness_delay_precedes_each_request() -> Res<()> {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_raw("<html></html>", "text/html"))
            .expect(2)
            .mount(&server)
            .await;

        let allowed = AllowedDomains::new([host_of(&server)]);
        let client = SweepClient::new(
            "docsweep-test",
            Duration::from_secs(5),
            Politeness {
                delay: Duration::from_millis(150),
                jitter: Duration::ZERO,
            },
            &allowed,
        )?;

        let started = Instant::now();

        fetch_page(&client, &allowed, &format!("{}/a", server.uri())).await?;
        fetch_page(&client, &allowed, &format!("{}/b", server.uri())).await?;

        assert!(started.elapsed() >= Duration::from_millis(300));

        Ok(())
    }

    #[tokio::test]
    async fn test_fetch_page_too_many_requests() -> Res<()> {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(429))
            .expect(1)
            .mount(&server)
            .await;

        let allowed = AllowedDomains::new([host_of(&server)]);
        let client = test_client(&allowed)?;

        let started = Instant::now();
        let res = fetch_page(&client, &allowed, &format!("{}/busy", server.uri())).await;

        assert!(res.is_err());
        assert!(started.elapsed() >= Duration::from_millis(2500));

        Ok(())
    }
}
