/*!
**A crawler that maps documentation sites into a categorized sitemap**

## Usage

- Basic Crawling:
```sh
docsweep -o academy https://academy.example.com/
```

- With Logging:
```sh
docsweep -o academy -l crawl.log https://academy.example.com/
```

- Verbose Mode (Log All Requests and Downloads):
```sh
docsweep -o academy -v https://academy.example.com/
```

- Custom Limits:
```sh
docsweep -o academy -m 3 -p 200 https://academy.example.com/
```

- Extra Allowed Domains:
```sh
docsweep -o academy -d academy.example.com -d cdn.example.com https://academy.example.com/
```

- Choose What Gets Downloaded:
```sh
docsweep -o academy --download pdf --download document https://academy.example.com/
docsweep -o academy --no-download https://academy.example.com/
```

- From a Config File (flags still win):
```sh
docsweep -c docsweep.toml
```

```toml
seeds = ["https://academy.example.com/"]
allowed_domains = ["academy.example.com"]
output_dir = "academy"
max_depth = 4
max_pages = 500
delay_ms = 500
jitter_ms = 500
download_types = ["pdf", "image"]
max_retries = 3
backoff = "exponential"
retry_delay_ms = 1000
dedup = false
save_html = true
```

---

## Output Layout

```text
academy/
├── sitemap.json             # categorized sitemap with summary counts
├── resource_index.json      # every discovered resource, its source pages and download result
├── pages/<sha256(url)>.html # raw HTML of every fetched page
└── resources/<type>/<hash>_<name>
```

`sitemap.json`:
```json
{
  "html_pages": [{"url": "https://academy.example.com/", "title": "Academy", "content_type": "text/html", "timestamp": "2026-01-24T02:37:40Z", "depth": 0}],
  "videos": {"youtube": [], "vimeo": [], "direct": []},
  "pdfs": [{"url": "https://academy.example.com/intro.pdf", "parent_page": "https://academy.example.com/", "media_type": "pdf"}],
  "images": [],
  "other_resources": [],
  "summary": {"html_pages": 1, "youtube": 0, "vimeo": 0, "direct_videos": 0, "pdfs": 1, "images": 0, "other_resources": 0}
}
```

---

## How It Works

1. BFS Crawling:
- Starts at the seed URLs (depth 0), one request at a time
- Follows in-domain links only, never deeper than `max_depth` (default: 10)
- Every URL is fetched at most once per run
- Stops after `max_pages` page fetches (default: 1000)

2. Classification:
- Links are typed by path extension (html, image, video, pdf, document, other)
- YouTube and Vimeo embeds are recognized in tags and in raw page text
- Non-HTML links and embedded files are queued as resources

3. Rate Limiting:
- Fixed delay plus random jitter before every request (default: 500 + 0..500ms)
- `429 Too Many Requests` adds a 2.5s pause

4. Error Handling:
- Failed pages: Logged as warnings, crawling continues
- Failed downloads: Retried with backoff, then recorded in the resource index
- Fatal errors (bad config, unwritable sitemap): Printed with the full context chain

---

## Logging

#### Log Levels:

- **INFO** (verbose mode only): Requests, downloads, page ceiling
- **WARN** (always): Recoverable errors (404, timeouts, failed downloads)
- **FATAL** (always): Unrecoverable errors

#### Log Format:

```text
2026-01-24 02:37:40.351 [INFO]:
Sent request to URL (depth 0): https://academy.example.com/

2026-01-24 02:37:41.123 [WARN]:
Failed to fetch URL: https://academy.example.com/broken-link
Cause: HTTP status client error (404 Not Found)
```

---

## Limitations

- No JavaScript rendering (static HTML only)
- No authentication (public pages only)
- No robots.txt handling

*/

use clap::Parser;
use owo_colors::OwoColorize;

use docsweep::{
    cli::Args,
    config::CrawlConfig,
    crawler::{CrawlReport, CrawlSession},
    error::{Res, init_logger},
    output::SITEMAP_FILE,
};

fn print_report(report: &CrawlReport, output: &std::path::Path) {
    let summary = &report.sitemap.summary;

    println!("{}", "Crawl finished".green().bold());
    println!(
        "  pages:     {} fetched, {} failed",
        report.pages_fetched.bold(),
        report.pages_failed.red()
    );
    println!(
        "  resources: {} downloaded, {} failed, {} recorded only",
        report.resources_downloaded.bold(),
        report.resources_failed.red(),
        report.resources_recorded
    );
    if report.abandoned > 0 {
        println!(
            "  {} URLs left in the queue at the page ceiling",
            report.abandoned.yellow()
        );
    }

    println!("{}", "Sitemap".green().bold());
    println!("  html pages:      {}", summary.html_pages);
    println!("  youtube:         {}", summary.youtube);
    println!("  vimeo:           {}", summary.vimeo);
    println!("  direct videos:   {}", summary.direct_videos);
    println!("  pdfs:            {}", summary.pdfs);
    println!("  images:          {}", summary.images);
    println!("  other resources: {}", summary.other_resources);
    println!(
        "  written to:      {}",
        output.join(SITEMAP_FILE).to_string_lossy().bright_blue().italic()
    );
}

async fn run() -> Res<()> {
    let args = Args::parse();

    init_logger(args.log_file.as_deref()).await;

    let config = CrawlConfig::from_args(args).await?;
    let output = config.output_dir.clone();

    let report = CrawlSession::new(config)?.run().await?;

    print_report(&report, &output);

    Ok(())
}

#[tokio::main]
async fn main() -> std::process::ExitCode {
    match run().await {
        Ok(_) => std::process::ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", "FATAL:".red().bold(), e);
            std::process::ExitCode::FAILURE
        }
    }
}
