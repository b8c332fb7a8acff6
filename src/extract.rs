use owo_colors::OwoColorize;
use scraper::{Html, Selector};

use crate::{
    classify::{MediaType, ResourceType, classify, embedded_videos, media_type, normalize, video_key},
    error::{Res, ResExt},
};

/// Plain text kept per page, in characters.
pub const TEXT_CAP: usize = 10_000;

pub struct Selectors {
    pub anchor: Selector,
    pub title: Selector,
    pub body: Selector,
    pub media: Selector,
}

impl Selectors {
    pub fn new() -> Res<Self> {
        Ok(Selectors {
            anchor: Selector::parse("a[href]").with_context(format_args!(
                "Failed to parse selector for HTML 'anchor' (link) tag: {}",
                "`<a href=\"URL\">`".yellow()
            ))?,

            title: Selector::parse("title").with_context(format_args!(
                "Failed to parse selector for HTML 'title' tag: {}",
                "`<title>`".yellow()
            ))?,

            body: Selector::parse("body").with_context(format_args!(
                "Failed to parse selector for HTML 'body' tag: {}",
                "`<body>`".yellow()
            ))?,

            media: Selector::parse("img[src], video[src], video source[src], iframe[src]")
                .with_context(format_args!(
                    "Failed to parse selector for HTML media tags: {}",
                    "`<img>`, `<video>`, `<source>`, `<iframe>`".yellow()
                ))?,
        })
    }
}

/// Everything a page points at.
///
/// `links` holds every anchor, unfiltered; `resources` repeats the anchors that are not
/// HTML. Nothing is deduplicated here.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Extraction {
    pub links: Vec<String>,
    pub media: Vec<(String, MediaType)>,
    pub resources: Vec<(String, ResourceType)>,
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct ParsedPage {
    pub title: Option<String>,
    pub text: String,
    pub extraction: Extraction,
}

pub struct Extractor {
    selectors: Selectors,
}

impl Extractor {
    pub fn new() -> Res<Self> {
        Ok(Extractor {
            selectors: Selectors::new()?,
        })
    }

    pub fn parse(&self, html: &str, page_url: &str) -> ParsedPage {
        let document = Html::parse_document(html);

        ParsedPage {
            title: extract_title(&document, &self.selectors.title),
            text: extract_text(&document, &self.selectors.body),
            extraction: self.extract_from(&document, html, page_url),
        }
    }

    pub fn extract(&self, html: &str, page_url: &str) -> Extraction {
        let document = Html::parse_document(html);
        self.extract_from(&document, html, page_url)
    }

    fn extract_from(&self, document: &Html, raw_html: &str, page_url: &str) -> Extraction {
        let mut extraction = Extraction::default();

        for anchor in document.select(&self.selectors.anchor) {
            let Some(href) = anchor.attr("href") else {
                continue;
            };

            let link = normalize(href, page_url);
            let kind = classify(&link);

            if kind != ResourceType::Html {
                extraction.resources.push((link.clone(), kind));
            }

            extraction.links.push(link);
        }

        for element in document.select(&self.selectors.media) {
            let Some(src) = element.attr("src") else {
                continue;
            };

            let url = normalize(src, page_url);
            let kind = media_type(&url);

            extraction.media.push((url, kind));
        }

        let known_videos: Vec<_> = extraction
            .media
            .iter()
            .filter_map(|(url, _)| video_key(url))
            .collect();

        for (url, platform, id) in embedded_videos(raw_html) {
            if known_videos.contains(&(platform, id)) {
                continue;
            }

            extraction.media.push((url, platform.into()));
        }

        extraction
    }
}

pub fn extract_text(document: &Html, body_selector: &Selector) -> String {
    if let Some(body) = document.select(body_selector).next() {
        body.text()
            .collect::<String>()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .chars()
            .take(TEXT_CAP)
            .collect()
    } else {
        String::new()
    }
}

pub fn extract_title(document: &Html, title_selector: &Selector) -> Option<String> {
    document
        .select(title_selector)
        .next()
        .map(|title| title.text().collect::<String>().trim().to_string())
        .filter(|title| !title.is_empty())
}

#[cfg(test)]
mod tests {
    use scraper::{Html, Selector};

    use crate::{
        classify::{MediaType, ResourceType},
        error::{Res, ResExt},
        extract::{Extractor, TEXT_CAP, extract_text, extract_title},
    };

    const PAGE: &str = r#"
<html>
  <head>
    <title>  Lesson 1 </title>
  </head>
  <body>
    <a href="/course/lesson-2">next</a>
    <a href="handout.pdf">handout</a>
    <a href="//cdn.academy.test/slides.pptx">slides</a>
    <a href="/course/lesson-2">again</a>
    <img src="/img/diagram.png">
    <video src="/media/intro.mp4"></video>
    <video><source src="clip.webm"></video>
    <iframe src="https://www.youtube.com/embed/dQw4w9WgXcQ"></iframe>
    <script>
      player.load("https://player.vimeo.com/video/76979871");
      player.load("https://youtu.be/dQw4w9WgXcQ");
    </script>
  </body>
</html>
"#;

    #[test]
    fn test_extract_links_media_resources() -> Res<()> {
        let extractor = Extractor::new().context("Failed to build extractor")?;

        let extraction = extractor.extract(PAGE, "https://academy.test/course/lesson-1");

        assert_eq!(
            extraction.links,
            vec![
                "https://academy.test/course/lesson-2",
                "https://academy.test/course/handout.pdf",
                "https://cdn.academy.test/slides.pptx",
                "https://academy.test/course/lesson-2",
            ]
        );

        assert_eq!(
            extraction.resources,
            vec![
                (
                    String::from("https://academy.test/course/handout.pdf"),
                    ResourceType::Pdf
                ),
                (
                    String::from("https://cdn.academy.test/slides.pptx"),
                    ResourceType::Document
                ),
            ]
        );

        assert_eq!(
            extraction.media,
            vec![
                (
                    String::from("https://academy.test/img/diagram.png"),
                    MediaType::Image
                ),
                (
                    String::from("https://academy.test/media/intro.mp4"),
                    MediaType::Video
                ),
                (
                    String::from("https://academy.test/course/clip.webm"),
                    MediaType::Video
                ),
                (
                    String::from("https://www.youtube.com/embed/dQw4w9WgXcQ"),
                    MediaType::Youtube
                ),
                (
                    String::from("https://vimeo.com/76979871"),
                    MediaType::Vimeo
                ),
            ]
        );

        Ok(())
    }

    #[test]
    fn test_resources_are_never_html() -> Res<()> {
        let extractor = Extractor::new().context("Failed to build extractor")?;

        let extraction = extractor.extract(PAGE, "https://academy.test/");

        assert!(
            extraction
                .resources
                .iter()
                .all(|(_, kind)| *kind != ResourceType::Html)
        );

        Ok(())
    }

    #[test]
    fn test_parse_malformed_html() -> Res<()> {
        let extractor = Extractor::new().context("Failed to build extractor")?;

        let parsed = extractor.parse("<html><body><a>no href<div", "https://academy.test/");

        assert_eq!(parsed.title, None);
        assert!(parsed.extraction.links.is_empty());
        assert!(parsed.extraction.media.is_empty());
        assert!(parsed.extraction.resources.is_empty());

        Ok(())
    }

    #[test]
    fn test_extract_title() -> Res<()> {
        let html = Html::parse_document(
            r#"
<html>
  <head>
    <title>     Example title for test       </title>
  </head>
</html>
            "#,
        );

        let title_selector =
            Selector::parse("title").context("Failed to parse selector for HTML title tag")?;

        assert_eq!(
            extract_title(&html, &title_selector).as_deref(),
            Some("Example title for test")
        );

        let empty = Html::parse_document("<html><head><title>  </title></head></html>");
        assert_eq!(extract_title(&empty, &title_selector), None);

        Ok(())
    }

    #[test]
    fn test_extract_text_is_capped() -> Res<()> {
        let body_selector =
            Selector::parse("body").context("Failed to parse selector for HTML body tag")?;

        let document = Html::parse_document(
            r#"
<html>
  <body>
            Example body  text for     test
  </body>
</html>
            "#,
        );

        assert_eq!(
            extract_text(&document, &body_selector),
            "Example body text for test"
        );

        let long = format!("<html><body>{}</body></html>", "word ".repeat(TEXT_CAP));
        let document = Html::parse_document(&long);

        assert_eq!(extract_text(&document, &body_selector).chars().count(), TEXT_CAP);

        Ok(())
    }
}
