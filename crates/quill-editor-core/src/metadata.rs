//! Link metadata for bookmark cards.
//!
//! The [`MetadataFetcher`] collaborator resolves a URL to a [`LinkMetadata`].
//! Fetchers never fail for a well-formed URL: when the page cannot be
//! retrieved they fall back to placeholder values derived from the domain
//! and path. A malformed URL is a [`ValidationError::InvalidUrl`].

use quill_common::{MediaPayload, QuillError, ValidationError};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::markup::{Element, Fragment, Visit};

const MAX_TITLE_CHARS: usize = 100;
const MAX_DESCRIPTION_CHARS: usize = 200;

/// Titles and descriptions for well-known sites, used when nothing better
/// is available.
const KNOWN_SITES: &[(&str, &str, &str)] = &[
    ("github.com", "GitHub Repository", "Explore code, issues, and pull requests on GitHub"),
    ("stackoverflow.com", "Stack Overflow Question", "Programming Q&A and developer community"),
    ("medium.com", "Medium Article", "Read stories and ideas from writers and experts"),
    (
        "dev.to",
        "DEV Community Post",
        "The constructive and inclusive social network for software developers",
    ),
    ("youtube.com", "YouTube Video", "Watch videos on YouTube"),
    ("twitter.com", "Twitter Post", "See what's happening on Twitter"),
    ("x.com", "X (Twitter) Post", "See what's happening on X"),
    ("linkedin.com", "LinkedIn Post", "Professional networking and career content"),
    ("reddit.com", "Reddit Post", "Dive into anything on Reddit"),
    ("wikipedia.org", "Wikipedia Article", "Free encyclopedia that anyone can edit"),
];

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkMetadata {
    pub title: String,
    pub description: String,
    pub image: String,
    pub favicon: String,
    pub site: String,
    pub url: String,
}

impl LinkMetadata {
    /// Values in card attribute order: url, title, description, image,
    /// favicon, site.
    pub fn fields(&self) -> [&str; 6] {
        [
            self.url.as_str(),
            self.title.as_str(),
            self.description.as_str(),
            self.image.as_str(),
            self.favicon.as_str(),
            self.site.as_str(),
        ]
    }

    pub fn to_payload(&self) -> MediaPayload {
        MediaPayload::Bookmark {
            url: self.url.clone(),
            title: self.title.clone(),
            description: self.description.clone(),
            image: self.image.clone(),
            favicon: self.favicon.clone(),
            site: self.site.clone(),
        }
    }
}

/// Resolves a URL to preview metadata.
pub trait MetadataFetcher {
    fn fetch_metadata(
        &self,
        url: &str,
    ) -> impl Future<Output = Result<LinkMetadata, QuillError>>;
}

/// Offline fetcher: always answers with [`fallback_metadata`].
#[derive(Clone, Copy, Debug, Default)]
pub struct FallbackFetcher;

impl MetadataFetcher for FallbackFetcher {
    async fn fetch_metadata(&self, url: &str) -> Result<LinkMetadata, QuillError> {
        Ok(fallback_metadata(url)?)
    }
}

/// Fetches the page over HTTP and reads its `og:`/`twitter:` meta tags.
#[cfg(feature = "fetch")]
#[derive(Clone, Debug, Default)]
pub struct HttpMetadataFetcher {
    client: reqwest::Client,
}

#[cfg(feature = "fetch")]
impl HttpMetadataFetcher {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    async fn fetch_page(&self, url: &Url) -> reqwest::Result<String> {
        self.client
            .get(url.clone())
            .send()
            .await?
            .error_for_status()?
            .text()
            .await
    }
}

#[cfg(feature = "fetch")]
impl MetadataFetcher for HttpMetadataFetcher {
    async fn fetch_metadata(&self, url: &str) -> Result<LinkMetadata, QuillError> {
        let parsed = parse_link(url)?;
        match self.fetch_page(&parsed).await {
            Ok(html) => Ok(metadata_from_html(&html, url)?),
            Err(e) => {
                tracing::info!(%url, error = %e, "metadata fetch failed, using domain fallback");
                Ok(fallback_metadata(url)?)
            }
        }
    }
}

/// Parse and check a link URL. It must be absolute and have a host.
pub fn parse_link(url: &str) -> Result<Url, ValidationError> {
    let trimmed = url.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::Empty("URL"));
    }
    let parsed = Url::parse(trimmed).map_err(|_| ValidationError::InvalidUrl(trimmed.to_owned()))?;
    match parsed.host_str() {
        Some(host) if !host.is_empty() => Ok(parsed),
        _ => Err(ValidationError::InvalidUrl(trimmed.to_owned())),
    }
}

fn favicon_url(domain: &str, size: u32) -> String {
    format!("https://www.google.com/s2/favicons?sz={size}&domain={domain}")
}

fn known_site(domain: &str) -> Option<(&'static str, &'static str)> {
    let bare = domain.strip_prefix("www.").unwrap_or(domain);
    KNOWN_SITES
        .iter()
        .find(|(site, _, _)| *site == bare)
        .map(|(_, title, description)| (*title, *description))
}

/// Uppercase the first character of every word, after turning `-` and `_`
/// into spaces.
fn title_case_segment(segment: &str) -> String {
    let mut out = String::with_capacity(segment.len());
    let mut in_word = false;
    for ch in segment.chars() {
        let ch = if matches!(ch, '-' | '_') { ' ' } else { ch };
        let is_word = ch.is_ascii_alphanumeric();
        if is_word && !in_word {
            out.push(ch.to_ascii_uppercase());
        } else {
            out.push(ch);
        }
        in_word = is_word;
    }
    out
}

/// Placeholder metadata derived from the URL alone.
///
/// Well-known domains get a descriptive title; a meaningful last path
/// segment is title-cased and prefixed onto it.
pub fn fallback_metadata(url: &str) -> Result<LinkMetadata, ValidationError> {
    let parsed = parse_link(url)?;
    let domain = parsed.host_str().unwrap_or_default().to_owned();

    let (mut title, description) = match known_site(&domain) {
        Some((title, description)) => (title.to_owned(), description.to_owned()),
        None => (domain.clone(), format!("Visit {domain} for more information")),
    };

    let last_segment = parsed
        .path_segments()
        .and_then(|segments| segments.filter(|s| !s.is_empty()).last());
    if let Some(segment) = last_segment {
        let clean = title_case_segment(segment);
        if clean.chars().count() > 3 {
            title = format!("{clean} - {title}");
        }
    }

    Ok(LinkMetadata {
        title,
        description,
        image: favicon_url(&domain, 64),
        favicon: favicon_url(&domain, 16),
        site: domain,
        url: url.trim().to_owned(),
    })
}

/// Read preview metadata out of a fetched page.
///
/// Title: `og:title`, `twitter:title`, then `<title>`. Description:
/// `og:description`, `twitter:description`, then `description`. Image:
/// `og:image`, then `twitter:image`. Anything missing falls back to values
/// derived from the domain.
pub fn metadata_from_html(html: &str, url: &str) -> Result<LinkMetadata, ValidationError> {
    let parsed = parse_link(url)?;
    let domain = parsed.host_str().unwrap_or_default().to_owned();

    let page = match Fragment::parse(html) {
        Ok(page) => page,
        Err(e) => {
            tracing::warn!(%url, error = %e, "fetched page did not parse");
            Fragment::new()
        }
    };

    let mut metas: Vec<&Element> = Vec::new();
    let mut title_el = None;
    page.visit_elements(|el| {
        if el.is("meta") {
            metas.push(el);
        } else if el.is("title") && title_el.is_none() {
            title_el = Some(el);
        }
        Visit::Descend
    });
    let meta = |key: &str, names: &[&str]| {
        metas.iter().find_map(|el| {
            let named = el.attr(key).is_some_and(|v| names.contains(&v));
            if named { el.non_empty_attr("content") } else { None }
        })
    };

    let title = meta("property", &["og:title"])
        .or_else(|| meta("name", &["twitter:title"]))
        .map(str::to_owned)
        .or_else(|| title_el.map(Element::text_content))
        .filter(|t| !t.trim().is_empty())
        .unwrap_or_else(|| format!("Content from {domain}"));
    let description = meta("property", &["og:description"])
        .or_else(|| meta("name", &["twitter:description", "description"]))
        .map(str::to_owned)
        .unwrap_or_else(|| format!("Visit {domain} for more information"));
    let image = meta("property", &["og:image"])
        .or_else(|| meta("name", &["twitter:image"]))
        .map(str::to_owned)
        .unwrap_or_else(|| favicon_url(&domain, 64));

    Ok(LinkMetadata {
        title: title.trim().chars().take(MAX_TITLE_CHARS).collect(),
        description: description.trim().chars().take(MAX_DESCRIPTION_CHARS).collect(),
        image,
        favicon: favicon_url(&domain, 16),
        site: domain,
        url: url.trim().to_owned(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_domain_with_path_segment() {
        let meta = fallback_metadata("https://github.com/rust-lang/rust").unwrap();
        assert_eq!(meta.title, "Rust - GitHub Repository");
        assert_eq!(meta.description, "Explore code, issues, and pull requests on GitHub");
        assert_eq!(meta.site, "github.com");
        assert_eq!(meta.favicon, "https://www.google.com/s2/favicons?sz=16&domain=github.com");
        assert_eq!(meta.image, "https://www.google.com/s2/favicons?sz=64&domain=github.com");
    }

    #[test]
    fn unknown_domain_uses_domain_and_cleans_slug() {
        let meta = fallback_metadata("https://example.com/posts/my-first_post").unwrap();
        assert_eq!(meta.title, "My First Post - example.com");
        assert_eq!(meta.description, "Visit example.com for more information");

        let root = fallback_metadata("https://example.com/").unwrap();
        assert_eq!(root.title, "example.com");

        // short slugs are not worth a prefix
        let short = fallback_metadata("https://x.com/abc").unwrap();
        assert_eq!(short.title, "X (Twitter) Post");
    }

    #[test]
    fn malformed_urls_are_rejected() {
        assert_eq!(
            fallback_metadata("not a url"),
            Err(ValidationError::InvalidUrl("not a url".into()))
        );
        assert_eq!(fallback_metadata("   "), Err(ValidationError::Empty("URL")));
    }

    #[test]
    fn reads_open_graph_tags() {
        let html = r#"<!DOCTYPE html><html><head>
            <title>Fallback title</title>
            <meta property="og:title" content="  The Real Title  ">
            <meta name="description" content="plain description">
            <meta property="og:image" content="https://cdn.example.com/card.png">
            </head><body><p>hello</p></body></html>"#;
        let meta = metadata_from_html(html, "https://example.com/a").unwrap();
        assert_eq!(meta.title, "The Real Title");
        assert_eq!(meta.description, "plain description");
        assert_eq!(meta.image, "https://cdn.example.com/card.png");
        assert_eq!(meta.site, "example.com");
    }

    #[test]
    fn falls_back_to_title_element_and_truncates() {
        let long = "t".repeat(150);
        let html = format!("<html><head><title>{long}</title></head></html>");
        let meta = metadata_from_html(&html, "https://example.com").unwrap();
        assert_eq!(meta.title.chars().count(), 100);
        assert_eq!(meta.description, "Visit example.com for more information");
        assert_eq!(meta.image, "https://www.google.com/s2/favicons?sz=64&domain=example.com");
    }

    #[tokio::test]
    async fn fallback_fetcher_never_fails_for_valid_urls() {
        let meta = FallbackFetcher
            .fetch_metadata("https://www.reddit.com/r/rust")
            .await
            .unwrap();
        assert_eq!(meta.title, "Rust - Reddit Post");
        assert_eq!(meta.site, "www.reddit.com");

        let err = FallbackFetcher.fetch_metadata("nope").await.unwrap_err();
        assert!(matches!(err, QuillError::Validation(ValidationError::InvalidUrl(_))));
    }
}
