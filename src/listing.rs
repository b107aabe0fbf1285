use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{LazyLock, Mutex};

use regex::Regex;
use reqwest::blocking::Client;
use serde::Serialize;

use crate::domain::FileRecord;
use crate::error::SelectorError;
use crate::http::{self, HttpSettings};

const ARCHIVE_EXT: &str = ".zip";

static ANCHOR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?is)<a\b[^>]*?\shref\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s>]+))[^>]*>(.*?)</a\s*>"#,
    )
    .expect("anchor pattern is valid")
});

static TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<[^>]*>").expect("tag pattern is valid"));

/// Archive links of one region page, in document order and grouped by their
/// top-level folder.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Listing {
    pub records: Vec<FileRecord>,
    pub groups: BTreeMap<String, Vec<FileRecord>>,
}

impl Listing {
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    fn push(&mut self, record: FileRecord) {
        self.groups
            .entry(record.group_key.clone())
            .or_default()
            .push(record.clone());
        self.records.push(record);
    }
}

pub trait DirectoryFetcher: Send + Sync {
    fn fetch_listing(&self, region_url: &str) -> Result<Listing, SelectorError>;
}

impl<T: DirectoryFetcher + ?Sized> DirectoryFetcher for &T {
    fn fetch_listing(&self, region_url: &str) -> Result<Listing, SelectorError> {
        (**self).fetch_listing(region_url)
    }
}

/// Parses an HTML directory index into archive records.
///
/// Only hrefs ending in `.zip` with at least two `/`-separated segments are
/// kept, each href once (an icon link and a text link to the same file give
/// one record). The absolute URL is `region_url` and the href concatenated
/// as-is.
pub fn parse_listing(region_url: &str, html: &str) -> Listing {
    let mut listing = Listing::default();
    let mut seen = HashSet::new();
    for captures in ANCHOR.captures_iter(html) {
        let Some(raw_href) = captures
            .get(1)
            .or_else(|| captures.get(2))
            .or_else(|| captures.get(3))
        else {
            continue;
        };
        let href = decode_entities(raw_href.as_str());
        if !href.ends_with(ARCHIVE_EXT) {
            continue;
        }
        let parts = href.split('/').collect::<Vec<_>>();
        if parts.len() < 2 || seen.contains(&href) {
            continue;
        }
        let group_key = parts[0].trim().to_string();

        let text = captures.get(4).map(|m| m.as_str()).unwrap_or_default();
        let mut display_name = decode_entities(&TAG.replace_all(text, ""))
            .trim()
            .to_string();
        if display_name.is_empty() {
            display_name = parts.last().copied().unwrap_or_default().to_string();
        }

        seen.insert(href.clone());
        listing.push(FileRecord {
            group_key,
            absolute_url: format!("{region_url}{href}"),
            relative_href: href,
            display_name,
        });
    }
    listing
}

fn decode_entities(value: &str) -> String {
    if !value.contains('&') {
        return value.to_string();
    }
    value
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#x27;", "'")
        .replace("&amp;", "&")
}

#[derive(Clone)]
pub struct HttpDirectoryFetcher {
    client: Client,
}

impl HttpDirectoryFetcher {
    pub fn new(settings: HttpSettings) -> Result<Self, SelectorError> {
        let client = http::build_client(settings, SelectorError::ListingHttp)?;
        Ok(Self { client })
    }
}

impl DirectoryFetcher for HttpDirectoryFetcher {
    fn fetch_listing(&self, region_url: &str) -> Result<Listing, SelectorError> {
        let response =
            http::send_with_retries(|| self.client.get(region_url), SelectorError::ListingHttp)?;
        if !response.status().is_success() {
            return Err(SelectorError::ListingStatus {
                status: response.status().as_u16(),
                url: region_url.to_string(),
            });
        }
        let html = response
            .text()
            .map_err(|err| SelectorError::ListingHttp(err.to_string()))?;
        let listing = parse_listing(region_url, &html);
        tracing::debug!(url = region_url, files = listing.len(), "parsed listing");
        Ok(listing)
    }
}

/// Memoizes successful listings of the wrapped fetcher by URL.
pub struct CachedDirectoryFetcher<F> {
    inner: F,
    cache: Mutex<HashMap<String, Listing>>,
}

impl<F: DirectoryFetcher> CachedDirectoryFetcher<F> {
    pub fn new(inner: F) -> Self {
        Self {
            inner,
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn cached_urls(&self) -> usize {
        self.cache.lock().map(|cache| cache.len()).unwrap_or(0)
    }
}

impl<F: DirectoryFetcher> DirectoryFetcher for CachedDirectoryFetcher<F> {
    fn fetch_listing(&self, region_url: &str) -> Result<Listing, SelectorError> {
        if let Ok(cache) = self.cache.lock() {
            if let Some(listing) = cache.get(region_url) {
                return Ok(listing.clone());
            }
        }
        let listing = self.inner.fetch_listing(region_url)?;
        if let Ok(mut cache) = self.cache.lock() {
            cache.insert(region_url.to_string(), listing.clone());
        }
        Ok(listing)
    }
}
