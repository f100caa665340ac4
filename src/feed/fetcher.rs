//! Feed fetch collaborator.
//!
//! [`FeedFetcher`] is the seam between the pipeline and the network. The
//! default [`HttpFeedFetcher`] downloads with reqwest, parses RSS/Atom with
//! feed-rs, rejects URLs pointing at private networks, and remembers
//! `ETag`/`Last-Modified` validators per URL so unchanged feeds cost a 304.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use feed_rs::model::FeedType;
use feed_rs::parser;
use reqwest::header::{HeaderName, ETAG, IF_MODIFIED_SINCE, IF_NONE_MATCH, LAST_MODIFIED};
use reqwest::{Client, StatusCode};
use tracing::debug;

use crate::config::FeederConfig;
use crate::error::{ReadkeyError, Result};
use crate::feed::types::{Channel, FetchedFeed, ParsedItem};
use crate::sanitize::truncate_chars;

/// User agent string for feed fetching.
const USER_AGENT: &str = "ReadKey/0.1 (Feed Reader)";

/// Fetches and parses feed documents.
#[async_trait]
pub trait FeedFetcher: Send + Sync {
    /// Fetch `url` and return its channel metadata and items.
    ///
    /// With `bypass_cache` the fetcher must go to the origin even if it
    /// holds a cached copy of the document.
    async fn fetch(&self, url: &str, bypass_cache: bool) -> Result<FetchedFeed>;
}

/// Cache validators and the last channel seen for one URL.
#[derive(Debug, Clone)]
struct CacheEntry {
    etag: Option<String>,
    last_modified: Option<String>,
    channel: Channel,
    refresh_secs: Option<u64>,
}

/// HTTP feed fetcher with SSRF protection and conditional requests.
pub struct HttpFeedFetcher {
    client: Client,
    max_feed_size: u64,
    max_content_length: usize,
    cache: Mutex<HashMap<String, CacheEntry>>,
}

impl HttpFeedFetcher {
    /// Create a fetcher from the feeder configuration.
    pub fn new(config: &FeederConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .read_timeout(Duration::from_secs(config.read_timeout_secs))
            .timeout(Duration::from_secs(config.total_timeout_secs))
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| ReadkeyError::Fetch(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            max_feed_size: config.max_feed_size_bytes,
            max_content_length: config.max_content_length,
            cache: Mutex::new(HashMap::new()),
        })
    }

    fn cached(&self, url: &str) -> Option<CacheEntry> {
        self.cache
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(url)
            .cloned()
    }

    fn remember(&self, url: &str, entry: CacheEntry) {
        self.cache
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(url.to_string(), entry);
    }
}

#[async_trait]
impl FeedFetcher for HttpFeedFetcher {
    async fn fetch(&self, url: &str, bypass_cache: bool) -> Result<FetchedFeed> {
        validate_url(url)?;

        let cached = if bypass_cache { None } else { self.cached(url) };

        let mut request = self.client.get(url);
        if let Some(entry) = &cached {
            if let Some(etag) = &entry.etag {
                request = request.header(IF_NONE_MATCH, etag);
            }
            if let Some(last_modified) = &entry.last_modified {
                request = request.header(IF_MODIFIED_SINCE, last_modified);
            }
        }

        let response = request
            .send()
            .await
            .map_err(|e| ReadkeyError::Fetch(format!("failed to fetch feed: {}", e)))?;

        if response.status() == StatusCode::NOT_MODIFIED {
            if let Some(entry) = cached {
                debug!(url, "Feed not modified");
                let mut feed = FetchedFeed::new(url, entry.channel);
                feed.refresh_secs = entry.refresh_secs;
                return Ok(feed);
            }
        }

        if !response.status().is_success() {
            return Err(ReadkeyError::Fetch(format!(
                "HTTP error: {}",
                response.status()
            )));
        }

        if let Some(content_length) = response.content_length() {
            if content_length > self.max_feed_size {
                return Err(ReadkeyError::Fetch(format!(
                    "feed too large: {} bytes (max {} bytes)",
                    content_length, self.max_feed_size
                )));
            }
        }

        let etag = header_value(&response, ETAG);
        let last_modified = header_value(&response, LAST_MODIFIED);

        let bytes = response
            .bytes()
            .await
            .map_err(|e| ReadkeyError::Fetch(format!("failed to read response: {}", e)))?;

        if bytes.len() as u64 > self.max_feed_size {
            return Err(ReadkeyError::Fetch(format!(
                "feed too large: {} bytes (max {} bytes)",
                bytes.len(),
                self.max_feed_size
            )));
        }

        let feed = parse_feed(url, &bytes, self.max_content_length)?;

        if etag.is_some() || last_modified.is_some() {
            self.remember(
                url,
                CacheEntry {
                    etag,
                    last_modified,
                    channel: feed.channel.clone(),
                    refresh_secs: feed.refresh_secs,
                },
            );
        }

        Ok(feed)
    }
}

/// Validate a URL for SSRF protection.
///
/// This function checks that:
/// - The URL uses http or https scheme
/// - The host is not a private/loopback address
/// - The host is not a reserved hostname
pub fn validate_url(url: &str) -> Result<()> {
    let parsed =
        url::Url::parse(url).map_err(|e| ReadkeyError::Fetch(format!("invalid URL: {}", e)))?;

    match parsed.scheme() {
        "http" | "https" => {}
        scheme => {
            return Err(ReadkeyError::Fetch(format!(
                "unsupported URL scheme: {}",
                scheme
            )));
        }
    }

    let host = parsed
        .host()
        .ok_or_else(|| ReadkeyError::Fetch("URL has no host".to_string()))?;

    let ip = match host {
        url::Host::Domain(domain) => {
            if is_forbidden_hostname(domain) {
                return Err(ReadkeyError::Fetch(format!("forbidden host: {}", domain)));
            }
            return Ok(());
        }
        url::Host::Ipv4(ipv4) => IpAddr::V4(ipv4),
        url::Host::Ipv6(ipv6) => IpAddr::V6(ipv6),
    };

    if is_private_ip(&ip) {
        return Err(ReadkeyError::Fetch(format!(
            "private IP address not allowed: {}",
            ip
        )));
    }

    Ok(())
}

/// Check if a hostname is forbidden.
fn is_forbidden_hostname(host: &str) -> bool {
    const FORBIDDEN_SUFFIXES: [&str; 7] = [
        ".local",
        ".localhost",
        ".internal",
        ".intranet",
        ".corp",
        ".home",
        ".lan",
    ];

    let host_lower = host.to_lowercase();
    host_lower == "localhost"
        || FORBIDDEN_SUFFIXES
            .iter()
            .any(|suffix| host_lower.ends_with(suffix))
}

/// Check if an IP address is private/reserved.
fn is_private_ip(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(ipv4) => {
            let octets = ipv4.octets();
            ipv4.is_loopback()
                || ipv4.is_private()
                || ipv4.is_link_local()
                || ipv4.is_broadcast()
                || ipv4.is_unspecified()
                // Documentation: 192.0.2.0/24, 198.51.100.0/24, 203.0.113.0/24
                || (octets[0] == 192 && octets[1] == 0 && octets[2] == 2)
                || (octets[0] == 198 && octets[1] == 51 && octets[2] == 100)
                || (octets[0] == 203 && octets[1] == 0 && octets[2] == 113)
                // Shared address space: 100.64.0.0/10
                || (octets[0] == 100 && (64..=127).contains(&octets[1]))
        }
        IpAddr::V6(ipv6) => {
            let segments = ipv6.segments();
            ipv6.is_loopback()
                || ipv6.is_unspecified()
                // Unique local: fc00::/7
                || (segments[0] & 0xfe00) == 0xfc00
                // Link-local: fe80::/10
                || (segments[0] & 0xffc0) == 0xfe80
        }
    }
}

fn header_value(response: &reqwest::Response, name: HeaderName) -> Option<String> {
    response
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

fn non_empty(value: String) -> Option<String> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value)
    }
}

/// Parse feed bytes into a [`FetchedFeed`].
///
/// feed-rs makes up an ID for documents and entries that carry none. Those
/// IDs change between parses, so generation is disabled here and missing
/// identifiers stay `None` for the strategies in [`identity`](crate::feed::identity).
fn parse_feed(url: &str, bytes: &[u8], max_content_length: usize) -> Result<FetchedFeed> {
    let feed = parser::Builder::new()
        .id_generator(|_, _, _| String::new())
        .build()
        .parse(bytes)
        .map_err(|e| ReadkeyError::Fetch(format!("failed to parse feed: {}", e)))?;

    // RSS entry IDs are <guid> values; Atom and JSON Feed IDs are native
    let is_rss = matches!(
        feed.feed_type,
        FeedType::RSS0 | FeedType::RSS1 | FeedType::RSS2
    );

    let language = feed.language.clone();
    let channel = Channel {
        id: non_empty(feed.id),
        link: feed.links.first().map(|l| l.href.clone()),
        title: feed
            .title
            .map(|t| t.content)
            .unwrap_or_else(|| "Untitled Feed".to_string()),
        language: language.clone(),
    };

    // Full content body first, the summary only as a fallback
    let items = feed
        .entries
        .into_iter()
        .map(|entry| {
            let id = non_empty(entry.id);
            let (native_id, guid) = if is_rss { (None, id) } else { (id, None) };
            ParsedItem {
                native_id,
                guid,
                title: entry.title.map(|t| t.content),
                link: entry.links.first().map(|l| l.href.clone()),
                content: entry
                    .content
                    .and_then(|c| c.body)
                    .or(entry.summary.map(|s| s.content))
                    .map(|c| truncate_chars(&c, max_content_length)),
                language: language.clone(),
                published_at: entry.published.or(entry.updated),
            }
        })
        .collect();

    Ok(FetchedFeed {
        url: url.to_string(),
        channel,
        items,
        // RSS <ttl> is in minutes
        refresh_secs: feed.ttl.map(|minutes| u64::from(minutes) * 60),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::identity;

    #[test]
    fn test_validate_url_valid() {
        assert!(validate_url("https://example.com/feed.xml").is_ok());
        assert!(validate_url("http://example.com/feed.xml").is_ok());
        assert!(validate_url("http://93.184.216.34/rss").is_ok());
    }

    #[test]
    fn test_validate_url_invalid_scheme() {
        let result = validate_url("ftp://example.com/feed.xml");
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("unsupported URL scheme"));
    }

    #[test]
    fn test_validate_url_not_a_url() {
        let result = validate_url("not a url");
        assert!(result.unwrap_err().to_string().contains("invalid URL"));
    }

    #[test]
    fn test_validate_url_forbidden_hosts() {
        for url in [
            "http://localhost/feed.xml",
            "http://server.local/feed.xml",
            "http://api.internal/feed.xml",
        ] {
            let err = validate_url(url).unwrap_err();
            assert!(err.to_string().contains("forbidden host"), "{url}");
        }
    }

    #[test]
    fn test_validate_url_private_ips() {
        for url in [
            "http://127.0.0.1/feed.xml",
            "http://10.0.0.1/feed.xml",
            "http://172.16.0.1/feed.xml",
            "http://192.168.1.1/feed.xml",
            "http://169.254.1.1/feed.xml",
            "http://[::1]/feed.xml",
        ] {
            let err = validate_url(url).unwrap_err();
            assert!(err.to_string().contains("private IP"), "{url}");
        }

        // 172.32 is outside the private range
        assert!(validate_url("http://172.32.0.1/feed.xml").is_ok());
    }

    #[test]
    fn test_is_forbidden_hostname() {
        assert!(is_forbidden_hostname("localhost"));
        assert!(is_forbidden_hostname("api.localhost"));
        assert!(is_forbidden_hostname("corp.intranet"));
        assert!(!is_forbidden_hostname("example.com"));
        assert!(!is_forbidden_hostname("localhost.example.com"));
    }

    #[test]
    fn test_is_private_ip_v6() {
        assert!(is_private_ip(&"::".parse().unwrap()));
        assert!(is_private_ip(&"fe80::1".parse().unwrap()));
        assert!(is_private_ip(&"fd00::1".parse().unwrap()));
        assert!(!is_private_ip(&"2001:4860:4860::8888".parse().unwrap()));
    }

    #[test]
    fn test_parse_feed_rss() {
        let rss = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
  <channel>
    <title>Test Feed</title>
    <link>https://example.com</link>
    <description>A &lt;b&gt;test&lt;/b&gt; feed</description>
    <language>en-us</language>
    <ttl>30</ttl>
    <item>
      <title>First Article</title>
      <link>https://example.com/1</link>
      <guid>guid-1</guid>
      <description>&lt;p&gt;Description&lt;/p&gt;</description>
    </item>
  </channel>
</rss>"#;

        let feed = parse_feed("https://example.com/rss", rss.as_bytes(), 1000).unwrap();
        assert_eq!(feed.url, "https://example.com/rss");
        assert_eq!(feed.channel.title, "Test Feed");
        assert_eq!(feed.channel.language.as_deref(), Some("en-us"));
        // feed-rs may normalize URLs with trailing slash
        assert!(feed
            .channel
            .link
            .as_ref()
            .unwrap()
            .starts_with("https://example.com"));
        assert_eq!(feed.refresh_secs, Some(1800));
        assert_eq!(feed.items.len(), 1);
        assert_eq!(feed.items[0].title.as_deref(), Some("First Article"));
        assert_eq!(feed.items[0].guid.as_deref(), Some("guid-1"));
        assert!(feed.items[0].native_id.is_none());
        assert_eq!(feed.items[0].link.as_deref(), Some("https://example.com/1"));
        assert!(feed.items[0]
            .content
            .as_deref()
            .unwrap()
            .contains("Description"));
        assert_eq!(feed.items[0].language.as_deref(), Some("en-us"));
    }

    #[test]
    fn test_parse_feed_atom() {
        let atom = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <id>urn:uuid:feed</id>
  <title>Atom Feed</title>
  <link href="https://example.com"/>
  <updated>2025-01-01T00:00:00Z</updated>
  <entry>
    <id>urn:uuid:1</id>
    <title>Atom Entry</title>
    <link href="https://example.com/entry"/>
    <summary>Entry summary</summary>
    <content type="html">&lt;p&gt;Full body&lt;/p&gt;</content>
    <updated>2025-01-01T00:00:00Z</updated>
  </entry>
</feed>"#;

        let feed = parse_feed("https://example.com/atom", atom.as_bytes(), 1000).unwrap();
        assert_eq!(feed.channel.title, "Atom Feed");
        assert_eq!(feed.channel.id.as_deref(), Some("urn:uuid:feed"));
        assert!(feed.refresh_secs.is_none());
        assert_eq!(feed.items.len(), 1);
        assert_eq!(feed.items[0].native_id.as_deref(), Some("urn:uuid:1"));
        assert!(feed.items[0]
            .content
            .as_deref()
            .unwrap()
            .contains("Full body"));
        assert!(feed.items[0].published_at.is_some());
    }

    #[test]
    fn test_parse_feed_truncates_content() {
        let rss = r#"<?xml version="1.0"?>
<rss version="2.0">
  <channel>
    <title>T</title>
    <item>
      <guid>1</guid>
      <description>abcdefghijklmnopqrstuvwxyz</description>
    </item>
  </channel>
</rss>"#;

        let feed = parse_feed("https://example.com/rss", rss.as_bytes(), 5).unwrap();
        assert_eq!(feed.items[0].content.as_deref(), Some("abcde"));
    }

    #[test]
    fn test_parse_feed_untitled() {
        let rss = r#"<?xml version="1.0"?>
<rss version="2.0">
  <channel>
    <item>
      <guid>1</guid>
    </item>
  </channel>
</rss>"#;

        let feed = parse_feed("https://example.com/rss", rss.as_bytes(), 100).unwrap();
        assert_eq!(feed.channel.title, "Untitled Feed");
        assert_eq!(feed.items.len(), 1);
        assert!(feed.items[0].title.is_none());
    }

    fn channel_only_rss(title: &str) -> String {
        format!(
            r#"<?xml version="1.0"?>
<rss version="2.0">
  <channel>
    <title>{title}</title>
    <link>https://example.com/</link>
    <item>
      <description>Only a body</description>
    </item>
  </channel>
</rss>"#
        )
    }

    #[test]
    fn test_parse_feed_item_without_ids_is_stable() {
        let rss = channel_only_rss("Stable");
        let first = parse_feed("https://example.com/rss", rss.as_bytes(), 1000).unwrap();
        let second = parse_feed("https://example.com/rss", rss.as_bytes(), 1000).unwrap();

        let (a, b) = (&first.items[0], &second.items[0]);
        assert!(a.native_id.is_none());
        assert!(a.guid.is_none());
        assert!(identity::dedup_key(a).is_some());
        assert_eq!(identity::dedup_key(a), identity::dedup_key(b));
        assert_eq!(identity::item_id("src", a), identity::item_id("src", b));
    }

    #[test]
    fn test_parse_feed_source_id_survives_title_change() {
        let url = "https://example.com/rss";
        let before = parse_feed(url, channel_only_rss("Old name").as_bytes(), 1000).unwrap();
        let after = parse_feed(url, channel_only_rss("New name").as_bytes(), 1000).unwrap();

        assert!(before.channel.id.is_none());
        assert_eq!(
            identity::source_id(url, &before.channel),
            identity::source_id(url, &after.channel)
        );
    }

    #[test]
    fn test_parse_feed_invalid() {
        let invalid = "This is not XML";
        assert!(parse_feed("https://example.com/rss", invalid.as_bytes(), 100).is_err());
    }

    #[tokio::test]
    async fn test_fetch_rejects_private_url_before_request() {
        let fetcher = HttpFeedFetcher::new(&FeederConfig::default()).unwrap();
        let err = fetcher
            .fetch("http://127.0.0.1/feed.xml", true)
            .await
            .unwrap_err();
        assert!(matches!(err, ReadkeyError::Fetch(_)));
    }
}
