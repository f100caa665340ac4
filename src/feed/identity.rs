//! Identity derivation for sources and items.
//!
//! Atom and RSS expose different identifiers. Each identity is computed by
//! trying a fixed list of extraction strategies in priority order and taking
//! the first non-empty result, then hashing it into a fixed-width key.

use sha2::{Digest, Sha256};

use crate::feed::types::{Channel, ParsedItem};

/// An extraction strategy for a per-item key.
type ItemKeyStrategy = fn(&ParsedItem) -> Option<String>;

/// Strategies for the persisted item ID: native ID, then GUID, then
/// title + content.
const ITEM_ID_STRATEGIES: &[ItemKeyStrategy] = &[native_id, guid, title_and_content];

/// Strategies for the in-memory dedup key, which only needs to be unique
/// within one feed.
const DEDUP_KEY_STRATEGIES: &[ItemKeyStrategy] = &[guid, native_id, link, title_and_content];

fn non_empty(value: Option<&String>) -> Option<String> {
    value
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn native_id(item: &ParsedItem) -> Option<String> {
    non_empty(item.native_id.as_ref())
}

fn guid(item: &ParsedItem) -> Option<String> {
    non_empty(item.guid.as_ref())
}

fn link(item: &ParsedItem) -> Option<String> {
    non_empty(item.link.as_ref())
}

fn title_and_content(item: &ParsedItem) -> Option<String> {
    let title = non_empty(item.title.as_ref());
    let content = non_empty(item.content.as_ref());
    if title.is_none() && content.is_none() {
        return None;
    }
    let joined = format!(
        "{}{}",
        title.unwrap_or_default(),
        content.unwrap_or_default()
    );
    Some(hash_hex(&joined))
}

fn first_match(strategies: &[ItemKeyStrategy], item: &ParsedItem) -> Option<String> {
    strategies.iter().find_map(|strategy| strategy(item))
}

/// Hex-encoded SHA-256 of the input.
pub fn hash_hex(input: &str) -> String {
    format!("{:x}", Sha256::digest(input.as_bytes()))
}

/// The stable key an item ID is derived from, or `None` if the item
/// carries nothing usable.
pub fn stable_item_key(item: &ParsedItem) -> Option<String> {
    first_match(ITEM_ID_STRATEGIES, item)
}

/// Per-feed dedup key for the recent-items window.
pub fn dedup_key(item: &ParsedItem) -> Option<String> {
    first_match(DEDUP_KEY_STRATEGIES, item)
}

/// Item ID: the stable item key combined with its source's identity.
pub fn item_id(source_id: &str, item: &ParsedItem) -> Option<String> {
    stable_item_key(item).map(|key| hash_hex(&format!("{source_id}:{key}")))
}

/// Stable channel key: canonical ID, then primary link, then the
/// fetch-time URL and title.
pub fn channel_key(url: &str, channel: &Channel) -> String {
    non_empty(channel.id.as_ref())
        .or_else(|| non_empty(channel.link.as_ref()))
        .unwrap_or_else(|| format!("{url}\n{}", channel.title))
}

/// Source ID derived from the channel key.
pub fn source_id(url: &str, channel: &Channel) -> String {
    hash_hex(&channel_key(url, channel))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_hex_is_fixed_width() {
        assert_eq!(hash_hex("").len(), 64);
        assert_eq!(hash_hex("a long input string").len(), 64);
        assert_ne!(hash_hex("a"), hash_hex("b"));
    }

    #[test]
    fn test_stable_key_prefers_native_id() {
        let item = ParsedItem::new()
            .with_native_id("urn:uuid:1")
            .with_guid("guid-1")
            .with_title("t");
        assert_eq!(stable_item_key(&item), Some("urn:uuid:1".to_string()));
    }

    #[test]
    fn test_stable_key_falls_back_to_guid() {
        let item = ParsedItem::new().with_guid("guid-1").with_title("t");
        assert_eq!(stable_item_key(&item), Some("guid-1".to_string()));
    }

    #[test]
    fn test_stable_key_falls_back_to_title_and_content() {
        let a = ParsedItem::new().with_title("Title").with_content("Body");
        let b = ParsedItem::new().with_title("Title").with_content("Body");
        let c = ParsedItem::new().with_title("Title").with_content("Other");
        assert!(stable_item_key(&a).is_some());
        assert_eq!(stable_item_key(&a), stable_item_key(&b));
        assert_ne!(stable_item_key(&a), stable_item_key(&c));
    }

    #[test]
    fn test_blank_identifiers_are_skipped() {
        let item = ParsedItem::new().with_native_id("  ").with_guid("g");
        assert_eq!(stable_item_key(&item), Some("g".to_string()));
    }

    #[test]
    fn test_nothing_extractable() {
        let item = ParsedItem::new().with_title("   ");
        assert_eq!(stable_item_key(&item), None);
        assert_eq!(dedup_key(&item), None);
        assert_eq!(item_id("src", &item), None);
    }

    #[test]
    fn test_dedup_key_order() {
        let item = ParsedItem::new()
            .with_native_id("id")
            .with_guid("guid")
            .with_link("https://example.com/1");
        assert_eq!(dedup_key(&item), Some("guid".to_string()));

        let item = ParsedItem::new()
            .with_link("https://example.com/1")
            .with_title("t");
        assert_eq!(dedup_key(&item), Some("https://example.com/1".to_string()));
    }

    #[test]
    fn test_item_id_depends_on_source() {
        let item = ParsedItem::new().with_guid("guid-1");
        let a = item_id("source-a", &item).unwrap();
        let b = item_id("source-b", &item).unwrap();
        assert_ne!(a, b);
        assert_eq!(a, item_id("source-a", &item).unwrap());
    }

    #[test]
    fn test_channel_key_priority() {
        let url = "https://example.com/feed.xml";
        let full = Channel::new("T")
            .with_id("urn:feed")
            .with_link("https://example.com");
        assert_eq!(channel_key(url, &full), "urn:feed");

        let link_only = Channel::new("T").with_link("https://example.com");
        assert_eq!(channel_key(url, &link_only), "https://example.com");

        let bare = Channel::new("T");
        assert_eq!(channel_key(url, &bare), "https://example.com/feed.xml\nT");
    }

    #[test]
    fn test_source_id_stable() {
        let channel = Channel::new("T").with_link("https://example.com");
        assert_eq!(
            source_id("https://example.com/rss", &channel),
            source_id("https://example.com/rss", &channel)
        );
    }
}
