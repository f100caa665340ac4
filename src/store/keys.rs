//! Storage key formatting.
//!
//! Keys are namespaced by purpose and percent-escaped so that user names
//! and identifiers containing `:` cannot collide across namespaces.

use urlencoding::encode;

/// Key of an item's durable content.
pub fn item_key(item_id: &str) -> String {
    encode(&format!("feed:{item_id}")).into_owned()
}

/// Key of an item's entry (title, keywords, date) under its source.
pub fn entry_key(source_id: &str, item_id: &str) -> String {
    format!(
        "{}:{}",
        encode(&format!("entry:{source_id}")),
        encode(item_id)
    )
}

/// Key of a user's subscribed sources.
pub fn user_subscriptions_key(user: &str) -> String {
    encode(&format!("subs:{user}")).into_owned()
}

/// Key of a user's unread item IDs for one source.
pub fn unread_key(user: &str, source_id: &str) -> String {
    format!("{}:{}", encode(&format!("unread:{user}")), encode(source_id))
}

/// Key of a source's capped latest-items list.
pub fn latest_key(source_id: &str) -> String {
    encode(&format!("latest:{source_id}")).into_owned()
}

/// Key of a source's subscriber list.
pub fn subscriber_key(source_id: &str) -> String {
    encode(&format!("subscriber:{source_id}")).into_owned()
}

/// Key of the set of currently listening sources.
pub fn listening_key() -> String {
    "listening".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_key() {
        assert_eq!(item_key("abc123"), "feed%3Aabc123");
    }

    #[test]
    fn test_latest_and_subscriber_keys() {
        assert_eq!(latest_key("src1"), "latest%3Asrc1");
        assert_eq!(subscriber_key("src1"), "subscriber%3Asrc1");
        assert_eq!(listening_key(), "listening");
    }

    #[test]
    fn test_unread_key_escapes_user() {
        // A user named "a:b" must not collide with user "a" on source "b:..."
        let tricky = unread_key("a:b", "src");
        let plain = unread_key("a", "b:src");
        assert_ne!(tricky, plain);
        assert_eq!(tricky, "unread%3Aa%3Ab:src");
    }

    #[test]
    fn test_entry_key_distinct_per_source() {
        assert_ne!(entry_key("s1", "item"), entry_key("s2", "item"));
        assert_ne!(entry_key("s1", "item1"), entry_key("s1", "item2"));
    }
}
