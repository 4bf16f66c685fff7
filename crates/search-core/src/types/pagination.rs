//! Pagination types for search results.
//!
//! Pages are addressed with opaque continuation tokens. A token records the
//! position of the last returned row and a hash of the query shape that
//! produced it, so it cannot be replayed against a different query.

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use serde::{Deserialize, Serialize};

use crate::error::SearchError;

const TOKEN_VERSION: u8 = 1;

/// Position of a paginated query, encoded as an opaque string.
///
/// # Encoding
///
/// Tokens are base64url-encoded JSON containing:
/// - A format version
/// - The surrogate id of the last row returned
/// - The hash of the query shape
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContinuationToken {
    /// Token format version.
    #[serde(rename = "v")]
    version: u8,

    /// Surrogate id of the last row in the previous page.
    #[serde(rename = "last")]
    last_surrogate_id: i64,

    /// Hash of the query this token belongs to.
    #[serde(rename = "q")]
    query_hash: String,
}

impl ContinuationToken {
    /// Creates a token positioned after the given row.
    pub fn new(last_surrogate_id: i64, query_hash: impl Into<String>) -> Self {
        Self {
            version: TOKEN_VERSION,
            last_surrogate_id,
            query_hash: query_hash.into(),
        }
    }

    /// Returns the surrogate id of the last row already returned.
    pub fn last_surrogate_id(&self) -> i64 {
        self.last_surrogate_id
    }

    /// Returns the query hash.
    pub fn query_hash(&self) -> &str {
        &self.query_hash
    }

    /// Encodes the token to an opaque string.
    pub fn encode(&self) -> String {
        let json = serde_json::to_vec(self).unwrap_or_default();
        URL_SAFE_NO_PAD.encode(&json)
    }

    /// Decodes a token from an opaque string.
    pub fn decode(s: &str) -> Result<Self, SearchError> {
        let invalid = || SearchError::InvalidContinuationToken {
            token: s.to_string(),
        };

        let bytes = URL_SAFE_NO_PAD.decode(s).map_err(|_| invalid())?;
        let token: ContinuationToken = serde_json::from_slice(&bytes).map_err(|_| invalid())?;

        if token.version != TOKEN_VERSION {
            return Err(invalid());
        }
        Ok(token)
    }

    /// Decodes a token and checks that it was issued for the given query.
    pub fn decode_for(s: &str, query_hash: &str) -> Result<Self, SearchError> {
        let token = Self::decode(s)?;
        if token.query_hash != query_hash {
            return Err(SearchError::InvalidContinuationToken {
                token: s.to_string(),
            });
        }
        Ok(token)
    }
}

/// A request for one page of results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    /// Maximum number of items to return.
    pub max_item_count: usize,

    /// Token returned by the previous page, if any.
    pub continuation: Option<String>,
}

impl PageRequest {
    /// Creates a request for the first page.
    pub fn first(max_item_count: usize) -> Self {
        Self {
            max_item_count,
            continuation: None,
        }
    }

    /// Sets the continuation token.
    pub fn with_continuation(mut self, continuation: Option<String>) -> Self {
        self.continuation = continuation;
        self
    }
}

/// Information about a page of results.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageInfo {
    /// The token for the next page, if there is one.
    pub continuation: Option<String>,

    /// Backend-reported identifier of the request.
    pub activity_id: Option<String>,

    /// Backend-reported cost of the request.
    pub request_charge: f64,
}

impl PageInfo {
    /// Returns true when another page can be fetched.
    pub fn has_next(&self) -> bool {
        self.continuation.is_some()
    }
}

/// A page of search results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    /// The items in this page.
    pub items: Vec<T>,

    /// Pagination information.
    pub page_info: PageInfo,
}

impl<T> Page<T> {
    /// Creates a new page with the given items and page info.
    pub fn new(items: Vec<T>, page_info: PageInfo) -> Self {
        Self { items, page_info }
    }

    /// Creates an empty final page.
    pub fn empty() -> Self {
        Self {
            items: Vec::new(),
            page_info: PageInfo::default(),
        }
    }

    /// Returns true if this page has no items.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Returns the number of items in this page.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Maps the items to a different type.
    pub fn map<U, F>(self, f: F) -> Page<U>
    where
        F: FnMut(T) -> U,
    {
        Page {
            items: self.items.into_iter().map(f).collect(),
            page_info: self.page_info,
        }
    }
}

impl<T> Default for Page<T> {
    fn default() -> Self {
        Self::empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_encode_decode() {
        let token = ContinuationToken::new(42, "abc123");
        let encoded = token.encode();
        let decoded = ContinuationToken::decode(&encoded).unwrap();
        assert_eq!(decoded.last_surrogate_id(), 42);
        assert_eq!(decoded.query_hash(), "abc123");
    }

    #[test]
    fn test_token_decode_invalid() {
        assert!(matches!(
            ContinuationToken::decode("not-valid!!"),
            Err(SearchError::InvalidContinuationToken { .. })
        ));
        let garbage = URL_SAFE_NO_PAD.encode(b"{\"foo\":1}");
        assert!(ContinuationToken::decode(&garbage).is_err());
    }

    #[test]
    fn test_token_rejects_other_query() {
        let encoded = ContinuationToken::new(7, "hash-a").encode();
        assert!(ContinuationToken::decode_for(&encoded, "hash-a").is_ok());
        assert!(matches!(
            ContinuationToken::decode_for(&encoded, "hash-b"),
            Err(SearchError::InvalidContinuationToken { .. })
        ));
    }

    #[test]
    fn test_token_rejects_unknown_version() {
        let json = serde_json::json!({"v": 9, "last": 1, "q": "h"});
        let encoded = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&json).unwrap());
        assert!(ContinuationToken::decode(&encoded).is_err());
    }

    #[test]
    fn test_page_map() {
        let page = Page::new(
            vec![1, 2, 3],
            PageInfo {
                continuation: Some("t".to_string()),
                ..Default::default()
            },
        );
        let mapped = page.map(|x| x * 2);
        assert_eq!(mapped.items, vec![2, 4, 6]);
        assert!(mapped.page_info.has_next());
        assert!(Page::<i32>::empty().is_empty());
    }
}
