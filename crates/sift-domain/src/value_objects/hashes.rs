use serde::{Deserialize, Serialize};

use crate::{DomainError, DomainResult};

/// Path segment used when a consumer subscribes to more than one hash.
pub const MULTI_STREAM_PATH: &str = "multi?hashes=";

/// Characters that would change the meaning of a stream path or query.
const FORBIDDEN_HASH_CHARS: &[char] = &['/', '?', '&', ',', '#', '=', '%'];

/// Ordered, non-empty set of stream hashes a consumer subscribes to
///
/// The order is caller-significant and preserved verbatim in the stream URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct StreamHashes(Vec<String>);

impl StreamHashes {
    /// Create a hash set from an ordered list of hashes
    ///
    /// Fails when the list is empty or any hash is malformed.
    pub fn new<I, S>(hashes: I) -> DomainResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let hashes: Vec<String> = hashes.into_iter().map(Into::into).collect();
        if hashes.is_empty() {
            return Err(DomainError::NoHashes);
        }
        for hash in &hashes {
            validate_hash(hash)?;
        }
        Ok(Self(hashes))
    }

    /// Create a hash set for a single stream
    pub fn single(hash: impl Into<String>) -> DomainResult<Self> {
        Self::new([hash.into()])
    }

    /// Hashes in subscription order
    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    /// Number of hashes (always at least one)
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always false; kept for API symmetry with collections
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// True when the consumer uses the multi-stream endpoint
    pub fn is_multi(&self) -> bool {
        self.0.len() > 1
    }

    /// Iterate over hashes in subscription order
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Comma-joined hashes, the form used in `multi?hashes=` and as the
    /// hash reported for single-stream envelopes
    pub fn joined(&self) -> String {
        self.0.join(",")
    }

    /// Path (relative to the stream host) addressing these hashes
    ///
    /// A single hash is addressed directly; more than one uses the
    /// multi-stream endpoint.
    pub fn stream_path(&self) -> String {
        if self.is_multi() {
            format!("{MULTI_STREAM_PATH}{}", self.joined())
        } else {
            self.0[0].clone()
        }
    }
}

impl TryFrom<Vec<String>> for StreamHashes {
    type Error = DomainError;

    fn try_from(hashes: Vec<String>) -> Result<Self, Self::Error> {
        Self::new(hashes)
    }
}

impl From<StreamHashes> for Vec<String> {
    fn from(hashes: StreamHashes) -> Self {
        hashes.0
    }
}

impl std::fmt::Display for StreamHashes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.joined())
    }
}

fn validate_hash(hash: &str) -> DomainResult<()> {
    if hash.is_empty()
        || hash
            .chars()
            .any(|c| c.is_whitespace() || c.is_control() || FORBIDDEN_HASH_CHARS.contains(&c))
    {
        return Err(DomainError::InvalidHash(hash.to_string()));
    }
    Ok(())
}

/// What a consumer should stream
///
/// `Csdl` targets must be compiled to a hash before a connection is attempted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamTarget {
    /// A single compiled filter hash
    Hash(String),
    /// Several compiled filter hashes, consumed over one connection
    Hashes(Vec<String>),
    /// A raw filter definition that still needs compiling
    Csdl(String),
}

impl StreamTarget {
    /// Resolve the target without contacting the API
    ///
    /// Returns `Ok(None)` for `Csdl` targets, which need compiling first.
    pub fn resolve_local(&self) -> DomainResult<Option<StreamHashes>> {
        match self {
            StreamTarget::Hash(hash) => StreamHashes::single(hash.clone()).map(Some),
            StreamTarget::Hashes(hashes) => StreamHashes::new(hashes.iter().cloned()).map(Some),
            StreamTarget::Csdl(_) => Ok(None),
        }
    }

    /// True when resolving this target requires a compile call
    pub fn needs_compile(&self) -> bool {
        matches!(self, StreamTarget::Csdl(_))
    }
}

impl From<StreamHashes> for StreamTarget {
    fn from(hashes: StreamHashes) -> Self {
        StreamTarget::Hashes(hashes.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_hash_uses_direct_path() {
        let hashes = StreamHashes::single("abc123").unwrap();
        assert!(!hashes.is_multi());
        assert_eq!(hashes.stream_path(), "abc123");
    }

    #[test]
    fn test_multiple_hashes_use_multi_path_in_order() {
        let hashes = StreamHashes::new(["bbb", "aaa", "ccc"]).unwrap();
        assert!(hashes.is_multi());
        assert_eq!(hashes.stream_path(), "multi?hashes=bbb,aaa,ccc");
    }

    #[test]
    fn test_empty_list_rejected() {
        let result = StreamHashes::new(Vec::<String>::new());
        assert_eq!(result, Err(DomainError::NoHashes));
    }

    #[test]
    fn test_malformed_hashes_rejected() {
        for bad in ["", "a,b", "a/b", "a b", "a?b", "a&b", "a\nb"] {
            assert!(
                matches!(StreamHashes::single(bad), Err(DomainError::InvalidHash(_))),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_target_resolution() {
        let target = StreamTarget::Hashes(vec!["aaa".into(), "bbb".into()]);
        let hashes = target.resolve_local().unwrap().unwrap();
        assert_eq!(hashes.as_slice(), ["aaa", "bbb"]);

        let csdl = StreamTarget::Csdl("interaction.content contains \"rust\"".into());
        assert!(csdl.needs_compile());
        assert_eq!(csdl.resolve_local().unwrap(), None);

        let empty = StreamTarget::Hashes(vec![]);
        assert_eq!(empty.resolve_local(), Err(DomainError::NoHashes));
    }

    #[test]
    fn test_serde_validates() {
        let hashes: StreamHashes = serde_json::from_str(r#"["aaa","bbb"]"#).unwrap();
        assert_eq!(hashes.joined(), "aaa,bbb");
        assert!(serde_json::from_str::<StreamHashes>("[]").is_err());
    }
}
