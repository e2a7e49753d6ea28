//! Data models for workspace entities

mod channel;
mod message;
mod user;

pub use channel::*;
pub use message::*;
pub use user::*;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Validation failures for rows coming back from the store or user input.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ModelError {
    #[error("message {id} targets both a channel and a recipient")]
    AmbiguousTarget { id: RecordId },
    #[error("message {id} has neither a channel nor a recipient")]
    MissingTarget { id: RecordId },
    #[error("channel name must not be empty")]
    EmptyChannelName,
}

/// Primary key of a stored row.
///
/// Tables may use bigint identity columns or text keys; both decode here.
/// Integer keys order numerically and sort before text keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordId {
    Int(i64),
    Text(String),
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordId::Int(n) => write!(f, "{}", n),
            RecordId::Text(s) => f.write_str(s),
        }
    }
}

/// Text that is the canonical form of an integer parses as `Int`.
/// Anything else ("007", "+5") stays `Text` so it prints back unchanged.
impl FromStr for RecordId {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.parse::<i64>() {
            Ok(n) if n.to_string() == s => RecordId::Int(n),
            _ => RecordId::Text(s.to_string()),
        })
    }
}

impl From<i64> for RecordId {
    fn from(n: i64) -> Self {
        RecordId::Int(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_id_decodes_number_or_string() {
        let ids: Vec<RecordId> = serde_json::from_str(r#"[7, "demo-init-1"]"#).unwrap();
        assert_eq!(ids[0], RecordId::Int(7));
        assert_eq!(ids[1], RecordId::Text("demo-init-1".to_string()));
    }

    #[test]
    fn test_record_id_ordering_is_numeric() {
        let a: RecordId = "9".parse().unwrap();
        let b: RecordId = "10".parse().unwrap();
        assert!(a < b);
        assert!(b < RecordId::Text("a".into()));
    }

    #[test]
    fn test_record_id_parse_keeps_non_canonical_text() {
        for raw in ["007", "+5", "-0"] {
            let id: RecordId = raw.parse().unwrap();
            assert_eq!(id, RecordId::Text(raw.to_string()));
            assert_eq!(id.to_string(), raw);
        }
        assert_eq!("-12".parse::<RecordId>().unwrap(), RecordId::Int(-12));
        assert_eq!("0".parse::<RecordId>().unwrap(), RecordId::Int(0));
    }
}
