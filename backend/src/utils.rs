//! Identifier validation shared by the resolver and the action store.
//!
//! Vote and save targets must be real store ids. Placeholder values minted by
//! clients before an entity exists, or leaked stringified nulls, are rejected
//! before any collaborator is called.

use std::{fmt, str::FromStr};

use crate::errors::{AppError, Result};

const MAX_OPAQUE_LEN: usize = 128;
const OBJECT_ID_HEX_LEN: usize = 24;
const NULLISH: [&str; 3] = ["undefined", "null", "[object object]"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdFormat {
    /// 24 hex digits, the document store's native id.
    ObjectId,
    /// Any short URL-safe token.
    Opaque,
}

impl FromStr for IdFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "object_id" | "objectid" => Ok(IdFormat::ObjectId),
            "opaque" => Ok(IdFormat::Opaque),
            other => Err(format!("unknown id format '{other}', expected object_id or opaque")),
        }
    }
}

impl fmt::Display for IdFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdFormat::ObjectId => write!(f, "object_id"),
            IdFormat::Opaque => write!(f, "opaque"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdPolicy {
    format: IdFormat,
    placeholder_prefixes: Vec<String>,
}

impl Default for IdPolicy {
    fn default() -> Self {
        Self::new(IdFormat::ObjectId, Self::default_prefixes())
    }
}

impl IdPolicy {
    pub fn new(format: IdFormat, placeholder_prefixes: Vec<String>) -> Self {
        Self {
            format,
            placeholder_prefixes: placeholder_prefixes
                .into_iter()
                .map(|prefix| prefix.to_ascii_lowercase())
                .collect(),
        }
    }

    pub fn opaque() -> Self {
        Self::new(IdFormat::Opaque, Self::default_prefixes())
    }

    pub fn default_prefixes() -> Vec<String> {
        vec!["temp-".to_string(), "tmp-".to_string(), "placeholder-".to_string()]
    }

    pub fn format(&self) -> IdFormat {
        self.format
    }

    pub fn is_placeholder(&self, id: &str) -> bool {
        let lowered = id.trim().to_ascii_lowercase();
        NULLISH.contains(&lowered.as_str())
            || self
                .placeholder_prefixes
                .iter()
                .any(|prefix| lowered.starts_with(prefix.as_str()))
    }

    /// Rejects empty, placeholder and wrongly formatted ids.
    pub fn check(&self, id: &str) -> Result<()> {
        if id.is_empty() {
            return Err(AppError::InvalidTarget("id is empty".to_string()));
        }
        if self.is_placeholder(id) {
            return Err(AppError::InvalidTarget(format!("'{id}' is a placeholder id")));
        }

        let well_formed = match self.format {
            IdFormat::ObjectId => {
                id.len() == OBJECT_ID_HEX_LEN && hex::decode(id).map(|bytes| bytes.len() == 12).unwrap_or(false)
            }
            IdFormat::Opaque => {
                id.len() <= MAX_OPAQUE_LEN
                    && id
                        .chars()
                        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
            }
        };

        if well_formed {
            Ok(())
        } else {
            Err(AppError::InvalidTarget(format!("'{id}' is not a valid {} id", self.format)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_ids_must_be_24_hex_digits() {
        let policy = IdPolicy::default();

        assert!(policy.check("507f1f77bcf86cd799439011").is_ok());
        assert!(policy.check("507F1F77BCF86CD799439011").is_ok());
        assert!(policy.check("507f1f77bcf86cd79943901").is_err());
        assert!(policy.check("507f1f77bcf86cd79943901z").is_err());
        assert!(policy.check("t1").is_err());
        assert!(policy.check("").is_err());
    }

    #[test]
    fn placeholders_are_rejected_in_every_format() {
        for policy in [IdPolicy::default(), IdPolicy::opaque()] {
            assert!(policy.check("temp-1699999999").is_err());
            assert!(policy.check("TMP-abc").is_err());
            assert!(policy.check("undefined").is_err());
            assert!(policy.check("null").is_err());
            assert!(policy.check("[object Object]").is_err());
        }
    }

    #[test]
    fn opaque_ids_accept_short_url_safe_tokens() {
        let policy = IdPolicy::opaque();

        assert!(policy.check("t1").is_ok());
        assert!(policy.check("tool_42-b").is_ok());
        assert!(policy.check("has space").is_err());
        assert!(policy.check(&"x".repeat(129)).is_err());
    }

    #[test]
    fn check_reports_invalid_target() {
        let err = IdPolicy::default().check("temp-9").unwrap_err();
        assert!(matches!(err, AppError::InvalidTarget(_)));
    }
}
