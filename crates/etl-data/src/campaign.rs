//! Structured parsing of ad-spend campaign names.
//!
//! Campaign names follow the convention
//! `<articleid> <type> v<N> android (<author>) <media>`, e.g.
//! `"1042 quiz v3 android (Jane Doe) video"`. The five parts are the creative
//! join key.

use std::sync::OnceLock;

use regex::Regex;
use thiserror::Error;

/// Creative join key recovered from a campaign name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CampaignKey {
    pub articleid: String,
    pub creative_type: String,
    pub version: String,
    pub author: String,
    pub media: String,
}

/// Why a campaign name yielded no key.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyExtractionError {
    #[error("campaign name is missing")]
    MissingName,
    #[error("campaign name {0:?} does not match the naming convention")]
    NoMatch(String),
}

fn campaign_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r"(?i)(?P<articleid>\d+)\s+(?P<type>\w+)\s+(?P<version>v\d+)\s+android\s+\((?P<author>[^)]+)\)\s+(?P<media>\w+)",
        )
        .expect("campaign name pattern is valid")
    })
}

// ── CampaignKeyExtractor ──────────────────────────────────────────────────────

/// Stateless parser for campaign names.
pub struct CampaignKeyExtractor;

impl CampaignKeyExtractor {
    /// Extract the creative key from `name`.
    ///
    /// The pattern is searched anywhere in the string and matched
    /// case-insensitively; captured text keeps its original casing and is
    /// trimmed.
    pub fn extract(name: Option<&str>) -> Result<CampaignKey, KeyExtractionError> {
        let name = name.ok_or(KeyExtractionError::MissingName)?;
        let caps = campaign_pattern()
            .captures(name)
            .ok_or_else(|| KeyExtractionError::NoMatch(name.to_string()))?;

        let part = |group: &str| {
            caps.name(group)
                .map(|m| m.as_str().trim().to_string())
                .unwrap_or_default()
        };

        Ok(CampaignKey {
            articleid: part("articleid"),
            creative_type: part("type"),
            version: part("version"),
            author: part("author"),
            media: part("media"),
        })
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
