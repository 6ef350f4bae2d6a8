//! Per-source cleaning of the four workbook sheets.
//!
//! Every normalizer first canonicalizes column names and then coerces the
//! fields it knows about, skipping fields the sheet does not carry. Inputs
//! are never mutated; each call returns a fresh table.

use etl_core::dates::DateParser;
use etl_core::error::{EtlError, Result};
use etl_core::models::{columns, DatePolicy, SourceKind, Table, Value};
use tracing::{debug, warn};

use crate::campaign::{CampaignKeyExtractor, KeyExtractionError};

/// Number of unmatched campaign names kept for reporting.
const UNMATCHED_SAMPLE_LIMIT: usize = 5;

// ── Column names ──────────────────────────────────────────────────────────────

/// `" Campaign Name "` → `"campaign_name"`.
pub fn canonical_column_name(name: &str) -> String {
    name.trim().to_lowercase().replace(' ', "_")
}

/// Copy of `table` with canonical column names.
pub fn canonicalize_columns(table: &Table) -> Table {
    let mut out = table.clone();
    out.rename_columns(canonical_column_name);
    out
}

// ── Field coercions ───────────────────────────────────────────────────────────

fn coerce_date(table: &mut Table, column: &str, policy: DatePolicy) -> Result<()> {
    let table_name = table.name().to_string();
    let mut coerced = 0usize;
    table.try_map_column(column, |row, value| match DateParser::parse(value) {
        Ok(Some(dt)) => Ok(Value::DateTime(dt)),
        Ok(None) => Ok(Value::Missing),
        Err(()) => match policy {
            DatePolicy::Strict => Err(EtlError::DateParse {
                table: table_name.clone(),
                column: column.to_string(),
                row,
                value: value.to_string(),
            }),
            DatePolicy::Lenient => {
                debug!(table = %table_name, column, row, value = %value, "Dropping unparsable date");
                coerced += 1;
                Ok(Value::Missing)
            }
        },
    })?;
    if coerced > 0 {
        warn!(
            table = %table_name,
            column,
            count = coerced,
            "Unparsable dates treated as missing"
        );
    }
    Ok(())
}

/// Parse a cell as a float; anything unparsable becomes `Missing`.
pub fn to_numeric(value: &Value) -> Value {
    match value {
        Value::Int(i) => Value::Float(*i as f64),
        Value::Float(f) => Value::float(*f),
        Value::Bool(b) => Value::Float(if *b { 1.0 } else { 0.0 }),
        Value::Str(s) => s
            .trim()
            .parse::<f64>()
            .map(Value::float)
            .unwrap_or(Value::Missing),
        Value::Missing | Value::DateTime(_) => Value::Missing,
    }
}

fn coerce_numeric(table: &mut Table, column: &str, fill_zero: bool) {
    table.map_column(column, |value| match to_numeric(value) {
        Value::Missing if fill_zero => Value::Float(0.0),
        other => other,
    });
}

fn coerce_identifier(table: &mut Table, column: &str) {
    table.map_column(column, |value| {
        value.to_text().map(Value::Str).unwrap_or(Value::Missing)
    });
}

fn coerce_trimmed_text(table: &mut Table, column: &str) {
    table.map_column(column, |value| {
        value
            .to_text()
            .map(|s| Value::Str(s.trim().to_string()))
            .unwrap_or(Value::Missing)
    });
}

// ── SourceNormalizer ──────────────────────────────────────────────────────────

/// Cleaning rules for one logical source.
pub trait SourceNormalizer {
    /// Which sheet this normalizer handles.
    fn kind(&self) -> SourceKind;

    /// Produce the normalized copy of `raw`.
    fn normalize(&self, raw: &Table) -> Result<Table>;
}

/// Creative backlog: created date, string article ids, trimmed descriptors.
#[derive(Debug, Clone, Copy, Default)]
pub struct CreativeNormalizer {
    pub date_policy: DatePolicy,
}

impl SourceNormalizer for CreativeNormalizer {
    fn kind(&self) -> SourceKind {
        SourceKind::Creative
    }

    fn normalize(&self, raw: &Table) -> Result<Table> {
        let mut table = canonicalize_columns(raw);
        coerce_date(&mut table, columns::CREATED_DATE, self.date_policy)?;
        coerce_identifier(&mut table, columns::ARTICLE_ID);
        for col in [columns::AUTHOR, columns::TYPE, columns::MEDIA, columns::VERSION] {
            coerce_trimmed_text(&mut table, col);
        }
        Ok(table)
    }
}

/// Outcome of campaign-name parsing across an ad-spend sheet.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyExtractionStats {
    pub matched: usize,
    pub failed: usize,
    /// First few campaign names that did not match.
    pub unmatched_samples: Vec<String>,
}

/// Facebook ads sheet: date, numeric spend/clicks and campaign-name keys.
#[derive(Debug, Clone, Copy, Default)]
pub struct AdSpendNormalizer {
    pub date_policy: DatePolicy,
}

impl AdSpendNormalizer {
    /// Normalize and report how many campaign names yielded a creative key.
    pub fn normalize_with_stats(&self, raw: &Table) -> Result<(Table, KeyExtractionStats)> {
        let mut table = canonicalize_columns(raw);
        coerce_date(&mut table, columns::DATE, self.date_policy)?;
        for col in [columns::SPEND, columns::CLICKS] {
            coerce_numeric(&mut table, col, false);
        }

        let mut stats = KeyExtractionStats::default();
        let Some(names) = table.column_values(columns::CAMPAIGN_NAME) else {
            debug!("Ad-spend sheet has no campaign_name column; skipping key extraction");
            return Ok((table, stats));
        };

        let mut keys: [Vec<Value>; 5] = Default::default();
        for name in names {
            let text = name.to_text();
            match CampaignKeyExtractor::extract(text.as_deref()) {
                Ok(key) => {
                    stats.matched += 1;
                    let parts = [
                        key.articleid,
                        key.creative_type,
                        key.version,
                        key.author,
                        key.media,
                    ];
                    for (column, part) in keys.iter_mut().zip(parts) {
                        column.push(Value::Str(part));
                    }
                }
                Err(err) => {
                    stats.failed += 1;
                    if let KeyExtractionError::NoMatch(name) = &err {
                        if stats.unmatched_samples.len() < UNMATCHED_SAMPLE_LIMIT {
                            stats.unmatched_samples.push(name.clone());
                        }
                    }
                    debug!(error = %err, "Campaign key extraction failed");
                    for column in keys.iter_mut() {
                        column.push(Value::Missing);
                    }
                }
            }
        }

        let key_columns = [
            columns::ARTICLE_ID,
            columns::TYPE,
            columns::VERSION,
            columns::AUTHOR,
            columns::MEDIA,
        ];
        for (column, values) in key_columns.into_iter().zip(keys) {
            table.set_column(column, values);
        }

        if stats.failed > 0 {
            warn!(
                matched = stats.matched,
                failed = stats.failed,
                "Some campaign names did not yield a creative key"
            );
        }
        Ok((table, stats))
    }
}

impl SourceNormalizer for AdSpendNormalizer {
    fn kind(&self) -> SourceKind {
        SourceKind::AdSpend
    }

    fn normalize(&self, raw: &Table) -> Result<Table> {
        self.normalize_with_stats(raw).map(|(table, _)| table)
    }
}

/// Ad Manager revenue sheet: date and zero-filled revenue columns.
#[derive(Debug, Clone, Copy, Default)]
pub struct RevenueNormalizer {
    pub date_policy: DatePolicy,
}

impl SourceNormalizer for RevenueNormalizer {
    fn kind(&self) -> SourceKind {
        SourceKind::Revenue
    }

    fn normalize(&self, raw: &Table) -> Result<Table> {
        let mut table = canonicalize_columns(raw);
        coerce_date(&mut table, columns::DATE, self.date_policy)?;
        for col in [columns::BANNER_REVENUE, columns::VIDEO_REVENUE] {
            coerce_numeric(&mut table, col, true);
        }
        Ok(table)
    }
}

/// Campaign → adset mapping: column names only.
#[derive(Debug, Clone, Copy, Default)]
pub struct MappingNormalizer;

impl SourceNormalizer for MappingNormalizer {
    fn kind(&self) -> SourceKind {
        SourceKind::Mapping
    }

    fn normalize(&self, raw: &Table) -> Result<Table> {
        Ok(canonicalize_columns(raw))
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn day(y: i32, m: u32, d: u32) -> Value {
        Value::DateTime(
            NaiveDate::from_ymd_opt(y, m, d)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap(),
        )
    }

    fn raw_ad_spend() -> Table {
        Table::from_rows(
            "ad_spend",
            vec![" Campaign ID", "Date ", "Spend", "Clicks", "Campaign Name"],
            vec![
                vec![
                    Value::Int(1),
                    Value::str("2024-03-01"),
                    Value::str("12.5"),
                    Value::Int(5),
                    Value::str("1042 quiz v3 android (Jane Doe) video"),
                ],
                vec![
                    Value::Int(2),
                    Value::str("2024-03-02"),
                    Value::str("n/a"),
                    Value::Missing,
                    Value::str("random text"),
                ],
            ],
        )
    }

    // ── canonical_column_name ─────────────────────────────────────────────────

    #[test]
    fn test_canonical_column_name() {
        assert_eq!(canonical_column_name(" Campaign Name "), "campaign_name");
        assert_eq!(canonical_column_name("Banner Revenue"), "banner_revenue");
        assert_eq!(canonical_column_name("created date"), "created_date");
    }

    #[test]
    fn test_canonical_column_name_idempotent() {
        for name in [" Ad Set ID", "VIDEO revenue", "already_canonical"] {
            let once = canonical_column_name(name);
            assert_eq!(canonical_column_name(&once), once);
        }
    }

    // ── to_numeric ────────────────────────────────────────────────────────────

    #[test]
    fn test_to_numeric_variants() {
        assert_eq!(to_numeric(&Value::Int(3)), Value::Float(3.0));
        assert_eq!(to_numeric(&Value::str(" 4.25 ")), Value::Float(4.25));
        assert_eq!(to_numeric(&Value::str("abc")), Value::Missing);
        assert_eq!(to_numeric(&Value::str("")), Value::Missing);
        assert_eq!(to_numeric(&Value::Missing), Value::Missing);
    }

    // ── CreativeNormalizer ────────────────────────────────────────────────────

    #[test]
    fn test_creative_normalizer_coerces_fields() {
        let raw = Table::from_rows(
            "creative",
            vec!["Created Date", "ArticleID", "Author", "Type", "Media", "Version", "Headline"],
            vec![vec![
                Value::str("2024-01-15"),
                Value::Int(1042),
                Value::str("  Jane Doe "),
                Value::str("quiz "),
                Value::str(" video"),
                Value::str("v3"),
                Value::str("Ten facts"),
            ]],
        );
        let out = CreativeNormalizer::default().normalize(&raw).unwrap();

        assert_eq!(out.get(0, "created_date"), Some(&day(2024, 1, 15)));
        assert_eq!(out.get(0, "articleid"), Some(&Value::str("1042")));
        assert_eq!(out.get(0, "author"), Some(&Value::str("Jane Doe")));
        assert_eq!(out.get(0, "type"), Some(&Value::str("quiz")));
        assert_eq!(out.get(0, "media"), Some(&Value::str("video")));
        assert_eq!(out.get(0, "headline"), Some(&Value::str("Ten facts")));
        // Raw input untouched.
        assert_eq!(raw.columns()[0], "Created Date");
    }

    #[test]
    fn test_creative_normalizer_absent_fields_are_fine() {
        let raw = Table::from_rows("creative", vec!["Headline"], vec![vec![Value::str("h")]]);
        let out = CreativeNormalizer::default().normalize(&raw).unwrap();
        assert_eq!(out.columns(), &["headline"]);
    }

    #[test]
    fn test_creative_normalizer_keeps_missing_author_missing() {
        let raw = Table::from_rows("creative", vec!["author"], vec![vec![Value::Missing]]);
        let out = CreativeNormalizer::default().normalize(&raw).unwrap();
        assert_eq!(out.get(0, "author"), Some(&Value::Missing));
    }

    #[test]
    fn test_creative_normalization_idempotent() {
        let raw = Table::from_rows(
            "creative",
            vec!["Created Date", "ArticleID", "Author", "Type", "Media", "Version"],
            vec![
                vec![
                    Value::str("2024-01-15"),
                    Value::Int(1042),
                    Value::str("  Jane Doe "),
                    Value::str("quiz "),
                    Value::str(" video"),
                    Value::str("v3"),
                ],
                vec![
                    Value::Missing,
                    Value::Float(77.5),
                    Value::Missing,
                    Value::str("list"),
                    Value::Missing,
                    Value::str(" v1"),
                ],
            ],
        );
        let normalizer = CreativeNormalizer::default();
        let once = normalizer.normalize(&raw).unwrap();
        let twice = normalizer.normalize(&once).unwrap();
        assert_eq!(once, twice);
        assert_eq!(twice.get(0, "articleid"), Some(&Value::str("1042")));
        assert_eq!(twice.get(0, "author"), Some(&Value::str("Jane Doe")));
    }

    // ── AdSpendNormalizer ─────────────────────────────────────────────────────

    #[test]
    fn test_ad_spend_normalizer_coerces_and_extracts() {
        let (out, stats) = AdSpendNormalizer::default()
            .normalize_with_stats(&raw_ad_spend())
            .unwrap();

        assert_eq!(out.get(0, "date"), Some(&day(2024, 3, 1)));
        assert_eq!(out.get(0, "spend"), Some(&Value::Float(12.5)));
        assert_eq!(out.get(0, "clicks"), Some(&Value::Float(5.0)));
        assert_eq!(out.get(0, "articleid"), Some(&Value::str("1042")));
        assert_eq!(out.get(0, "type"), Some(&Value::str("quiz")));
        assert_eq!(out.get(0, "version"), Some(&Value::str("v3")));
        assert_eq!(out.get(0, "author"), Some(&Value::str("Jane Doe")));
        assert_eq!(out.get(0, "media"), Some(&Value::str("video")));

        assert_eq!(stats.matched, 1);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.unmatched_samples, vec!["random text".to_string()]);
    }

    #[test]
    fn test_ad_spend_unmatched_row_kept_with_missing_keys() {
        let out = AdSpendNormalizer::default().normalize(&raw_ad_spend()).unwrap();

        assert_eq!(out.len(), 2);
        assert_eq!(out.get(1, "campaign_id"), Some(&Value::Int(2)));
        // Unparsable spend stays missing for the ad-spend source.
        assert_eq!(out.get(1, "spend"), Some(&Value::Missing));
        for col in columns::CREATIVE_KEY {
            assert_eq!(out.get(1, col), Some(&Value::Missing), "column {col}");
        }
    }

    #[test]
    fn test_ad_spend_extraction_overwrites_existing_columns() {
        let raw = Table::from_rows(
            "ad_spend",
            vec!["campaign_name", "author"],
            vec![vec![
                Value::str("1 quiz v1 android (New) video"),
                Value::str("Old"),
            ]],
        );
        let out = AdSpendNormalizer::default().normalize(&raw).unwrap();
        assert_eq!(out.width(), 6);
        assert_eq!(out.get(0, "author"), Some(&Value::str("New")));
    }

    #[test]
    fn test_ad_spend_strict_date_policy_fails() {
        let raw = Table::from_rows("ad_spend", vec!["date"], vec![vec![Value::str("soon")]]);
        let err = AdSpendNormalizer::default().normalize(&raw).unwrap_err();
        match err {
            EtlError::DateParse { row, value, .. } => {
                assert_eq!(row, 0);
                assert_eq!(value, "soon");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_ad_spend_lenient_date_policy_drops() {
        let raw = Table::from_rows("ad_spend", vec!["date"], vec![vec![Value::str("soon")]]);
        let normalizer = AdSpendNormalizer {
            date_policy: DatePolicy::Lenient,
        };
        let out = normalizer.normalize(&raw).unwrap();
        assert_eq!(out.get(0, "date"), Some(&Value::Missing));
    }

    #[test]
    fn test_ad_spend_normalization_idempotent() {
        let normalizer = AdSpendNormalizer::default();
        let once = normalizer.normalize(&raw_ad_spend()).unwrap();
        let twice = normalizer.normalize(&once).unwrap();
        assert_eq!(once, twice);
    }

    // ── RevenueNormalizer ─────────────────────────────────────────────────────

    #[test]
    fn test_revenue_normalizer_fills_zero() {
        let raw = Table::from_rows(
            "revenue",
            vec!["Adset ID", "Date", "Banner Revenue", "Video Revenue"],
            vec![vec![
                Value::Int(10),
                Value::str("2024-03-01"),
                Value::str("bad"),
                Value::Missing,
            ]],
        );
        let out = RevenueNormalizer::default().normalize(&raw).unwrap();
        assert_eq!(out.get(0, "adset_id"), Some(&Value::Int(10)));
        assert_eq!(out.get(0, "banner_revenue"), Some(&Value::Float(0.0)));
        assert_eq!(out.get(0, "video_revenue"), Some(&Value::Float(0.0)));
    }

    #[test]
    fn test_revenue_normalization_idempotent() {
        let raw = Table::from_rows(
            "revenue",
            vec!["Date", "Banner Revenue"],
            vec![vec![Value::str("2024-03-01"), Value::str("1.5")]],
        );
        let normalizer = RevenueNormalizer::default();
        let once = normalizer.normalize(&raw).unwrap();
        assert_eq!(normalizer.normalize(&once).unwrap(), once);
    }

    // ── MappingNormalizer ─────────────────────────────────────────────────────

    #[test]
    fn test_mapping_normalizer_only_renames() {
        let raw = Table::from_rows(
            "mapping",
            vec!["Campaign ID", "Adset ID"],
            vec![vec![Value::Int(1), Value::Int(10)]],
        );
        let out = MappingNormalizer.normalize(&raw).unwrap();
        assert_eq!(out.columns(), &["campaign_id", "adset_id"]);
        assert_eq!(out.rows(), raw.rows());
        assert_eq!(MappingNormalizer.kind(), SourceKind::Mapping);
    }

    #[test]
    fn test_mapping_normalization_idempotent() {
        let raw = Table::from_rows(
            "mapping",
            vec![" Campaign ID ", "Adset-ID"],
            vec![vec![Value::Int(1), Value::Int(10)], vec![Value::Missing, Value::Int(11)]],
        );
        let once = MappingNormalizer.normalize(&raw).unwrap();
        assert_eq!(MappingNormalizer.normalize(&once).unwrap(), once);
    }
}
