use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{EtlError, Result};

/// Canonical column names referenced by the pipeline and its output schemas.
pub mod columns {
    pub const CREATED_DATE: &str = "created_date";
    pub const ARTICLE_ID: &str = "articleid";
    pub const AUTHOR: &str = "author";
    pub const TYPE: &str = "type";
    pub const MEDIA: &str = "media";
    pub const VERSION: &str = "version";
    pub const HEADLINE: &str = "headline";

    pub const CAMPAIGN_ID: &str = "campaign_id";
    pub const CAMPAIGN_NAME: &str = "campaign_name";
    pub const DATE: &str = "date";
    pub const SPEND: &str = "spend";
    pub const CLICKS: &str = "clicks";

    pub const ADSET_ID: &str = "adset_id";
    pub const BANNER_REVENUE: &str = "banner_revenue";
    pub const VIDEO_REVENUE: &str = "video_revenue";

    pub const TOTAL_REVENUE: &str = "total_revenue";
    pub const PROFIT: &str = "profit";
    pub const ROI: &str = "roi";
    pub const CPC: &str = "cpc";
    pub const IS_PROFITABLE: &str = "is_profitable";

    /// Natural key of a creative, also produced by campaign-name extraction.
    pub const CREATIVE_KEY: [&str; 5] = [ARTICLE_ID, AUTHOR, TYPE, MEDIA, VERSION];
}

// ── SourceKind ────────────────────────────────────────────────────────────────

/// The four logical input sheets of the creative analytics workbook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Creative,
    AdSpend,
    Revenue,
    Mapping,
}

impl SourceKind {
    pub const ALL: [SourceKind; 4] = [
        SourceKind::Creative,
        SourceKind::AdSpend,
        SourceKind::Revenue,
        SourceKind::Mapping,
    ];

    /// Sheet name as it appears in the exported workbook.
    pub fn sheet_name(self) -> &'static str {
        match self {
            SourceKind::Creative => "Creative backlog",
            SourceKind::AdSpend => "Facebook Ads data",
            SourceKind::Revenue => "Google Ad Manager revenue data",
            SourceKind::Mapping => "Campaigns_Adsets",
        }
    }

    /// Short identifier used for table names and log fields.
    pub fn table_name(self) -> &'static str {
        match self {
            SourceKind::Creative => "creative",
            SourceKind::AdSpend => "ad_spend",
            SourceKind::Revenue => "revenue",
            SourceKind::Mapping => "mapping",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.sheet_name())
    }
}

/// What to do with a date cell that does not parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum DatePolicy {
    /// Abort the run.
    #[default]
    Strict,
    /// Treat the cell as missing and log a warning.
    Lenient,
}

// ── Value ─────────────────────────────────────────────────────────────────────

/// A single typed cell.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(untagged)]
pub enum Value {
    #[default]
    Missing,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    DateTime(NaiveDateTime),
}

/// Hashable projection of a [`Value`] used for join keys and distinct counts.
///
/// Integral numbers are kept exact so that 18-digit platform ids stay
/// distinct; a whole-valued `Float` projects onto the same `Int` key, so
/// `Int(5)` and `Float(5.0)` compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum KeyPart {
    Bool(bool),
    Int(i64),
    /// Bit pattern of a non-integral float.
    Num(u64),
    Str(String),
    DateTime(NaiveDateTime),
}

impl Value {
    pub fn str(s: impl Into<String>) -> Self {
        Value::Str(s.into())
    }

    /// `Float`, mapping NaN to `Missing`.
    pub fn float(f: f64) -> Self {
        if f.is_nan() {
            Value::Missing
        } else {
            Value::Float(f)
        }
    }

    pub fn from_option(f: Option<f64>) -> Self {
        f.map(Value::float).unwrap_or(Value::Missing)
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Value::Missing)
    }

    /// Numeric view of an `Int` or `Float` cell.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) if !f.is_nan() => Some(*f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_datetime(&self) -> Option<NaiveDateTime> {
        match self {
            Value::DateTime(dt) => Some(*dt),
            _ => None,
        }
    }

    /// String form of a present value; `None` for `Missing`.
    pub fn to_text(&self) -> Option<String> {
        if self.is_missing() {
            None
        } else {
            Some(self.to_string())
        }
    }

    /// Key projection; `None` for missing cells, which never match anything.
    pub fn key(&self) -> Option<KeyPart> {
        match self {
            Value::Missing => None,
            Value::Bool(b) => Some(KeyPart::Bool(*b)),
            Value::Int(i) => Some(KeyPart::Int(*i)),
            Value::Float(f) => {
                if f.is_nan() {
                    return None;
                }
                // 2^63 is exactly representable; anything at or past it is out of range.
                if f.fract() == 0.0 && *f >= i64::MIN as f64 && *f < i64::MAX as f64 {
                    Some(KeyPart::Int(*f as i64))
                } else {
                    Some(KeyPart::Num(f.to_bits()))
                }
            }
            Value::Str(s) => Some(KeyPart::Str(s.clone())),
            Value::DateTime(dt) => Some(KeyPart::DateTime(*dt)),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Missing => Ok(()),
            Value::Bool(true) => f.write_str("True"),
            Value::Bool(false) => f.write_str("False"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => {
                if x.is_finite() && x.fract() == 0.0 && x.abs() < 1e16 {
                    write!(f, "{x:.1}")
                } else {
                    write!(f, "{x}")
                }
            }
            Value::Str(s) => f.write_str(s),
            Value::DateTime(dt) => write!(f, "{}", dt.format("%Y-%m-%d %H:%M:%S")),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::float(f)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(dt: NaiveDateTime) -> Self {
        Value::DateTime(dt)
    }
}

// ── Table ─────────────────────────────────────────────────────────────────────

/// An ordered, column-named table of [`Value`] cells.
///
/// Every row has exactly one cell per column.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    name: String,
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl Table {
    pub fn new<S: Into<String>>(name: impl Into<String>, columns: Vec<S>) -> Self {
        Self {
            name: name.into(),
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    /// Build a table from literal rows; short rows are padded with `Missing`.
    pub fn from_rows<S: Into<String>>(
        name: impl Into<String>,
        columns: Vec<S>,
        rows: Vec<Vec<Value>>,
    ) -> Self {
        let mut table = Self::new(name, columns);
        for row in rows {
            table.push_row(row);
        }
        table
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn row(&self, index: usize) -> Option<&[Value]> {
        self.rows.get(index).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn width(&self) -> usize {
        self.columns.len()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Index of `name`, or [`EtlError::MissingColumn`].
    pub fn require_column(&self, name: &str) -> Result<usize> {
        self.column_index(name)
            .ok_or_else(|| EtlError::missing_column(&self.name, name))
    }

    /// Append a row, padding or truncating it to the table width.
    pub fn push_row(&mut self, mut row: Vec<Value>) {
        row.resize(self.columns.len(), Value::Missing);
        self.rows.push(row);
    }

    /// Cell at `(row, column)`; `None` when either is out of range.
    pub fn get(&self, row: usize, column: &str) -> Option<&Value> {
        let idx = self.column_index(column)?;
        self.rows.get(row).map(|r| &r[idx])
    }

    /// All cells of one column in row order.
    pub fn column_values(&self, name: &str) -> Option<Vec<&Value>> {
        let idx = self.column_index(name)?;
        Some(self.rows.iter().map(|r| &r[idx]).collect())
    }

    /// Rename every column through `f`.
    pub fn rename_columns(&mut self, f: impl Fn(&str) -> String) {
        for col in &mut self.columns {
            *col = f(col);
        }
    }

    /// Replace the cells of `name` (appending the column when absent).
    ///
    /// `values` must have one entry per row.
    pub fn set_column(&mut self, name: &str, values: Vec<Value>) {
        debug_assert_eq!(values.len(), self.rows.len());
        match self.column_index(name) {
            Some(idx) => {
                for (row, value) in self.rows.iter_mut().zip(values) {
                    row[idx] = value;
                }
            }
            None => {
                self.columns.push(name.to_string());
                for (row, value) in self.rows.iter_mut().zip(values) {
                    row.push(value);
                }
            }
        }
    }

    /// Rewrite each cell of `name` in place, if the column exists.
    ///
    /// The closure receives the row index and may fail, which aborts the map.
    pub fn try_map_column<F>(&mut self, name: &str, mut f: F) -> Result<bool>
    where
        F: FnMut(usize, &Value) -> Result<Value>,
    {
        let Some(idx) = self.column_index(name) else {
            return Ok(false);
        };
        for (i, row) in self.rows.iter_mut().enumerate() {
            row[idx] = f(i, &row[idx])?;
        }
        Ok(true)
    }

    /// Infallible variant of [`Table::try_map_column`].
    pub fn map_column<F>(&mut self, name: &str, mut f: F) -> bool
    where
        F: FnMut(&Value) -> Value,
    {
        let Some(idx) = self.column_index(name) else {
            return false;
        };
        for row in &mut self.rows {
            row[idx] = f(&row[idx]);
        }
        true
    }
}

// ── AuthorSummary ─────────────────────────────────────────────────────────────

/// One row of the `author_performance_summary` output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthorSummary {
    pub author: String,
    /// Distinct campaign identifiers.
    pub campaigns: u64,
    /// Distinct creative headlines.
    pub creatives: u64,
    pub total_spend: f64,
    pub total_revenue: f64,
    pub total_profit: f64,
    /// Mean ROI over rows where ROI is defined.
    pub avg_roi: Option<f64>,
    /// Share of profitable rows, percent, one decimal.
    pub success_rate: f64,
}

impl AuthorSummary {
    pub const COLUMNS: [&'static str; 8] = [
        "author",
        "campaigns",
        "creatives",
        "total_spend",
        "total_revenue",
        "total_profit",
        "avg_roi",
        "success_rate",
    ];

    fn to_row(&self) -> Vec<Value> {
        vec![
            Value::Str(self.author.clone()),
            Value::Int(self.campaigns as i64),
            Value::Int(self.creatives as i64),
            Value::Float(self.total_spend),
            Value::Float(self.total_revenue),
            Value::Float(self.total_profit),
            Value::from_option(self.avg_roi),
            Value::Float(self.success_rate),
        ]
    }

    /// Render summaries as a table for the persistence sinks.
    pub fn to_table(name: &str, summaries: &[AuthorSummary]) -> Table {
        let rows = summaries.iter().map(AuthorSummary::to_row).collect();
        Table::from_rows(name, Self::COLUMNS.to_vec(), rows)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
