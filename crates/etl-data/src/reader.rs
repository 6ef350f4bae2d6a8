//! Workbook loading for the creative analytics pipeline.
//!
//! The workbook is consumed as a directory holding one CSV export per sheet,
//! e.g. `Facebook Ads data.csv`. Sheet lookup ignores case and treats spaces,
//! underscores and dashes alike.

use std::path::{Path, PathBuf};

use etl_core::error::{EtlError, Result};
use etl_core::models::{SourceKind, Table, Value};
use tracing::{debug, info};

// ── SourceTables ──────────────────────────────────────────────────────────────

/// The four raw sheets, as delivered to the normalizers.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceTables {
    pub creative: Table,
    pub ad_spend: Table,
    pub revenue: Table,
    pub mapping: Table,
}

impl SourceTables {
    pub fn get(&self, kind: SourceKind) -> &Table {
        match kind {
            SourceKind::Creative => &self.creative,
            SourceKind::AdSpend => &self.ad_spend,
            SourceKind::Revenue => &self.revenue,
            SourceKind::Mapping => &self.mapping,
        }
    }
}

/// Anything that can hand the pipeline its four raw tables.
pub trait SourceProvider {
    fn load(&self) -> Result<SourceTables>;
}

impl SourceProvider for SourceTables {
    fn load(&self) -> Result<SourceTables> {
        Ok(self.clone())
    }
}

// ── CsvWorkbook ───────────────────────────────────────────────────────────────

/// A directory of per-sheet CSV exports.
#[derive(Debug, Clone)]
pub struct CsvWorkbook {
    dir: PathBuf,
}

impl CsvWorkbook {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the export for `kind`, if present.
    pub fn locate(&self, kind: SourceKind) -> Option<PathBuf> {
        let wanted = sheet_key(kind.sheet_name());
        find_csv_files(&self.dir).into_iter().find(|path| {
            path.file_stem()
                .map(|stem| sheet_key(&stem.to_string_lossy()) == wanted)
                .unwrap_or(false)
        })
    }

    fn read_sheet(&self, kind: SourceKind) -> Result<Table> {
        let path = self
            .locate(kind)
            .ok_or_else(|| EtlError::MissingSource(kind.sheet_name().to_string()))?;
        let table = read_csv_table(&path, kind.table_name())?;
        info!(
            sheet = kind.sheet_name(),
            rows = table.len(),
            columns = table.width(),
            "Loaded sheet"
        );
        Ok(table)
    }
}

impl SourceProvider for CsvWorkbook {
    /// Read all four sheets; any missing sheet aborts the load.
    fn load(&self) -> Result<SourceTables> {
        if !self.dir.is_dir() {
            return Err(EtlError::DataPathNotFound(self.dir.clone()));
        }
        info!(path = %self.dir.display(), "Reading workbook exports");
        Ok(SourceTables {
            creative: self.read_sheet(SourceKind::Creative)?,
            ad_spend: self.read_sheet(SourceKind::AdSpend)?,
            revenue: self.read_sheet(SourceKind::Revenue)?,
            mapping: self.read_sheet(SourceKind::Mapping)?,
        })
    }
}

// ── Public helpers ────────────────────────────────────────────────────────────

/// Comparison key for sheet names: `"Campaigns_Adsets"` → `"campaigns adsets"`.
pub fn sheet_key(name: &str) -> String {
    name.to_lowercase()
        .split(|c: char| c.is_whitespace() || c == '_' || c == '-')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// All `.csv` files directly inside `dir`, sorted by path.
pub fn find_csv_files(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = walkdir::WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .follow_links(true)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| {
            entry.file_type().is_file()
                && entry
                    .path()
                    .extension()
                    .map(|ext| ext.eq_ignore_ascii_case("csv"))
                    .unwrap_or(false)
        })
        .map(|entry| entry.into_path())
        .collect();

    files.sort();
    files
}

/// Infer a cell's type the way a spreadsheet export would present it.
///
/// Empty → `Missing`, `true`/`false` → `Bool`, integers → `Int`, decimals →
/// `Float`; everything else stays a string, untrimmed.
pub fn infer_cell(raw: &str) -> Value {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Value::Missing;
    }
    if trimmed.eq_ignore_ascii_case("true") {
        return Value::Bool(true);
    }
    if trimmed.eq_ignore_ascii_case("false") {
        return Value::Bool(false);
    }
    if let Ok(i) = trimmed.parse::<i64>() {
        return Value::Int(i);
    }
    // Words such as "inf" or "NaN" parse as floats but are text in a sheet.
    if trimmed.bytes().any(|b| b.is_ascii_digit()) {
        if let Ok(f) = trimmed.parse::<f64>() {
            return Value::float(f);
        }
    }
    Value::Str(raw.to_string())
}

/// Read a headed CSV file into a [`Table`] named `name`.
///
/// Short records are padded with missing cells; a record wider than the
/// header row is a [`EtlError::MalformedRecord`].
pub fn read_csv_table(path: &Path, name: &str) -> Result<Table> {
    let file = std::fs::File::open(path).map_err(|source| EtlError::FileRead {
        path: path.to_path_buf(),
        source,
    })?;

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(file);

    let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
    let mut table = Table::new(name, headers);

    for record in reader.records() {
        let record = record?;
        if record.len() > table.width() {
            return Err(EtlError::MalformedRecord {
                path: path.to_path_buf(),
                line: record.position().map(|p| p.line()).unwrap_or(0),
                expected: table.width(),
                found: record.len(),
            });
        }
        table.push_row(record.iter().map(infer_cell).collect());
    }

    debug!(
        path = %path.display(),
        rows = table.len(),
        "Parsed CSV export"
    );
    Ok(table)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_file(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    fn write_workbook(dir: &Path) {
        write_file(
            dir,
            "Creative backlog.csv",
            "ArticleID,Author,Headline\n1042,Jane Doe,Ten facts\n",
        );
        write_file(
            dir,
            "facebook_ads_data.csv",
            "Campaign ID,Date,Spend\n1,2024-03-01,10.5\n",
        );
        write_file(
            dir,
            "GOOGLE AD MANAGER REVENUE DATA.CSV",
            "Adset ID,Date,Banner Revenue\n11,2024-03-01,3\n",
        );
        write_file(dir, "Campaigns_Adsets.csv", "Campaign ID,Adset ID\n1,11\n");
    }

    // ── infer_cell ────────────────────────────────────────────────────────────

    #[test]
    fn test_infer_cell_types() {
        assert_eq!(infer_cell(""), Value::Missing);
        assert_eq!(infer_cell("   "), Value::Missing);
        assert_eq!(infer_cell("42"), Value::Int(42));
        assert_eq!(infer_cell(" 3.5 "), Value::Float(3.5));
        assert_eq!(infer_cell("TRUE"), Value::Bool(true));
        assert_eq!(infer_cell(" Jane "), Value::str(" Jane "));
        assert_eq!(infer_cell("2024-03-01"), Value::str("2024-03-01"));
    }

    #[test]
    fn test_infer_cell_float_words_stay_text() {
        assert_eq!(infer_cell("inf"), Value::str("inf"));
        assert_eq!(infer_cell("NaN"), Value::str("NaN"));
    }

    // ── sheet_key ─────────────────────────────────────────────────────────────

    #[test]
    fn test_sheet_key_normalises_separators() {
        assert_eq!(sheet_key("Campaigns_Adsets"), "campaigns adsets");
        assert_eq!(sheet_key("facebook-ads  data"), "facebook ads data");
        assert_eq!(sheet_key("Facebook Ads data"), sheet_key("facebook_ads_data"));
    }

    // ── read_csv_table ────────────────────────────────────────────────────────

    #[test]
    fn test_read_csv_table_keeps_raw_headers() {
        let tmp = TempDir::new().unwrap();
        let path = write_file(tmp.path(), "s.csv", " Campaign Name ,Spend\nfoo,1\nbar\n");

        let table = read_csv_table(&path, "ad_spend").unwrap();
        assert_eq!(table.columns(), &[" Campaign Name ", "Spend"]);
        assert_eq!(table.len(), 2);
        assert_eq!(table.get(0, "Spend"), Some(&Value::Int(1)));
        // Short record padded with missing.
        assert_eq!(table.get(1, "Spend"), Some(&Value::Missing));
    }

    #[test]
    fn test_read_csv_table_rejects_overlong_record() {
        let tmp = TempDir::new().unwrap();
        let path = write_file(
            tmp.path(),
            "c.csv",
            "ArticleID,Headline,Author\n1,Ten facts, part two,Ann\n",
        );

        let err = read_csv_table(&path, "creative").unwrap_err();
        match err {
            EtlError::MalformedRecord {
                line,
                expected,
                found,
                ..
            } => {
                assert_eq!(line, 2);
                assert_eq!(expected, 3);
                assert_eq!(found, 4);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_read_csv_table_missing_file() {
        let tmp = TempDir::new().unwrap();
        let err = read_csv_table(&tmp.path().join("nope.csv"), "x").unwrap_err();
        assert!(matches!(err, EtlError::FileRead { .. }));
    }

    // ── CsvWorkbook ───────────────────────────────────────────────────────────

    #[test]
    fn test_workbook_loads_all_sheets() {
        let tmp = TempDir::new().unwrap();
        write_workbook(tmp.path());

        let sources = CsvWorkbook::new(tmp.path()).load().unwrap();
        assert_eq!(sources.creative.len(), 1);
        assert_eq!(sources.ad_spend.get(0, "Spend"), Some(&Value::Float(10.5)));
        assert_eq!(sources.revenue.name(), "revenue");
        assert_eq!(sources.get(SourceKind::Mapping).get(0, "Adset ID"), Some(&Value::Int(11)));
    }

    #[test]
    fn test_workbook_missing_sheet_is_fatal() {
        let tmp = TempDir::new().unwrap();
        write_workbook(tmp.path());
        std::fs::remove_file(tmp.path().join("Campaigns_Adsets.csv")).unwrap();

        let err = CsvWorkbook::new(tmp.path()).load().unwrap_err();
        assert_eq!(err.to_string(), "Source sheet not found: Campaigns_Adsets");
    }

    #[test]
    fn test_workbook_missing_directory() {
        let tmp = TempDir::new().unwrap();
        let err = CsvWorkbook::new(tmp.path().join("absent")).load().unwrap_err();
        assert!(matches!(err, EtlError::DataPathNotFound(_)));
    }

    #[test]
    fn test_find_csv_files_ignores_other_files_and_subdirs() {
        let tmp = TempDir::new().unwrap();
        write_file(tmp.path(), "b.csv", "x\n");
        write_file(tmp.path(), "a.CSV", "x\n");
        write_file(tmp.path(), "notes.txt", "x\n");
        std::fs::create_dir(tmp.path().join("nested")).unwrap();
        write_file(&tmp.path().join("nested"), "c.csv", "x\n");

        let files = find_csv_files(tmp.path());
        let names: Vec<String> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["a.CSV", "b.csv"]);
    }
}
