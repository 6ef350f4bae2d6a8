//! Left joins that assemble the fact table.
//!
//! The ad-spend sheet is the anchor: every ad-spend row survives each join,
//! once per matching right-hand row, or once with missing right-hand fields
//! when nothing matches.

use std::collections::{HashMap, HashSet};

use etl_core::error::Result;
use etl_core::models::{columns, KeyPart, Table, Value};
use tracing::{info, warn};

/// Suffixes applied to non-key columns present on both sides of a join.
const LEFT_SUFFIX: &str = "_x";
const RIGHT_SUFFIX: &str = "_y";

fn row_key(row: &[Value], indices: &[usize]) -> Option<Vec<KeyPart>> {
    indices.iter().map(|&i| row[i].key()).collect()
}

/// Left join `left` with `right` on the named key columns.
///
/// * Left row order is preserved; matches follow right-table order.
/// * Keys compare exactly; a key with any missing part never matches.
/// * Right-hand key columns are not repeated in the output.
/// * Non-key columns present on both sides get `_x` / `_y` suffixes.
pub fn left_join(left: &Table, right: &Table, on: &[&str], name: &str) -> Result<Table> {
    let left_keys = on
        .iter()
        .map(|c| left.require_column(c))
        .collect::<Result<Vec<_>>>()?;
    let right_keys = on
        .iter()
        .map(|c| right.require_column(c))
        .collect::<Result<Vec<_>>>()?;

    let right_payload: Vec<usize> = (0..right.width())
        .filter(|i| !right_keys.contains(i))
        .collect();

    let left_names: HashSet<&str> = left.columns().iter().map(String::as_str).collect();
    let overlapping: HashSet<&str> = right_payload
        .iter()
        .map(|&i| right.columns()[i].as_str())
        .filter(|c| left_names.contains(c) && !on.contains(c))
        .collect();

    let mut out_columns: Vec<String> = left
        .columns()
        .iter()
        .map(|c| {
            if overlapping.contains(c.as_str()) {
                format!("{c}{LEFT_SUFFIX}")
            } else {
                c.clone()
            }
        })
        .collect();
    out_columns.extend(right_payload.iter().map(|&i| {
        let c = &right.columns()[i];
        if overlapping.contains(c.as_str()) {
            format!("{c}{RIGHT_SUFFIX}")
        } else {
            c.clone()
        }
    }));

    let mut index: HashMap<Vec<KeyPart>, Vec<usize>> = HashMap::new();
    for (i, row) in right.rows().iter().enumerate() {
        if let Some(key) = row_key(row, &right_keys) {
            index.entry(key).or_default().push(i);
        }
    }

    let mut out = Table::new(name, out_columns);
    for row in left.rows() {
        let matches = row_key(row, &left_keys).and_then(|key| index.get(&key));
        match matches {
            Some(right_rows) => {
                for &r in right_rows {
                    let right_row = &right.rows()[r];
                    let mut joined = row.clone();
                    joined.extend(right_payload.iter().map(|&i| right_row[i].clone()));
                    out.push_row(joined);
                }
            }
            None => {
                let mut joined = row.clone();
                joined.resize(row.len() + right_payload.len(), Value::Missing);
                out.push_row(joined);
            }
        }
    }

    Ok(out)
}

// ── FactJoiner ────────────────────────────────────────────────────────────────

/// The fixed three-step join sequence anchored on ad spend.
pub struct FactJoiner;

impl FactJoiner {
    pub const MAPPING_KEY: [&'static str; 1] = [columns::CAMPAIGN_ID];
    pub const REVENUE_KEY: [&'static str; 2] = [columns::ADSET_ID, columns::DATE];
    pub const CREATIVE_KEY: [&'static str; 5] = columns::CREATIVE_KEY;

    /// Join the normalized sources into the un-enriched fact table.
    ///
    /// Each step depends on a column produced by the one before it, so the
    /// order is fixed. Fan-out from non-unique right keys is kept and logged.
    pub fn join(
        ad_spend: &Table,
        mapping: &Table,
        revenue: &Table,
        creative: &Table,
    ) -> Result<Table> {
        let steps: [(&Table, &[&str], &str); 3] = [
            (mapping, &Self::MAPPING_KEY, "ad_spend_mapping"),
            (revenue, &Self::REVENUE_KEY, "ad_spend_mapping_revenue"),
            (creative, &Self::CREATIVE_KEY, "fact_creative_performance"),
        ];

        let mut current = ad_spend.clone();
        for (right, on, name) in steps {
            let before = current.len();
            current = left_join(&current, right, on, name)?;
            info!(
                step = name,
                on = %on.join(","),
                rows = current.len(),
                columns = current.width(),
                "Joined {}",
                right.name()
            );
            if current.len() > before {
                warn!(
                    step = name,
                    extra_rows = current.len() - before,
                    "Join fanned out on non-unique right-hand key"
                );
            }
        }
        Ok(current)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
