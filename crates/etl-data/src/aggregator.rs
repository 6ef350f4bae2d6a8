//! Per-author roll-up of the fact table.

use std::collections::{BTreeMap, HashSet};

use etl_core::error::Result;
use etl_core::metrics::round_to;
use etl_core::models::{columns, AuthorSummary, KeyPart, Table};

// ── AuthorStats ───────────────────────────────────────────────────────────────

/// Running totals for one author.
#[derive(Debug, Clone, Default)]
struct AuthorStats {
    campaigns: HashSet<KeyPart>,
    creatives: HashSet<KeyPart>,
    spend: f64,
    revenue: f64,
    profit: f64,
    roi_sum: f64,
    roi_count: u64,
    profitable: u64,
    rows: u64,
}

impl AuthorStats {
    fn into_summary(self, author: String) -> AuthorSummary {
        let avg_roi = (self.roi_count > 0).then(|| self.roi_sum / self.roi_count as f64);
        let success_rate = if self.rows == 0 {
            0.0
        } else {
            round_to(self.profitable as f64 / self.rows as f64 * 100.0, 1)
        };
        AuthorSummary {
            author,
            campaigns: self.campaigns.len() as u64,
            creatives: self.creatives.len() as u64,
            total_spend: self.spend,
            total_revenue: self.revenue,
            total_profit: self.profit,
            avg_roi,
            success_rate,
        }
    }
}

// ── AuthorAggregator ──────────────────────────────────────────────────────────

/// Stateless helper that groups fact rows by author.
pub struct AuthorAggregator;

impl AuthorAggregator {
    /// Summarize `fact` per author.
    ///
    /// Rows without an author are skipped. Sums ignore missing values,
    /// `avg_roi` averages only defined ROI values, and `success_rate` counts
    /// every row of the group. Output is sorted by author.
    pub fn aggregate(fact: &Table) -> Result<Vec<AuthorSummary>> {
        let author_idx = fact.require_column(columns::AUTHOR)?;
        let campaign_idx = fact.require_column(columns::CAMPAIGN_ID)?;
        let headline_idx = fact.require_column(columns::HEADLINE)?;
        let spend_idx = fact.require_column(columns::SPEND)?;
        let revenue_idx = fact.require_column(columns::TOTAL_REVENUE)?;
        let profit_idx = fact.require_column(columns::PROFIT)?;
        let roi_idx = fact.require_column(columns::ROI)?;
        let profitable_idx = fact.require_column(columns::IS_PROFITABLE)?;

        // BTreeMap keeps authors sorted.
        let mut groups: BTreeMap<String, AuthorStats> = BTreeMap::new();

        for row in fact.rows() {
            let Some(author) = row[author_idx].to_text() else {
                continue;
            };
            let stats = groups.entry(author).or_default();

            stats.rows += 1;
            if let Some(k) = row[campaign_idx].key() {
                stats.campaigns.insert(k);
            }
            if let Some(k) = row[headline_idx].key() {
                stats.creatives.insert(k);
            }
            stats.spend += row[spend_idx].as_f64().unwrap_or(0.0);
            stats.revenue += row[revenue_idx].as_f64().unwrap_or(0.0);
            stats.profit += row[profit_idx].as_f64().unwrap_or(0.0);
            if let Some(roi) = row[roi_idx].as_f64() {
                stats.roi_sum += roi;
                stats.roi_count += 1;
            }
            if row[profitable_idx].as_bool().unwrap_or(false) {
                stats.profitable += 1;
            }
        }

        Ok(groups
            .into_iter()
            .map(|(author, stats)| stats.into_summary(author))
            .collect())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
