use crate::error::Result;
use crate::models::{columns, Table, Value};

/// Performance metrics derived for a single fact row.
#[derive(Debug, Clone, PartialEq)]
pub struct RowMetrics {
    pub total_revenue: f64,
    /// `None` when spend is missing.
    pub profit: Option<f64>,
    /// `None` unless spend > 0.
    pub roi: Option<f64>,
    /// `None` unless clicks > 0 and spend is known.
    pub cpc: Option<f64>,
    /// Strict `total_revenue > spend`; `false` when spend is missing.
    pub is_profitable: bool,
}

// ── MetricCalculator ──────────────────────────────────────────────────────────

/// Stateless collection of per-row metric derivations.
pub struct MetricCalculator;

impl MetricCalculator {
    /// Derive the metrics for one row.
    ///
    /// Missing revenue operands count as 0. Division by a zero, negative or
    /// missing denominator yields `None`, never infinity.
    pub fn compute(
        spend: Option<f64>,
        clicks: Option<f64>,
        banner_revenue: Option<f64>,
        video_revenue: Option<f64>,
    ) -> RowMetrics {
        let total_revenue = banner_revenue.unwrap_or(0.0) + video_revenue.unwrap_or(0.0);
        let profit = spend.map(|s| total_revenue - s);
        let roi = spend
            .filter(|s| *s > 0.0)
            .map(|s| total_revenue / s)
            .filter(|r| r.is_finite());
        let cpc = match (spend, clicks.filter(|c| *c > 0.0)) {
            (Some(s), Some(c)) => Some(s / c).filter(|q| q.is_finite()),
            _ => None,
        };
        let is_profitable = spend.map(|s| total_revenue > s).unwrap_or(false);

        RowMetrics {
            total_revenue,
            profit,
            roi,
            cpc,
            is_profitable,
        }
    }

    /// Return a copy of the joined table with the metric columns appended.
    ///
    /// `banner_revenue` and `video_revenue` are filled with 0.0 where missing
    /// (and created when absent). `spend` and `clicks` must exist.
    pub fn apply(fact: &Table) -> Result<Table> {
        let spend_idx = fact.require_column(columns::SPEND)?;
        let clicks_idx = fact.require_column(columns::CLICKS)?;

        let mut out = fact.clone();
        for col in [columns::BANNER_REVENUE, columns::VIDEO_REVENUE] {
            if !out.map_column(col, |v| Value::Float(v.as_f64().unwrap_or(0.0))) {
                out.set_column(col, vec![Value::Float(0.0); out.len()]);
            }
        }

        let banner_idx = out.require_column(columns::BANNER_REVENUE)?;
        let video_idx = out.require_column(columns::VIDEO_REVENUE)?;

        let metrics: Vec<RowMetrics> = out
            .rows()
            .iter()
            .map(|row| {
                Self::compute(
                    row[spend_idx].as_f64(),
                    row[clicks_idx].as_f64(),
                    row[banner_idx].as_f64(),
                    row[video_idx].as_f64(),
                )
            })
            .collect();

        out.set_column(
            columns::TOTAL_REVENUE,
            metrics.iter().map(|m| Value::Float(m.total_revenue)).collect(),
        );
        out.set_column(
            columns::PROFIT,
            metrics.iter().map(|m| Value::from_option(m.profit)).collect(),
        );
        out.set_column(
            columns::ROI,
            metrics.iter().map(|m| Value::from_option(m.roi)).collect(),
        );
        out.set_column(
            columns::CPC,
            metrics.iter().map(|m| Value::from_option(m.cpc)).collect(),
        );
        out.set_column(
            columns::IS_PROFITABLE,
            metrics.iter().map(|m| Value::Bool(m.is_profitable)).collect(),
        );

        Ok(out)
    }
}

/// Round to `decimals` places, resolving exact midpoints to the even digit.
pub fn round_to(value: f64, decimals: u32) -> f64 {
    let factor = 10_f64.powi(decimals as i32);
    let scaled = value * factor;
    let rounded = if (scaled - scaled.trunc()).abs() == 0.5 {
        2.0 * (scaled / 2.0).round()
    } else {
        scaled.round()
    };
    rounded / factor
}

// ── Tests ──────────────────────────────────────────────────────────────────────
