//! Sustainability dataset: CSV loading and coarse aggregates.
//!
//! The dataset is a CSV with one row per AI initiative. Only a handful of
//! columns are aggregated; every column is passed through to clients as-is.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use anyhow::{Context, Result};
use regex::Regex;
use serde::Serialize;

pub const CO2_TONS: &str = "Carbon Footprint Reduction (CO2 Tons)";
pub const RESOURCE_TONS: &str = "Resource Savings (Metric Tons)";
pub const ADOPTION_RATE: &str = "AI Adoption Rate (%)";
pub const COST_REDUCTION: &str = "Cost Reduction ($ Million)";
pub const ROI_YEARS: &str = "ROI (Years)";
pub const EFFICIENCY_IMPROVEMENT: &str = "AI Efficiency Improvement (%)";
pub const IMPACT_SCORE: &str = "Impact Score (1-10)";
pub const APPLICATION_AREA: &str = "AI Application Area";
pub const DESCRIPTION: &str = "Description";

/// Energy proxy: kWh per ton of CO2 reduction.
const KWH_PER_CO2_TON: f64 = 400.0;

static NON_NUMERIC_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^0-9.\-]").expect("valid regex"));
static LEADING_NUMBER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^-?(\d+\.?\d*|\.\d+)").expect("valid regex"));

/// One CSV row keyed by header.
pub type Row = BTreeMap<String, String>;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Dataset {
    pub headers: Vec<String>,
    pub rows: Vec<Row>,
}

/// Lenient number parsing: strip everything but digits, `.` and `-`, then
/// read the longest leading number, so ranges like `12.5-15` keep their
/// lower bound. Anything unparseable counts as 0.
pub fn parse_number(value: &str) -> f64 {
    let cleaned = NON_NUMERIC_RE.replace_all(value, "");
    LEADING_NUMBER_RE
        .find(&cleaned)
        .and_then(|m| m.as_str().parse::<f64>().ok())
        .filter(|n| n.is_finite())
        .unwrap_or(0.0)
}

impl Dataset {
    /// Parse CSV text. Short rows are padded with empty strings.
    pub fn parse(content: &str) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::Headers)
            .from_reader(content.as_bytes());

        let headers: Vec<String> = reader
            .headers()
            .context("Failed to read CSV header")?
            .iter()
            .map(str::to_string)
            .collect();

        let mut rows = Vec::new();
        for (line, record) in reader.records().enumerate() {
            let record = record.with_context(|| format!("Failed to parse CSV row {}", line + 1))?;
            let row: Row = headers
                .iter()
                .enumerate()
                .map(|(i, h)| (h.clone(), record.get(i).unwrap_or("").to_string()))
                .collect();
            rows.push(row);
        }

        Ok(Self { headers, rows })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn column<'a>(&'a self, name: &'a str) -> impl Iterator<Item = f64> + 'a {
        self.rows
            .iter()
            .map(move |r| r.get(name).map_or(0.0, |v| parse_number(v)))
    }

    fn column_mean(&self, name: &str) -> f64 {
        if self.rows.is_empty() {
            return 0.0;
        }
        self.column(name).sum::<f64>() / self.rows.len() as f64
    }

    pub fn aggregates(&self) -> Aggregates {
        let co2_tons: f64 = self.column(CO2_TONS).sum();
        let resource_tons: f64 = self.column(RESOURCE_TONS).sum();

        Aggregates {
            ai_queries: self.rows.len(),
            co2_kg: (co2_tons * 1000.0).round(),
            energy_kwh: (co2_tons * KWH_PER_CO2_TON).round(),
            water_l: (resource_tons * 1000.0).round(),
            adoption_avg: self.column_mean(ADOPTION_RATE).round(),
        }
    }

    pub fn report(&self, top: usize) -> Report {
        let mut initiatives: Vec<Initiative> = self
            .rows
            .iter()
            .map(|r| {
                let num = |name: &str| r.get(name).map_or(0.0, |v| parse_number(v));
                Initiative {
                    area: r.get(APPLICATION_AREA).cloned().unwrap_or_default(),
                    description: r.get(DESCRIPTION).cloned().unwrap_or_default(),
                    impact_score: num(IMPACT_SCORE),
                    efficiency_improvement: num(EFFICIENCY_IMPROVEMENT),
                    carbon_reduction: num(CO2_TONS),
                    adoption_rate: num(ADOPTION_RATE),
                }
            })
            .collect();
        // Stable, so equal scores keep file order.
        initiatives.sort_by(|a, b| b.impact_score.total_cmp(&a.impact_score));
        initiatives.truncate(top);

        Report {
            total_carbon_saved_tons: self.column(CO2_TONS).sum(),
            total_resource_savings_tons: self.column(RESOURCE_TONS).sum(),
            total_cost_reduction_musd: self.column(COST_REDUCTION).sum(),
            avg_roi_years: self.column_mean(ROI_YEARS),
            avg_adoption_rate: self.column_mean(ADOPTION_RATE),
            avg_efficiency_improvement: self.column_mean(EFFICIENCY_IMPROVEMENT),
            top_initiatives: initiatives,
        }
    }
}

/// Coarse awareness-meter figures, all rounded to whole units.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Aggregates {
    pub ai_queries: usize,
    pub co2_kg: f64,
    #[serde(rename = "energyKWh")]
    pub energy_kwh: f64,
    #[serde(rename = "waterL")]
    pub water_l: f64,
    pub adoption_avg: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Initiative {
    pub area: String,
    pub description: String,
    pub impact_score: f64,
    pub efficiency_improvement: f64,
    pub carbon_reduction: f64,
    pub adoption_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub total_carbon_saved_tons: f64,
    pub total_resource_savings_tons: f64,
    #[serde(rename = "totalCostReductionMillionUSD")]
    pub total_cost_reduction_musd: f64,
    #[serde(rename = "avgROIYears")]
    pub avg_roi_years: f64,
    pub avg_adoption_rate: f64,
    pub avg_efficiency_improvement: f64,
    pub top_initiatives: Vec<Initiative>,
}

/// Dataset location from config, with `~/` expanded.
pub fn resolve_path(path: &str) -> PathBuf {
    crate::utils::expand_home(path)
}

/// Raw file contents, or `None` when the file does not exist.
pub fn read_raw(path: &Path) -> Result<Option<String>> {
    if !path.exists() {
        return Ok(None);
    }
    std::fs::read_to_string(path)
        .map(Some)
        .with_context(|| format!("Failed to read dataset {}", path.display()))
}

/// Load and parse the dataset, or `None` when the file does not exist.
pub fn load(path: &Path) -> Result<Option<(String, Dataset)>> {
    let Some(content) = read_raw(path)? else {
        return Ok(None);
    };
    let dataset = Dataset::parse(&content)
        .with_context(|| format!("Failed to parse dataset {}", path.display()))?;
    Ok(Some((content, dataset)))
}
