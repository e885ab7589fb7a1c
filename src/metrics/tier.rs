//! Three-way efficiency tiers shared by every classifier.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Efficiency bucket for a single measurement or an aggregate rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Efficient,
    Moderate,
    Waste,
}

impl Tier {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Efficient => "Efficient",
            Self::Moderate => "Moderate",
            Self::Waste => "Waste",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// How many measurements landed in each tier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierCounts {
    pub efficient: usize,
    pub moderate: usize,
    pub waste: usize,
}

impl TierCounts {
    pub fn record(&mut self, tier: Tier) {
        match tier {
            Tier::Efficient => self.efficient += 1,
            Tier::Moderate => self.moderate += 1,
            Tier::Waste => self.waste += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.efficient + self.moderate + self.waste
    }
}

impl FromIterator<Tier> for TierCounts {
    fn from_iter<I: IntoIterator<Item = Tier>>(iter: I) -> Self {
        let mut counts = Self::default();
        for tier in iter {
            counts.record(tier);
        }
        counts
    }
}

/// Tier for a "lower is better" value: `< efficient_below` is efficient,
/// `< moderate_below` moderate, anything else waste.
pub fn lower_is_better(value: f64, efficient_below: f64, moderate_below: f64) -> Tier {
    if value < efficient_below {
        Tier::Efficient
    } else if value < moderate_below {
        Tier::Moderate
    } else {
        Tier::Waste
    }
}

/// Tier for a "higher is better" value: `>= efficient_at` is efficient,
/// `>= moderate_at` moderate, anything else waste.
pub fn higher_is_better(value: f64, efficient_at: f64, moderate_at: f64) -> Tier {
    if value >= efficient_at {
        Tier::Efficient
    } else if value >= moderate_at {
        Tier::Moderate
    } else {
        Tier::Waste
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_collect_from_iterator() {
        let counts: TierCounts = [Tier::Efficient, Tier::Waste, Tier::Efficient]
            .into_iter()
            .collect();
        assert_eq!(counts.efficient, 2);
        assert_eq!(counts.moderate, 0);
        assert_eq!(counts.waste, 1);
        assert_eq!(counts.total(), 3);
    }

    #[test]
    fn lower_is_better_boundaries() {
        assert_eq!(lower_is_better(0.0, 0.2, 0.35), Tier::Efficient);
        assert_eq!(lower_is_better(0.2, 0.2, 0.35), Tier::Moderate);
        assert_eq!(lower_is_better(0.35, 0.2, 0.35), Tier::Waste);
    }

    #[test]
    fn higher_is_better_boundaries() {
        assert_eq!(higher_is_better(0.6, 0.6, 0.4), Tier::Efficient);
        assert_eq!(higher_is_better(0.4, 0.6, 0.4), Tier::Moderate);
        assert_eq!(higher_is_better(0.39, 0.6, 0.4), Tier::Waste);
    }

    #[test]
    fn tier_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Tier::Moderate).unwrap(), "\"moderate\"");
        assert_eq!(Tier::Waste.to_string(), "Waste");
    }
}
