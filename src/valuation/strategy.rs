// Draft strategies and their scoring weight vectors.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Named drafting strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    Safe,
    #[default]
    Balanced,
    Upside,
}

impl Strategy {
    pub const ALL: [Strategy; 3] = [Strategy::Safe, Strategy::Balanced, Strategy::Upside];

    /// Strict parse, `None` for unknown names.
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "safe" => Some(Strategy::Safe),
            "balanced" => Some(Strategy::Balanced),
            "upside" => Some(Strategy::Upside),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::Safe => "safe",
            Strategy::Balanced => "balanced",
            Strategy::Upside => "upside",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Multipliers applied to each score component (w1..w7).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StrategyWeights {
    pub vorp: f64,
    pub adp_discount: f64,
    pub need: f64,
    pub scarcity: f64,
    pub bye: f64,
    pub injury: f64,
    pub upside: f64,
}

impl StrategyWeights {
    pub const SAFE: StrategyWeights = StrategyWeights {
        vorp: 1.1,
        adp_discount: 0.30,
        need: 0.6,
        scarcity: 0.25,
        bye: 0.08,
        injury: 0.18,
        upside: 0.05,
    };

    pub const BALANCED: StrategyWeights = StrategyWeights {
        vorp: 1.0,
        adp_discount: 0.35,
        need: 0.5,
        scarcity: 0.30,
        bye: 0.05,
        injury: 0.15,
        upside: 0.10,
    };

    pub const UPSIDE: StrategyWeights = StrategyWeights {
        vorp: 1.0,
        adp_discount: 0.35,
        need: 0.4,
        scarcity: 0.35,
        bye: 0.03,
        injury: 0.10,
        upside: 0.25,
    };

    /// Named weights paired with their values, for validation and logging.
    pub fn named(&self) -> [(&'static str, f64); 7] {
        [
            ("vorp", self.vorp),
            ("adp_discount", self.adp_discount),
            ("need", self.need),
            ("scarcity", self.scarcity),
            ("bye", self.bye),
            ("injury", self.injury),
            ("upside", self.upside),
        ]
    }
}

/// Weight vectors for every strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightTable {
    pub safe: StrategyWeights,
    pub balanced: StrategyWeights,
    pub upside: StrategyWeights,
}

impl Default for WeightTable {
    fn default() -> Self {
        WeightTable {
            safe: StrategyWeights::SAFE,
            balanced: StrategyWeights::BALANCED,
            upside: StrategyWeights::UPSIDE,
        }
    }
}

impl WeightTable {
    /// Weight vector for a strategy. Callers that accept free-form names map
    /// anything [`Strategy::parse`] rejects to `Strategy::default()`, which is
    /// `Balanced`.
    pub fn weights_for(&self, strategy: Strategy) -> &StrategyWeights {
        match strategy {
            Strategy::Safe => &self.safe,
            Strategy::Balanced => &self.balanced,
            Strategy::Upside => &self.upside,
        }
    }
}
