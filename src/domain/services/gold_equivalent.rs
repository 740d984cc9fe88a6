use crate::domain::errors::ConfigError;
use crate::domain::value_objects::reading::Metal;

/// Ounces of silver counted as one ounce of gold
pub const SILVER_GOLD_RATIO: f64 = 80.0;

/// Converts metal quantities to gold-equivalent ounces before they become readings
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GoldEquivalence {
    silver_per_gold: f64,
}

impl GoldEquivalence {
    pub fn new(silver_per_gold: f64) -> Result<Self, ConfigError> {
        if !silver_per_gold.is_finite() || silver_per_gold <= 0.0 {
            return Err(ConfigError::InvalidValue {
                key: "silver_gold_ratio".to_string(),
                value: silver_per_gold.to_string(),
            });
        }
        Ok(Self { silver_per_gold })
    }

    pub fn ratio(&self) -> f64 {
        self.silver_per_gold
    }

    /// `None` for negative or non-finite quantities
    pub fn to_gold(&self, metal: Metal, quantity: f64) -> Option<f64> {
        if !quantity.is_finite() || quantity < 0.0 {
            return None;
        }
        match metal {
            Metal::Gold | Metal::GoldEquivalent => Some(quantity),
            Metal::Silver => Some(quantity / self.silver_per_gold),
        }
    }
}

impl Default for GoldEquivalence {
    fn default() -> Self {
        Self {
            silver_per_gold: SILVER_GOLD_RATIO,
        }
    }
}
