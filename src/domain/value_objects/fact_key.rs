use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::errors::ConfigError;
use crate::domain::value_objects::reading::Metal;

/// Identifies one reconcilable fact about a company.
///
/// The snake_case name doubles as the storage column and the read API field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FactKey {
    StockPrice,
    MarketCap,
    SharesOutstanding,
    EnterpriseValue,
    Cash,
    Debt,
    Revenue,
    NetIncome,
    ReservesAuEqMoz,
    ResourcesAuEqMoz,
    PotentialAuEqMoz,
    ReservesGoldMoz,
    ReservesSilverMoz,
    ResourcesGoldMoz,
    ResourcesSilverMoz,
    PotentialGoldMoz,
    PotentialSilverMoz,
    ProductionAuEqKoz,
    AiscLastYear,
}

impl FactKey {
    pub const ALL: [FactKey; 19] = [
        FactKey::StockPrice,
        FactKey::MarketCap,
        FactKey::SharesOutstanding,
        FactKey::EnterpriseValue,
        FactKey::Cash,
        FactKey::Debt,
        FactKey::Revenue,
        FactKey::NetIncome,
        FactKey::ReservesAuEqMoz,
        FactKey::ResourcesAuEqMoz,
        FactKey::PotentialAuEqMoz,
        FactKey::ReservesGoldMoz,
        FactKey::ReservesSilverMoz,
        FactKey::ResourcesGoldMoz,
        FactKey::ResourcesSilverMoz,
        FactKey::PotentialGoldMoz,
        FactKey::PotentialSilverMoz,
        FactKey::ProductionAuEqKoz,
        FactKey::AiscLastYear,
    ];

    pub fn column(&self) -> &'static str {
        match self {
            FactKey::StockPrice => "stock_price",
            FactKey::MarketCap => "market_cap",
            FactKey::SharesOutstanding => "shares_outstanding",
            FactKey::EnterpriseValue => "enterprise_value",
            FactKey::Cash => "cash",
            FactKey::Debt => "debt",
            FactKey::Revenue => "revenue",
            FactKey::NetIncome => "net_income",
            FactKey::ReservesAuEqMoz => "reserves_au_eq_moz",
            FactKey::ResourcesAuEqMoz => "resources_au_eq_moz",
            FactKey::PotentialAuEqMoz => "potential_au_eq_moz",
            FactKey::ReservesGoldMoz => "reserves_gold_moz",
            FactKey::ReservesSilverMoz => "reserves_silver_moz",
            FactKey::ResourcesGoldMoz => "resources_gold_moz",
            FactKey::ResourcesSilverMoz => "resources_silver_moz",
            FactKey::PotentialGoldMoz => "potential_gold_moz",
            FactKey::PotentialSilverMoz => "potential_silver_moz",
            FactKey::ProductionAuEqKoz => "production_au_eq_koz",
            FactKey::AiscLastYear => "aisc_last_year",
        }
    }

    /// Short header used by the terminal table
    pub fn label(&self) -> &'static str {
        match self {
            FactKey::StockPrice => "Price",
            FactKey::MarketCap => "Mkt Cap",
            FactKey::SharesOutstanding => "Shares",
            FactKey::EnterpriseValue => "EV",
            FactKey::Cash => "Cash",
            FactKey::Debt => "Debt",
            FactKey::Revenue => "Revenue",
            FactKey::NetIncome => "Net Income",
            FactKey::ReservesAuEqMoz => "Reserves (Moz)",
            FactKey::ResourcesAuEqMoz => "Resources (Moz)",
            FactKey::PotentialAuEqMoz => "Potential (Moz)",
            FactKey::ReservesGoldMoz => "Reserves Au",
            FactKey::ReservesSilverMoz => "Reserves Ag",
            FactKey::ResourcesGoldMoz => "Resources Au",
            FactKey::ResourcesSilverMoz => "Resources Ag",
            FactKey::PotentialGoldMoz => "Potential Au",
            FactKey::PotentialSilverMoz => "Potential Ag",
            FactKey::ProductionAuEqKoz => "Prod (koz)",
            FactKey::AiscLastYear => "AISC",
        }
    }

    /// Facts expressed in money rather than ounces or share counts
    pub fn is_monetary(&self) -> bool {
        !matches!(self, FactKey::SharesOutstanding | FactKey::ProductionAuEqKoz)
            && self.metal_parts().is_none()
            && self.metal().is_none()
    }

    /// Per-metal facts that add up to a gold-equivalent fact
    pub fn metal_parts(&self) -> Option<[(FactKey, Metal); 2]> {
        match self {
            FactKey::ReservesAuEqMoz => Some([
                (FactKey::ReservesGoldMoz, Metal::Gold),
                (FactKey::ReservesSilverMoz, Metal::Silver),
            ]),
            FactKey::ResourcesAuEqMoz => Some([
                (FactKey::ResourcesGoldMoz, Metal::Gold),
                (FactKey::ResourcesSilverMoz, Metal::Silver),
            ]),
            FactKey::PotentialAuEqMoz => Some([
                (FactKey::PotentialGoldMoz, Metal::Gold),
                (FactKey::PotentialSilverMoz, Metal::Silver),
            ]),
            _ => None,
        }
    }

    /// Metal counted by a per-metal fact
    pub fn metal(&self) -> Option<Metal> {
        match self {
            FactKey::ReservesGoldMoz | FactKey::ResourcesGoldMoz | FactKey::PotentialGoldMoz => {
                Some(Metal::Gold)
            }
            FactKey::ReservesSilverMoz
            | FactKey::ResourcesSilverMoz
            | FactKey::PotentialSilverMoz => Some(Metal::Silver),
            _ => None,
        }
    }
}

impl fmt::Display for FactKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}

impl FromStr for FactKey {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        FactKey::ALL
            .into_iter()
            .find(|key| key.column() == wanted)
            .ok_or_else(|| ConfigError::InvalidValue {
                key: "fact".to_string(),
                value: s.to_string(),
            })
    }
}
