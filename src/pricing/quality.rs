use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer};
use std::collections::HashMap;

/// Condition grades the marketplace lists price suggestions under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QualityTier {
    Mint,
    NearMint,
    VeryGoodPlus,
    VeryGood,
    GoodPlus,
    Good,
    Fair,
    Poor,
}

/// Tiers consulted for the representative price, in order of precedence.
/// This is not a best-to-worst ranking; tiers missing from it are never used.
pub const TIER_PREFERENCE: [QualityTier; 5] = [
    QualityTier::GoodPlus,
    QualityTier::VeryGoodPlus,
    QualityTier::NearMint,
    QualityTier::Mint,
    QualityTier::VeryGood,
];

impl QualityTier {
    pub fn label(&self) -> &'static str {
        match self {
            QualityTier::Mint => "Mint (M)",
            QualityTier::NearMint => "Near Mint (NM or M-)",
            QualityTier::VeryGoodPlus => "Very Good Plus (VG+)",
            QualityTier::VeryGood => "Very Good (VG)",
            QualityTier::GoodPlus => "Good Plus (G+)",
            QualityTier::Good => "Good (G)",
            QualityTier::Fair => "Fair (F)",
            QualityTier::Poor => "Poor (P)",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "Mint (M)" => Some(QualityTier::Mint),
            "Near Mint (NM or M-)" => Some(QualityTier::NearMint),
            "Very Good Plus (VG+)" => Some(QualityTier::VeryGoodPlus),
            "Very Good (VG)" => Some(QualityTier::VeryGood),
            "Good Plus (G+)" => Some(QualityTier::GoodPlus),
            "Good (G)" => Some(QualityTier::Good),
            "Fair (F)" => Some(QualityTier::Fair),
            "Poor (P)" => Some(QualityTier::Poor),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SuggestedPrice {
    #[serde(default)]
    pub currency: String,
    pub value: Decimal,
}

/// Suggested prices of one release, keyed by condition.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PriceSuggestions {
    tiers: HashMap<QualityTier, SuggestedPrice>,
}

impl PriceSuggestions {
    pub fn new(tiers: HashMap<QualityTier, SuggestedPrice>) -> Self {
        Self { tiers }
    }

    pub fn get(&self, tier: QualityTier) -> Option<&SuggestedPrice> {
        self.tiers.get(&tier)
    }

    pub fn is_empty(&self) -> bool {
        self.tiers.is_empty()
    }

    /// First tier of `TIER_PREFERENCE` that has a suggestion.
    pub fn select(&self) -> Option<(QualityTier, &SuggestedPrice)> {
        TIER_PREFERENCE
            .iter()
            .find_map(|tier| self.tiers.get(tier).map(|price| (*tier, price)))
    }
}

impl<'de> Deserialize<'de> for PriceSuggestions {
    /// Accepts the marketplace's `{label: {currency, value}}` map. Unknown labels
    /// and null entries are dropped.
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = HashMap::<String, Option<SuggestedPrice>>::deserialize(deserializer)?;
        let tiers = raw
            .into_iter()
            .filter_map(|(label, price)| Some((QualityTier::from_label(&label)?, price?)))
            .collect();
        Ok(Self { tiers })
    }
}
