//! Manually maintained market price table.
//!
//! There is no public machine-readable price feed; these ranges are copied
//! from DA price monitoring reports and updated by hand.

use serde::Serialize;

use crate::{ContextPayload, ContextProvider, ContextSource, FetchRequest, ProviderResult};

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PriceRange {
    pub item: &'static str,
    pub range: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PriceCategory {
    pub name: &'static str,
    pub items: &'static [PriceRange],
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MarketPrices {
    pub last_updated: &'static str,
    pub categories: &'static [PriceCategory],
    pub source: &'static str,
    pub note: &'static str,
}

impl MarketPrices {
    pub fn category(&self, name: &str) -> Option<&'static PriceCategory> {
        self.categories.iter().find(|c| c.name == name)
    }

    /// Price of one item in one category, e.g. `("rice", "regular_milled")`.
    pub fn lookup(&self, category: &str, item: &str) -> Option<&'static str> {
        self.category(category)?
            .items
            .iter()
            .find(|p| p.item == item)
            .map(|p| p.range)
    }

    pub fn is_empty(&self) -> bool {
        self.categories.iter().all(|c| c.items.is_empty())
    }
}

pub const MARKET_PRICES: MarketPrices = MarketPrices {
    last_updated: "2024-11",
    categories: &[
        PriceCategory {
            name: "rice",
            items: &[
                PriceRange { item: "regular_milled", range: "45-50 PHP/kg" },
                PriceRange { item: "well_milled", range: "50-55 PHP/kg" },
                PriceRange { item: "premium", range: "55-65 PHP/kg" },
            ],
        },
        PriceCategory {
            name: "corn",
            items: &[
                PriceRange { item: "yellow", range: "20-25 PHP/kg" },
                PriceRange { item: "white", range: "18-23 PHP/kg" },
            ],
        },
        PriceCategory {
            name: "vegetables",
            items: &[
                PriceRange { item: "tomato", range: "60-80 PHP/kg" },
                PriceRange { item: "eggplant", range: "40-60 PHP/kg" },
                PriceRange { item: "cabbage", range: "30-40 PHP/kg" },
                PriceRange { item: "onion", range: "80-120 PHP/kg" },
            ],
        },
        PriceCategory {
            name: "fruits",
            items: &[
                PriceRange { item: "banana", range: "50-70 PHP/kg" },
                PriceRange { item: "mango", range: "80-120 PHP/kg" },
                PriceRange { item: "papaya", range: "30-50 PHP/kg" },
            ],
        },
    ],
    source: "DA Price Monitoring",
    note: "Prices vary by region and market",
};

pub struct MarketPriceProvider;

impl ContextProvider for MarketPriceProvider {
    fn source(&self) -> ContextSource {
        ContextSource::MarketPrices
    }

    fn fetch(&self, _request: &FetchRequest) -> ProviderResult {
        Ok(Some(ContextPayload::MarketPrices(MARKET_PRICES)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_finds_rice_regular_milled() {
        assert_eq!(
            MARKET_PRICES.lookup("rice", "regular_milled"),
            Some("45-50 PHP/kg")
        );
        assert_eq!(MARKET_PRICES.lookup("rice", "jasmine"), None);
        assert_eq!(MARKET_PRICES.lookup("coffee", "arabica"), None);
        assert!(!MARKET_PRICES.is_empty());
    }
}
