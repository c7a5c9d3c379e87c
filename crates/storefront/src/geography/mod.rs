//! Egyptian governorates, cities and shipping costs.
//!
//! The dataset is compiled into the binary. Shipping cost is set per
//! governorate. Address search is fuzzy and tolerant of Arabic spelling
//! variants (see [`normalize`]).

pub mod normalize;
mod search;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use stride_core::Money;

pub use search::{AddressIndex, AddressMatch, MatchKind};

use normalize::normalize;

/// Bundled governorate dataset.
const GOVERNORATES_JSON: &str = include_str!("../../data/governorates.json");

/// Errors from loading or searching the dataset.
#[derive(Debug, Error)]
pub enum GeographyError {
    #[error("Invalid geography data: {0}")]
    Data(#[from] serde_json::Error),

    #[error("Index error: {0}")]
    Index(String),

    #[error("Query error: {0}")]
    Query(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct City {
    pub name_en: String,
    pub name_ar: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Governorate {
    pub id: String,
    pub name_en: String,
    pub name_ar: String,
    pub shipping_cost: Money,
    pub cities: Vec<City>,
}

impl Governorate {
    /// Find a city by English or Arabic name, ignoring spelling variants.
    #[must_use]
    pub fn city(&self, name: &str) -> Option<&City> {
        let wanted = normalize(name);
        if wanted.is_empty() {
            return None;
        }
        self.cities
            .iter()
            .find(|city| normalize(&city.name_en) == wanted || normalize(&city.name_ar) == wanted)
    }
}

/// The governorate dataset with its search index.
pub struct Geography {
    governorates: Vec<Governorate>,
    index: AddressIndex,
}

impl Geography {
    /// Load the bundled dataset.
    ///
    /// # Errors
    ///
    /// Returns an error if the bundled data is malformed or the index
    /// cannot be built.
    pub fn egypt() -> Result<Self, GeographyError> {
        Self::from_json(GOVERNORATES_JSON)
    }

    /// Load a dataset from JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is malformed or the index cannot be built.
    pub fn from_json(json: &str) -> Result<Self, GeographyError> {
        let governorates: Vec<Governorate> = serde_json::from_str(json)?;
        let index = AddressIndex::build(&governorates)?;
        tracing::info!(
            governorates = governorates.len(),
            cities = governorates.iter().map(|g| g.cities.len()).sum::<usize>(),
            "Address index built"
        );
        Ok(Self {
            governorates,
            index,
        })
    }

    #[must_use]
    pub fn governorates(&self) -> &[Governorate] {
        &self.governorates
    }

    #[must_use]
    pub fn governorate(&self, id: &str) -> Option<&Governorate> {
        self.governorates.iter().find(|g| g.id == id)
    }

    /// Shipping cost for a governorate, `None` if the id is unknown.
    #[must_use]
    pub fn shipping_cost(&self, governorate_id: &str) -> Option<Money> {
        self.governorate(governorate_id).map(|g| g.shipping_cost)
    }

    /// Whether `city` belongs to the governorate.
    #[must_use]
    pub fn city_in(&self, governorate_id: &str, city: &str) -> bool {
        self.governorate(governorate_id)
            .and_then(|g| g.city(city))
            .is_some()
    }

    /// Fuzzy search over governorate and city names in both languages.
    ///
    /// # Errors
    ///
    /// Returns an error if the search fails.
    pub fn search(&self, query: &str, limit: usize) -> Result<Vec<AddressMatch>, GeographyError> {
        self.index.search(&self.governorates, query, limit)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_bundled_dataset() {
        let geography = Geography::egypt().unwrap();
        assert_eq!(geography.governorates().len(), 27);
        assert!(geography.governorates().iter().all(|g| !g.cities.is_empty()));
        assert_eq!(
            geography.shipping_cost("cairo"),
            Some(Money::from_piastres(6_000))
        );
        assert_eq!(geography.shipping_cost("atlantis"), None);
    }

    #[test]
    fn test_city_membership() {
        let geography = Geography::egypt().unwrap();
        assert!(geography.city_in("cairo", "Nasr City"));
        assert!(geography.city_in("cairo", "مدينة نصر"));
        assert!(geography.city_in("giza", "الشيخ زايد"));
        assert!(!geography.city_in("giza", "Nasr City"));
        assert!(!geography.city_in("cairo", ""));
    }
}
