//! Inventory query pipeline
//!
//! Projects the full catalog into what a shopper sees: unavailable vehicles are
//! dropped, then the search text and filter predicates are applied, then the
//! survivors are sorted. Pure and synchronous; inputs are never modified.

use crate::models::{BodyType, Condition, FuelType, Transmission, VehicleRecord};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Inclusive range; a missing bound leaves that side open
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Range<T> {
    pub min: Option<T>,
    pub max: Option<T>,
}

impl<T: PartialOrd + Copy> Range<T> {
    pub fn between(min: T, max: T) -> Self {
        Self {
            min: Some(min),
            max: Some(max),
        }
    }

    pub fn at_least(min: T) -> Self {
        Self {
            min: Some(min),
            max: None,
        }
    }

    pub fn at_most(max: T) -> Self {
        Self {
            min: None,
            max: Some(max),
        }
    }

    pub fn contains(&self, value: T) -> bool {
        self.min.is_none_or(|min| value >= min) && self.max.is_none_or(|max| value <= max)
    }
}

/// Optional predicates over vehicle fields; `None` means no constraint
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterSet {
    pub make: Option<String>,
    pub condition: Option<Condition>,
    pub body_type: Option<BodyType>,
    pub transmission: Option<Transmission>,
    pub fuel_type: Option<FuelType>,
    pub price: Option<Range<f64>>,
    pub year: Option<Range<u16>>,
    pub mileage: Option<Range<u32>>,
}

impl FilterSet {
    /// True when the vehicle satisfies every populated predicate
    pub fn matches(&self, vehicle: &VehicleRecord) -> bool {
        self.make.as_ref().is_none_or(|make| vehicle.make == *make)
            && self.condition.is_none_or(|c| vehicle.condition == c)
            && self.body_type.is_none_or(|b| vehicle.body_type == b)
            && self.transmission.is_none_or(|t| vehicle.transmission == t)
            && self.fuel_type.is_none_or(|f| vehicle.fuel_type == f)
            && self.price.is_none_or(|r| r.contains(vehicle.price))
            && self.year.is_none_or(|r| r.contains(vehicle.year))
            && self.mileage.is_none_or(|r| r.contains(vehicle.mileage))
    }

    pub fn is_empty(&self) -> bool {
        *self == FilterSet::default()
    }
}

/// Result ordering offered by the inventory listing
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortKey {
    #[default]
    #[serde(rename = "price-low")]
    PriceLow,
    #[serde(rename = "price-high")]
    PriceHigh,
    #[serde(rename = "year-new")]
    YearNew,
    #[serde(rename = "year-old")]
    YearOld,
    #[serde(rename = "mileage-low")]
    MileageLow,
}

impl SortKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortKey::PriceLow => "price-low",
            SortKey::PriceHigh => "price-high",
            SortKey::YearNew => "year-new",
            SortKey::YearOld => "year-old",
            SortKey::MileageLow => "mileage-low",
        }
    }

    fn compare(&self, a: &VehicleRecord, b: &VehicleRecord) -> Ordering {
        match self {
            SortKey::PriceLow => a.price.total_cmp(&b.price),
            SortKey::PriceHigh => b.price.total_cmp(&a.price),
            SortKey::YearNew => b.year.cmp(&a.year),
            SortKey::YearOld => a.year.cmp(&b.year),
            SortKey::MileageLow => a.mileage.cmp(&b.mileage),
        }
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "price-low" => Ok(SortKey::PriceLow),
            "price-high" => Ok(SortKey::PriceHigh),
            "year-new" => Ok(SortKey::YearNew),
            "year-old" => Ok(SortKey::YearOld),
            "mileage-low" => Ok(SortKey::MileageLow),
            other => Err(format!("unknown sort key: {}", other)),
        }
    }
}

/// Case-insensitive match of the search text against "make model year"
fn matches_search(vehicle: &VehicleRecord, needle_lower: &str) -> bool {
    format!("{} {} {}", vehicle.make, vehicle.model, vehicle.year)
        .to_lowercase()
        .contains(needle_lower)
}

/// Run the inventory pipeline over a catalog snapshot
///
/// The sort is stable: vehicles equal on the sort key keep their input order.
pub fn query(
    records: &[VehicleRecord],
    filters: &FilterSet,
    search: &str,
    sort: SortKey,
) -> Vec<VehicleRecord> {
    let needle = search.to_lowercase();

    let mut results: Vec<VehicleRecord> = records
        .iter()
        .filter(|v| v.available)
        .filter(|v| needle.is_empty() || matches_search(v, &needle))
        .filter(|v| filters.matches(v))
        .cloned()
        .collect();

    results.sort_by(|a, b| sort.compare(a, b));
    results
}

/// Number of vehicles a shopper can see before any filtering
pub fn available_count(records: &[VehicleRecord]) -> usize {
    records.iter().filter(|v| v.available).count()
}

/// Distinct makes of available vehicles, alphabetically
pub fn makes_in_stock(records: &[VehicleRecord]) -> Vec<String> {
    records
        .iter()
        .filter(|v| v.available)
        .map(|v| v.make.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

#[cfg(test)]
#[path = "query_tests.rs"]
mod tests;
