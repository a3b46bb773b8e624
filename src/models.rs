//! Vehicle catalog data model
//!
//! `VehicleRecord` is the stored shape; `VehicleDraft` and `VehiclePatch` are the
//! inputs for creating and editing records, and `ImportCandidate` is the loosely
//! typed payload handed over by an import source.

use crate::error::ValidationErrors;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Earliest model year accepted for operator-entered vehicles
pub const MIN_MODEL_YEAR: u16 = 1900;

/// Generates the string conversions shared by the closed vehicle enums.
macro_rules! closed_enum {
    ($name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            /// Every variant, in declaration order
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// Lowercase wire name
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let lowered = s.trim().to_ascii_lowercase();
                match lowered.as_str() {
                    $($text => Ok($name::$variant),)+
                    _ => Err(format!("unknown {}: {}", stringify!($name), s)),
                }
            }
        }
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Condition {
    New,
    Used,
}

closed_enum!(Condition { New => "new", Used => "used" });

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BodyType {
    Sedan,
    Suv,
    Truck,
    Coupe,
    Convertible,
    Hatchback,
}

closed_enum!(BodyType {
    Sedan => "sedan",
    Suv => "suv",
    Truck => "truck",
    Coupe => "coupe",
    Convertible => "convertible",
    Hatchback => "hatchback",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transmission {
    Automatic,
    Manual,
}

closed_enum!(Transmission { Automatic => "automatic", Manual => "manual" });

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FuelType {
    Gasoline,
    Hybrid,
    Electric,
}

closed_enum!(FuelType {
    Gasoline => "gasoline",
    Hybrid => "hybrid",
    Electric => "electric",
});

/// One vehicle in the catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VehicleRecord {
    pub id: String,
    pub make: String,
    pub model: String,
    pub year: u16,
    pub condition: Condition,
    pub body_type: BodyType,
    pub transmission: Transmission,
    pub fuel_type: FuelType,
    pub exterior_color: String,
    pub interior_color: String,
    pub engine: String,
    pub price: f64,
    pub mileage: u32,
    pub available: bool,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub features: Vec<String>,
    #[serde(default)]
    pub description: String,
    pub vin: String,
}

impl VehicleRecord {
    /// Catalog key used for VIN uniqueness checks
    pub fn vin_key(&self) -> String {
        vin_key(&self.vin)
    }

    /// Check the operator-facing field rules
    ///
    /// Returns every failing field at once so a form can show them together.
    pub fn validate(&self) -> ValidationErrors {
        let mut errors = ValidationErrors::new();

        if self.make.trim().is_empty() {
            errors.add("make", "Make is required");
        }
        if self.model.trim().is_empty() {
            errors.add("model", "Model is required");
        }
        if self.year < MIN_MODEL_YEAR {
            errors.add("year", "Valid year is required");
        }
        if !self.price.is_finite() || self.price <= 0.0 {
            errors.add("price", "Valid price is required");
        }
        if self.exterior_color.trim().is_empty() {
            errors.add("exterior_color", "Exterior color is required");
        }
        if self.interior_color.trim().is_empty() {
            errors.add("interior_color", "Interior color is required");
        }
        if self.engine.trim().is_empty() {
            errors.add("engine", "Engine information is required");
        }
        if self.vin.trim().is_empty() {
            errors.add("vin", "VIN is required");
        }
        if self.description.trim().is_empty() {
            errors.add("description", "Description is required");
        }

        errors
    }
}

/// A vehicle as entered by an operator, before it has an id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VehicleDraft {
    pub make: String,
    pub model: String,
    pub year: u16,
    pub condition: Condition,
    pub body_type: BodyType,
    pub transmission: Transmission,
    pub fuel_type: FuelType,
    pub exterior_color: String,
    pub interior_color: String,
    pub engine: String,
    pub price: f64,
    pub mileage: u32,
    #[serde(default = "default_available")]
    pub available: bool,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub features: Vec<String>,
    #[serde(default)]
    pub description: String,
    pub vin: String,
}

fn default_available() -> bool {
    true
}

impl VehicleDraft {
    /// Attach an id, producing a storable record
    pub fn into_record(self, id: String) -> VehicleRecord {
        VehicleRecord {
            id,
            make: self.make.trim().to_string(),
            model: self.model.trim().to_string(),
            year: self.year,
            condition: self.condition,
            body_type: self.body_type,
            transmission: self.transmission,
            fuel_type: self.fuel_type,
            exterior_color: self.exterior_color,
            interior_color: self.interior_color,
            engine: self.engine,
            price: self.price,
            mileage: self.mileage,
            available: self.available,
            images: self.images,
            features: normalize_features(self.features),
            description: self.description,
            vin: self.vin.trim().to_string(),
        }
    }
}

/// Partial edit of a vehicle; only populated fields are applied
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VehiclePatch {
    pub make: Option<String>,
    pub model: Option<String>,
    pub year: Option<u16>,
    pub condition: Option<Condition>,
    pub body_type: Option<BodyType>,
    pub transmission: Option<Transmission>,
    pub fuel_type: Option<FuelType>,
    pub exterior_color: Option<String>,
    pub interior_color: Option<String>,
    pub engine: Option<String>,
    pub price: Option<f64>,
    pub mileage: Option<u32>,
    pub available: Option<bool>,
    pub images: Option<Vec<String>>,
    pub features: Option<Vec<String>>,
    pub description: Option<String>,
    pub vin: Option<String>,
}

impl VehiclePatch {
    /// Merge into `record`; the id is never touched
    pub fn apply(self, record: &mut VehicleRecord) {
        if let Some(make) = self.make {
            record.make = make.trim().to_string();
        }
        if let Some(model) = self.model {
            record.model = model.trim().to_string();
        }
        if let Some(year) = self.year {
            record.year = year;
        }
        if let Some(condition) = self.condition {
            record.condition = condition;
        }
        if let Some(body_type) = self.body_type {
            record.body_type = body_type;
        }
        if let Some(transmission) = self.transmission {
            record.transmission = transmission;
        }
        if let Some(fuel_type) = self.fuel_type {
            record.fuel_type = fuel_type;
        }
        if let Some(exterior) = self.exterior_color {
            record.exterior_color = exterior;
        }
        if let Some(interior) = self.interior_color {
            record.interior_color = interior;
        }
        if let Some(engine) = self.engine {
            record.engine = engine;
        }
        if let Some(price) = self.price {
            record.price = price;
        }
        if let Some(mileage) = self.mileage {
            record.mileage = mileage;
        }
        if let Some(available) = self.available {
            record.available = available;
        }
        if let Some(images) = self.images {
            record.images = images;
        }
        if let Some(features) = self.features {
            record.features = normalize_features(features);
        }
        if let Some(description) = self.description {
            record.description = description;
        }
        if let Some(vin) = self.vin {
            record.vin = vin.trim().to_string();
        }
    }
}

/// Number as scraped from a listing page: a JSON number or text like "$45,900"
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LooseNumber {
    Number(f64),
    Text(String),
}

impl LooseNumber {
    /// Parsed value, ignoring currency symbols, separators and units
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            LooseNumber::Number(n) if n.is_finite() => Some(*n),
            LooseNumber::Number(_) => None,
            LooseNumber::Text(text) => {
                let cleaned: String = text
                    .chars()
                    .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
                    .collect();
                cleaned.parse::<f64>().ok().filter(|n| n.is_finite())
            }
        }
    }
}

impl From<f64> for LooseNumber {
    fn from(n: f64) -> Self {
        LooseNumber::Number(n)
    }
}

impl From<u32> for LooseNumber {
    fn from(n: u32) -> Self {
        LooseNumber::Number(f64::from(n))
    }
}

impl From<&str> for LooseNumber {
    fn from(text: &str) -> Self {
        LooseNumber::Text(text.to_string())
    }
}

/// Scraped listings send `null` for blank fields; treat it like a missing key
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}

/// A vehicle listing offered by an external source, not yet in the catalog
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportCandidate {
    #[serde(deserialize_with = "null_as_default")]
    pub make: String,
    #[serde(deserialize_with = "null_as_default")]
    pub model: String,
    pub year: Option<LooseNumber>,
    pub price: Option<LooseNumber>,
    pub mileage: Option<LooseNumber>,
    #[serde(deserialize_with = "null_as_default")]
    pub vin: String,
    #[serde(alias = "exterior", deserialize_with = "null_as_default")]
    pub exterior_color: String,
    #[serde(alias = "interior", deserialize_with = "null_as_default")]
    pub interior_color: String,
    #[serde(deserialize_with = "null_as_default")]
    pub engine: String,
    #[serde(deserialize_with = "null_as_default")]
    pub transmission: String,
    #[serde(alias = "fuelType", deserialize_with = "null_as_default")]
    pub fuel_type: String,
    pub condition: Option<String>,
    #[serde(alias = "type", alias = "category")]
    pub body_type: Option<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub features: Vec<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub description: String,
    #[serde(deserialize_with = "null_as_default")]
    pub images: Vec<String>,
    /// Tag naming where the listing came from
    #[serde(deserialize_with = "null_as_default")]
    pub source: String,
    pub url: Option<String>,
    pub stock_number: Option<String>,
}

/// An uploaded picture of a vehicle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageRecord {
    pub id: String,
    pub vehicle_id: String,
    pub image_url: String,
    pub image_path: String,
    pub is_primary: bool,
    pub sort_order: i64,
    pub created_at: String,
}

/// New globally unique vehicle id
pub fn new_vehicle_id() -> String {
    Uuid::new_v4().to_string()
}

/// VIN comparison key (surrounding whitespace and case are not significant)
pub fn vin_key(vin: &str) -> String {
    vin.trim().to_ascii_uppercase()
}

/// Trim feature tags and drop blanks and repeats, keeping first occurrences
pub fn normalize_features(features: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    features
        .into_iter()
        .map(|f| f.trim().to_string())
        .filter(|f| !f.is_empty() && seen.insert(f.clone()))
        .collect()
}

#[cfg(test)]
pub use tests::make_test_vehicle;

#[cfg(test)]
#[path = "models_tests.rs"]
mod tests;
