//! Import reconciliation
//!
//! Merges externally sourced listings into the catalog without creating VIN
//! duplicates, and cleans up duplicates already present in a catalog.

use crate::error::ValidationErrors;
use crate::models::{
    new_vehicle_id, normalize_features, vin_key, BodyType, Condition, FuelType, ImportCandidate,
    LooseNumber, Transmission, VehicleRecord,
};
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;

/// How strictly candidates are checked before being accepted
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ImportPolicy {
    /// Unparseable numbers become zero, unknown categories fall back to defaults
    #[default]
    BestEffort,
    /// Normalized records must also pass operator validation
    Strict,
}

/// Why a candidate was not imported
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SkipReason {
    /// VIN already in the catalog or earlier in the same batch
    DuplicateVin,
    /// Candidate had no VIN to deduplicate on
    MissingVin,
    /// Rejected by validation under [`ImportPolicy::Strict`]
    Invalid { errors: ValidationErrors },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::DuplicateVin => f.write_str("VIN already in inventory"),
            SkipReason::MissingVin => f.write_str("no VIN"),
            SkipReason::Invalid { errors } => write!(f, "invalid ({})", errors),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedCandidate {
    pub candidate: ImportCandidate,
    pub reason: SkipReason,
}

/// Outcome of reconciling a batch of candidates
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Reconciliation {
    /// New records, in candidate order, ready to append to the catalog
    pub to_import: Vec<VehicleRecord>,
    pub skipped: Vec<SkippedCandidate>,
}

/// Outcome of removing VIN duplicates from a catalog
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Deduplication {
    pub unique: Vec<VehicleRecord>,
    pub removed_count: usize,
}

/// Split `candidates` into records to import and skipped candidates
///
/// A candidate is skipped when its VIN is already present in `existing` or was
/// accepted earlier in this batch. Never fails on malformed data.
pub fn reconcile(
    existing: &[VehicleRecord],
    candidates: Vec<ImportCandidate>,
    policy: ImportPolicy,
) -> Reconciliation {
    let mut seen: HashSet<String> = existing.iter().map(|v| v.vin_key()).collect();
    let mut outcome = Reconciliation::default();

    for candidate in candidates {
        let key = vin_key(&candidate.vin);

        if key.is_empty() {
            log::debug!(
                "Skipping candidate without VIN: {} {}",
                candidate.make,
                candidate.model
            );
            outcome.skipped.push(SkippedCandidate {
                candidate,
                reason: SkipReason::MissingVin,
            });
            continue;
        }

        if seen.contains(&key) {
            log::debug!("Skipping duplicate VIN: {}", key);
            outcome.skipped.push(SkippedCandidate {
                candidate,
                reason: SkipReason::DuplicateVin,
            });
            continue;
        }

        let record = normalize_candidate(&candidate, new_vehicle_id());

        if policy == ImportPolicy::Strict {
            let errors = record.validate();
            if !errors.is_empty() {
                log::debug!("Rejecting candidate {}: {}", key, errors);
                outcome.skipped.push(SkippedCandidate {
                    candidate,
                    reason: SkipReason::Invalid { errors },
                });
                continue;
            }
        }

        seen.insert(key);
        outcome.to_import.push(record);
    }

    log::info!(
        "Reconciled import batch: {} to import, {} skipped",
        outcome.to_import.len(),
        outcome.skipped.len()
    );

    outcome
}

/// Keep the first vehicle for each VIN, dropping later ones
pub fn deduplicate_existing(records: Vec<VehicleRecord>) -> Deduplication {
    let mut seen = HashSet::new();
    let mut unique = Vec::with_capacity(records.len());
    let mut removed_count = 0;

    for record in records {
        if seen.insert(record.vin_key()) {
            unique.push(record);
        } else {
            log::debug!("Dropping duplicate VIN {} (id {})", record.vin, record.id);
            removed_count += 1;
        }
    }

    Deduplication {
        unique,
        removed_count,
    }
}

/// Convert a candidate into catalog shape under the given id
pub fn normalize_candidate(candidate: &ImportCandidate, id: String) -> VehicleRecord {
    VehicleRecord {
        id,
        make: candidate.make.trim().to_string(),
        model: candidate.model.trim().to_string(),
        year: number_or_zero(&candidate.year) as u16,
        condition: parse_condition(candidate.condition.as_deref()),
        body_type: classify_body_type(candidate.body_type.as_deref(), &candidate.model),
        transmission: parse_transmission(&candidate.transmission),
        fuel_type: parse_fuel_type(&candidate.fuel_type),
        exterior_color: candidate.exterior_color.trim().to_string(),
        interior_color: candidate.interior_color.trim().to_string(),
        engine: candidate.engine.trim().to_string(),
        price: number_or_zero(&candidate.price),
        mileage: number_or_zero(&candidate.mileage).round() as u32,
        available: true,
        images: candidate.images.clone(),
        features: normalize_features(candidate.features.clone()),
        description: candidate.description.clone(),
        vin: candidate.vin.trim().to_string(),
    }
}

/// Non-negative parsed value, or zero when missing or unparseable
fn number_or_zero(value: &Option<LooseNumber>) -> f64 {
    value
        .as_ref()
        .and_then(LooseNumber::as_f64)
        .filter(|n| *n >= 0.0)
        .unwrap_or(0.0)
}

fn parse_condition(text: Option<&str>) -> Condition {
    match text.map(|t| t.trim().to_ascii_lowercase()) {
        Some(t) if t == "new" => Condition::New,
        _ => Condition::Used,
    }
}

fn parse_transmission(text: &str) -> Transmission {
    if text.to_ascii_lowercase().contains("manual") {
        Transmission::Manual
    } else {
        Transmission::Automatic
    }
}

fn parse_fuel_type(text: &str) -> FuelType {
    let lowered = text.trim().to_ascii_lowercase();
    if lowered.contains("electric") || lowered == "ev" {
        FuelType::Electric
    } else if lowered.contains("hybrid") {
        FuelType::Hybrid
    } else {
        FuelType::Gasoline
    }
}

const TRUCK_MODELS: &[&str] = &[
    "silverado", "colorado", "sierra", "f-150", "f150", "ram", "tacoma", "tundra", "ranger",
    "frontier",
];
const SUV_MODELS: &[&str] = &[
    "tahoe",
    "suburban",
    "traverse",
    "equinox",
    "blazer",
    "trailblazer",
    "trax",
    "bolt",
    "cr-v",
    "rav4",
    "explorer",
    "model y",
];
const COUPE_MODELS: &[&str] = &["camaro", "corvette", "mustang"];
const HATCHBACK_MODELS: &[&str] = &["spark", "sonic"];

/// Pick a body type from an explicit category, else from keywords in the model name
///
/// Falls back to [`BodyType::Sedan`] when nothing matches.
pub fn classify_body_type(category: Option<&str>, model: &str) -> BodyType {
    if let Some(body_type) = category.and_then(|c| c.parse::<BodyType>().ok()) {
        return body_type;
    }

    let model = model.to_ascii_lowercase();
    let has_any = |keywords: &[&str]| keywords.iter().any(|k| model.contains(k));

    if has_any(TRUCK_MODELS) {
        BodyType::Truck
    } else if has_any(SUV_MODELS) {
        BodyType::Suv
    } else if has_any(COUPE_MODELS) {
        BodyType::Coupe
    } else if has_any(HATCHBACK_MODELS) {
        BodyType::Hatchback
    } else {
        BodyType::Sedan
    }
}

#[cfg(test)]
#[path = "reconcile_tests.rs"]
mod tests;
