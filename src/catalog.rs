//! Catalog store
//!
//! Single owner of the vehicle list. Every mutation is validated, written through
//! the [`CatalogBackend`] and only then becomes the in-memory snapshot, so the two
//! never diverge after an operation returns.

use crate::error::{CatalogError, Result, ValidationErrors};
use crate::models::{
    new_vehicle_id, Condition, ImportCandidate, VehicleDraft, VehiclePatch, VehicleRecord,
};
use crate::reconcile::{deduplicate_existing, reconcile, ImportPolicy, Reconciliation};
use serde::Serialize;
use std::collections::HashSet;

/// Persistence collaborator for the catalog
pub trait CatalogBackend {
    /// Read the whole catalog in stored order
    fn load_catalog(&self) -> Result<Vec<VehicleRecord>>;

    /// Replace the whole catalog; either every record is written or none
    fn save_catalog(&mut self, records: &[VehicleRecord]) -> Result<()> {
        self.save_catalog_retiring(records, &[])
    }

    /// Replace the whole catalog and retire the given seed ids in the same write
    fn save_catalog_retiring(
        &mut self,
        records: &[VehicleRecord],
        retired: &[String],
    ) -> Result<()>;

    fn get_by_id(&self, id: &str) -> Result<Option<VehicleRecord>>;

    /// Insert or replace a single record by id
    fn upsert(&mut self, record: &VehicleRecord) -> Result<()>;

    /// Remove a single record; returns whether it existed
    fn delete_by_id(&mut self, id: &str) -> Result<bool>;

    /// Seed ids an operator removed; load never restores them
    fn retired_seed_ids(&self) -> Result<HashSet<String>>;
}

/// Dashboard summary of the catalog
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CatalogStats {
    pub total: usize,
    pub available: usize,
    pub new: usize,
    pub used: usize,
    pub total_value: f64,
    pub average_price: f64,
}

impl CatalogStats {
    pub fn from_records(records: &[VehicleRecord]) -> Self {
        let total = records.len();
        let total_value: f64 = records.iter().map(|v| v.price).sum();

        Self {
            total,
            available: records.iter().filter(|v| v.available).count(),
            new: records
                .iter()
                .filter(|v| v.condition == Condition::New)
                .count(),
            used: records
                .iter()
                .filter(|v| v.condition == Condition::Used)
                .count(),
            total_value,
            average_price: if total > 0 {
                total_value / total as f64
            } else {
                0.0
            },
        }
    }
}

/// The vehicle catalog, bootstrapped from a seed set on first load
pub struct CatalogStore<B: CatalogBackend> {
    backend: B,
    seed: Vec<VehicleRecord>,
    records: Vec<VehicleRecord>,
    loaded: bool,
}

impl<B: CatalogBackend> CatalogStore<B> {
    pub fn new(backend: B, seed: Vec<VehicleRecord>) -> Self {
        Self {
            backend,
            seed,
            records: Vec::new(),
            loaded: false,
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// Read the persisted catalog, merging in any missing seed records
    ///
    /// An empty catalog is filled with the seed set. Seed records already present
    /// (by id) or deliberately deleted are left alone, so repeated calls write
    /// nothing. A missing seed record whose VIN is already held by a stored
    /// vehicle is retired instead of restored.
    pub fn load(&mut self) -> Result<Vec<VehicleRecord>> {
        let stored = self.backend.load_catalog()?;
        let retired = self.backend.retired_seed_ids()?;

        let stored_ids: HashSet<&str> = stored.iter().map(|v| v.id.as_str()).collect();
        let stored_vins: HashSet<String> = stored.iter().map(|v| v.vin_key()).collect();

        let mut missing = Vec::new();
        let mut shadowed = Vec::new();
        for seed in &self.seed {
            if stored_ids.contains(seed.id.as_str()) || retired.contains(&seed.id) {
                continue;
            }
            if stored_vins.contains(&seed.vin_key()) {
                log::warn!(
                    "Seed vehicle {} shares VIN {} with a stored vehicle, retiring it",
                    seed.id,
                    seed.vin
                );
                shadowed.push(seed.id.clone());
            } else {
                missing.push(seed.clone());
            }
        }

        if missing.is_empty() && shadowed.is_empty() {
            self.records = stored;
        } else {
            if stored.is_empty() {
                log::info!("Catalog is empty, bootstrapping {} seed vehicles", missing.len());
            } else if !missing.is_empty() {
                log::info!("Restoring {} missing seed vehicles", missing.len());
            }
            let mut merged = stored;
            merged.extend(missing);
            self.backend.save_catalog_retiring(&merged, &shadowed)?;
            self.records = merged;
        }

        self.loaded = true;
        log::debug!("Loaded {} vehicles", self.records.len());
        Ok(self.records.clone())
    }

    fn ensure_loaded(&mut self) -> Result<()> {
        if !self.loaded {
            self.load()?;
        }
        Ok(())
    }

    /// Snapshot of the current catalog
    pub fn list(&self) -> Vec<VehicleRecord> {
        self.records.clone()
    }

    /// Borrowed view of the current catalog
    pub fn records(&self) -> &[VehicleRecord] {
        &self.records
    }

    pub fn get(&self, id: &str) -> Option<VehicleRecord> {
        self.records.iter().find(|v| v.id == id).cloned()
    }

    /// Re-read one vehicle after the backend changed it outside the store
    ///
    /// Image uploads go straight to the backend; this brings the snapshot back in
    /// line. A vehicle the backend no longer has is dropped from the snapshot.
    pub fn refresh(&mut self, id: &str) -> Result<Option<VehicleRecord>> {
        let fresh = self.backend.get_by_id(id)?;
        let index = self.records.iter().position(|v| v.id == id);

        match (&fresh, index) {
            (Some(record), Some(index)) => self.records[index] = record.clone(),
            (Some(record), None) => self.records.push(record.clone()),
            (None, Some(index)) => {
                self.records.remove(index);
            }
            (None, None) => {}
        }
        Ok(fresh)
    }

    /// Persist `next` and adopt it as the snapshot; on failure nothing changes
    ///
    /// Seed vehicles dropped by `next` are retired in the same write so a later
    /// load does not bring them back.
    fn commit(&mut self, next: Vec<VehicleRecord>) -> Result<()> {
        let next_ids: HashSet<&str> = next.iter().map(|v| v.id.as_str()).collect();
        let dropped_seed: Vec<String> = self
            .seed
            .iter()
            .filter(|s| !next_ids.contains(s.id.as_str()))
            .filter(|s| self.records.iter().any(|v| v.id == s.id))
            .map(|s| s.id.clone())
            .collect();

        self.backend.save_catalog_retiring(&next, &dropped_seed)?;
        self.records = next;
        Ok(())
    }

    /// Reject a VIN already used by a vehicle other than `except_id`
    fn check_vin_unique(&self, record: &VehicleRecord, except_id: Option<&str>) -> Result<()> {
        let key = record.vin_key();
        let clash = self
            .records
            .iter()
            .any(|v| Some(v.id.as_str()) != except_id && v.vin_key() == key);

        if clash {
            let mut errors = ValidationErrors::new();
            errors.add("vin", format!("A vehicle with VIN {} already exists", record.vin));
            return Err(CatalogError::Validation(errors));
        }
        Ok(())
    }

    /// Add a new vehicle under a freshly assigned id
    pub fn add(&mut self, draft: VehicleDraft) -> Result<VehicleRecord> {
        self.ensure_loaded()?;

        let record = draft.into_record(new_vehicle_id());
        record.validate().into_result()?;
        self.check_vin_unique(&record, None)?;

        let mut next = self.records.clone();
        next.push(record.clone());
        self.commit(next)?;

        log::info!(
            "Added vehicle {} ({} {} {})",
            record.id,
            record.year,
            record.make,
            record.model
        );
        Ok(record)
    }

    /// Merge `patch` into the vehicle with `id`
    pub fn update(&mut self, id: &str, patch: VehiclePatch) -> Result<VehicleRecord> {
        self.ensure_loaded()?;

        let index = self
            .records
            .iter()
            .position(|v| v.id == id)
            .ok_or_else(|| CatalogError::NotFound(id.to_string()))?;

        let mut record = self.records[index].clone();
        patch.apply(&mut record);
        record.validate().into_result()?;
        self.check_vin_unique(&record, Some(id))?;

        let mut next = self.records.clone();
        next[index] = record.clone();
        self.commit(next)?;

        log::info!("Updated vehicle {}", id);
        Ok(record)
    }

    /// Remove the vehicle with `id`; returns whether it existed
    pub fn delete(&mut self, id: &str) -> Result<bool> {
        self.ensure_loaded()?;

        if !self.records.iter().any(|v| v.id == id) {
            log::debug!("Delete of unknown vehicle {} ignored", id);
            return Ok(false);
        }

        let next: Vec<VehicleRecord> = self
            .records
            .iter()
            .filter(|v| v.id != id)
            .cloned()
            .collect();
        self.commit(next)?;

        log::info!("Deleted vehicle {}", id);
        Ok(true)
    }

    /// Overwrite the whole catalog
    ///
    /// Ids and VINs must be unique across `records`.
    pub fn replace_all(&mut self, records: Vec<VehicleRecord>) -> Result<()> {
        self.ensure_loaded()?;

        let mut errors = ValidationErrors::new();
        let mut ids = HashSet::new();
        let mut vins = HashSet::new();

        for record in &records {
            if !ids.insert(record.id.as_str()) {
                errors.add("id", format!("Duplicate vehicle id {}", record.id));
            }
            if !vins.insert(record.vin_key()) {
                errors.add("vin", format!("Duplicate VIN {}", record.vin));
            }
        }
        errors.into_result()?;

        let count = records.len();
        self.commit(records)?;
        log::info!("Replaced catalog with {} vehicles", count);
        Ok(())
    }

    /// Reconcile candidates against the catalog and append the new ones
    pub fn import(
        &mut self,
        candidates: Vec<ImportCandidate>,
        policy: ImportPolicy,
    ) -> Result<Reconciliation> {
        self.ensure_loaded()?;

        let outcome = reconcile(&self.records, candidates, policy);
        if !outcome.to_import.is_empty() {
            let mut next = self.records.clone();
            next.extend(outcome.to_import.iter().cloned());
            self.commit(next)?;
        }

        log::info!(
            "Imported {} vehicles ({} skipped)",
            outcome.to_import.len(),
            outcome.skipped.len()
        );
        Ok(outcome)
    }

    /// Drop later vehicles sharing a VIN with an earlier one
    pub fn deduplicate(&mut self) -> Result<usize> {
        self.ensure_loaded()?;

        let outcome = deduplicate_existing(self.records.clone());
        if outcome.removed_count > 0 {
            self.replace_all(outcome.unique)?;
        }

        log::info!("Removed {} duplicate vehicles", outcome.removed_count);
        Ok(outcome.removed_count)
    }

    pub fn stats(&self) -> CatalogStats {
        CatalogStats::from_records(&self.records)
    }
}

#[cfg(test)]
#[path = "catalog_tests.rs"]
mod tests;
