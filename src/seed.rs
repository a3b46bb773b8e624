//! Built-in demo inventory used to bootstrap an empty catalog

use crate::error::Result;
use crate::models::VehicleRecord;

const SEED_JSON: &str = include_str!("../data/seed_vehicles.json");

/// The seed vehicles, ids "1" through "6"
pub fn seed_vehicles() -> Result<Vec<VehicleRecord>> {
    Ok(serde_json::from_str(SEED_JSON)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BodyType, Condition, FuelType};
    use std::collections::HashSet;

    #[test]
    fn seed_parses() {
        let seed = seed_vehicles().unwrap();
        assert_eq!(seed.len(), 6);

        let ids: Vec<&str> = seed.iter().map(|v| v.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2", "3", "4", "5", "6"]);
    }

    #[test]
    fn seed_records_are_valid_and_unique() {
        let seed = seed_vehicles().unwrap();
        for vehicle in &seed {
            assert!(
                vehicle.validate().is_empty(),
                "seed vehicle {} invalid: {}",
                vehicle.id,
                vehicle.validate()
            );
            assert!(vehicle.available);
        }

        let vins: HashSet<String> = seed.iter().map(|v| v.vin_key()).collect();
        assert_eq!(vins.len(), seed.len());
    }

    #[test]
    fn seed_contents_match_demo_lot() {
        let seed = seed_vehicles().unwrap();

        let camry = &seed[0];
        assert_eq!((camry.make.as_str(), camry.model.as_str()), ("Toyota", "Camry"));
        assert_eq!(camry.price, 28500.0);
        assert_eq!(camry.mileage, 15000);
        assert_eq!(camry.condition, Condition::Used);

        let tesla = &seed[4];
        assert_eq!(tesla.make, "Tesla");
        assert_eq!(tesla.fuel_type, FuelType::Electric);
        assert_eq!(tesla.body_type, BodyType::Suv);
        assert_eq!(tesla.condition, Condition::New);
    }
}
