//! Tests for import reconciliation

use super::*;
use crate::models::make_test_vehicle;

fn candidate(vin: &str, model: &str) -> ImportCandidate {
    ImportCandidate {
        make: "Chevrolet".to_string(),
        model: model.to_string(),
        year: Some(LooseNumber::from(2023u32)),
        price: Some(LooseNumber::from(45900.0)),
        mileage: Some(LooseNumber::from(12500u32)),
        vin: vin.to_string(),
        exterior_color: "Summit White".to_string(),
        interior_color: "Jet Black".to_string(),
        engine: "5.3L V8".to_string(),
        transmission: "automatic".to_string(),
        fuel_type: "gasoline".to_string(),
        features: vec!["4WD".to_string()],
        description: "Imported listing".to_string(),
        images: vec!["https://example.com/a.jpg".to_string()],
        source: "test_source".to_string(),
        ..Default::default()
    }
}

fn vins(records: &[VehicleRecord]) -> Vec<&str> {
    records.iter().map(|v| v.vin.as_str()).collect()
}

#[test]
fn reconcile_skips_existing_and_in_batch_duplicates() {
    let existing = vec![
        make_test_vehicle("1", "Toyota", "A"),
        make_test_vehicle("2", "Honda", "B"),
    ];
    let candidates = vec![
        candidate("B", "Tahoe"),
        candidate("C", "Camaro"),
        candidate("C", "Camaro SS"),
    ];

    let outcome = reconcile(&existing, candidates, ImportPolicy::BestEffort);

    assert_eq!(vins(&outcome.to_import), vec!["C"]);
    assert_eq!(outcome.to_import[0].model, "Camaro");
    assert_eq!(outcome.skipped.len(), 2);
    assert_eq!(outcome.skipped[0].candidate.vin, "B");
    assert_eq!(outcome.skipped[0].reason, SkipReason::DuplicateVin);
    assert_eq!(outcome.skipped[1].candidate.model, "Camaro SS");
    assert_eq!(outcome.skipped[1].reason, SkipReason::DuplicateVin);
}

#[test]
fn reconcile_assigns_fresh_ids_and_defaults() {
    let existing = vec![make_test_vehicle("1", "Toyota", "A")];
    let outcome = reconcile(
        &existing,
        vec![candidate("X1", "Silverado 1500"), candidate("X2", "Malibu")],
        ImportPolicy::BestEffort,
    );

    assert_eq!(outcome.to_import.len(), 2);
    let first = &outcome.to_import[0];
    let second = &outcome.to_import[1];
    assert_ne!(first.id, second.id);
    assert_ne!(first.id, "1");
    assert!(first.available);
    assert_eq!(first.condition, Condition::Used);
    assert_eq!(first.body_type, BodyType::Truck);
    assert_eq!(second.body_type, BodyType::Sedan);
    assert_eq!(first.price, 45900.0);
    assert_eq!(first.mileage, 12500);
    assert_eq!(first.year, 2023);
}

#[test]
fn reconcile_does_not_mutate_existing() {
    let existing = vec![make_test_vehicle("1", "Toyota", "A")];
    let before = existing.clone();
    let _ = reconcile(&existing, vec![candidate("Z", "Trax")], ImportPolicy::BestEffort);
    assert_eq!(existing, before);
}

#[test]
fn reconcile_matches_vins_ignoring_case_and_whitespace() {
    let existing = vec![make_test_vehicle("1", "Chevrolet", "1GNSKGKC5NR456789")];
    let outcome = reconcile(
        &existing,
        vec![candidate(" 1gnskgkc5nr456789 ", "Tahoe")],
        ImportPolicy::BestEffort,
    );
    assert!(outcome.to_import.is_empty());
    assert_eq!(outcome.skipped[0].reason, SkipReason::DuplicateVin);
}

#[test]
fn reconcile_skips_candidates_without_vin() {
    let outcome = reconcile(
        &[],
        vec![candidate("", "Tahoe"), candidate("   ", "Equinox")],
        ImportPolicy::BestEffort,
    );
    assert!(outcome.to_import.is_empty());
    assert!(outcome
        .skipped
        .iter()
        .all(|s| s.reason == SkipReason::MissingVin));
}

#[test]
fn best_effort_defaults_unparseable_numbers_to_zero() {
    let mut c = candidate("N1", "Equinox");
    c.price = Some(LooseNumber::from("call for price"));
    c.mileage = None;
    c.year = Some(LooseNumber::from(-5.0));

    let outcome = reconcile(&[], vec![c], ImportPolicy::BestEffort);
    let record = &outcome.to_import[0];
    assert_eq!(record.price, 0.0);
    assert_eq!(record.mileage, 0);
    assert_eq!(record.year, 0);
}

#[test]
fn strict_policy_rejects_invalid_candidates() {
    let mut bad = candidate("S1", "Equinox");
    bad.price = Some(LooseNumber::from("call for price"));
    let good = candidate("S2", "Equinox");

    let outcome = reconcile(&[], vec![bad, good], ImportPolicy::Strict);
    assert_eq!(vins(&outcome.to_import), vec!["S2"]);
    match &outcome.skipped[0].reason {
        SkipReason::Invalid { errors } => assert!(errors.get("price").is_some()),
        other => panic!("Expected SkipReason::Invalid, got: {other:?}"),
    }
}

#[test]
fn strict_rejection_does_not_reserve_the_vin() {
    let mut bad = candidate("S1", "Equinox");
    bad.make = String::new();
    let retry = candidate("S1", "Equinox");

    let outcome = reconcile(&[], vec![bad, retry], ImportPolicy::Strict);
    assert_eq!(vins(&outcome.to_import), vec!["S1"]);
}

#[test]
fn normalize_maps_free_text_enums() {
    let mut c = candidate("E1", "Bolt EV");
    c.transmission = "6-Speed Manual".to_string();
    c.fuel_type = "Electric".to_string();
    c.condition = Some("New".to_string());
    c.features = vec!["Fast Charging".to_string(), "Fast Charging".to_string()];

    let record = normalize_candidate(&c, "id-1".to_string());
    assert_eq!(record.id, "id-1");
    assert_eq!(record.transmission, Transmission::Manual);
    assert_eq!(record.fuel_type, FuelType::Electric);
    assert_eq!(record.condition, Condition::New);
    assert_eq!(record.body_type, BodyType::Suv);
    assert_eq!(record.features, vec!["Fast Charging"]);

    c.fuel_type = "Gas/Electric Hybrid".to_string();
    c.transmission = "CVT".to_string();
    let record = normalize_candidate(&c, "id-2".to_string());
    assert_eq!(record.fuel_type, FuelType::Electric);
    assert_eq!(record.transmission, Transmission::Automatic);

    c.fuel_type = "Hybrid".to_string();
    assert_eq!(normalize_candidate(&c, "id-3".to_string()).fuel_type, FuelType::Hybrid);

    c.fuel_type = "Diesel".to_string();
    assert_eq!(normalize_candidate(&c, "id-4".to_string()).fuel_type, FuelType::Gasoline);
}

#[test]
fn classify_body_type_prefers_explicit_category() {
    assert_eq!(classify_body_type(Some("Convertible"), "Camaro"), BodyType::Convertible);
    assert_eq!(classify_body_type(Some("crossover"), "Camaro"), BodyType::Coupe);
    assert_eq!(classify_body_type(None, "Tahoe High Country"), BodyType::Suv);
    assert_eq!(classify_body_type(None, "Colorado ZR2"), BodyType::Truck);
    assert_eq!(classify_body_type(None, "Spark LS"), BodyType::Hatchback);
    assert_eq!(classify_body_type(None, "Impala"), BodyType::Sedan);
}

#[test]
fn deduplicate_keeps_first_occurrence() {
    let records = vec![
        make_test_vehicle("1", "Toyota", "A"),
        make_test_vehicle("2", "Honda", "B"),
        make_test_vehicle("3", "Toyota", "A"),
        make_test_vehicle("4", "Ford", "C"),
        make_test_vehicle("5", "Honda", "B"),
    ];

    let outcome = deduplicate_existing(records);
    assert_eq!(vins(&outcome.unique), vec!["A", "B", "C"]);
    let ids: Vec<&str> = outcome.unique.iter().map(|v| v.id.as_str()).collect();
    assert_eq!(ids, vec!["1", "2", "4"]);
    assert_eq!(outcome.removed_count, 2);
}

#[test]
fn deduplicate_without_duplicates_is_identity() {
    let records = vec![
        make_test_vehicle("1", "Toyota", "A"),
        make_test_vehicle("2", "Honda", "B"),
    ];
    let outcome = deduplicate_existing(records.clone());
    assert_eq!(outcome.unique, records);
    assert_eq!(outcome.removed_count, 0);
}
