//! Tests for the vehicle data model

use super::*;

/// Create a valid test vehicle with default values
pub fn make_test_vehicle(id: &str, make: &str, vin: &str) -> VehicleRecord {
    VehicleRecord {
        id: id.to_string(),
        make: make.to_string(),
        model: "Test Model".to_string(),
        year: 2023,
        condition: Condition::Used,
        body_type: BodyType::Sedan,
        transmission: Transmission::Automatic,
        fuel_type: FuelType::Gasoline,
        exterior_color: "Silver".to_string(),
        interior_color: "Black".to_string(),
        engine: "2.5L 4-Cylinder".to_string(),
        price: 25000.0,
        mileage: 10000,
        available: true,
        images: vec![],
        features: vec!["Bluetooth".to_string()],
        description: "Test vehicle".to_string(),
        vin: vin.to_string(),
    }
}

#[test]
fn enums_parse_case_insensitively() {
    assert_eq!("SUV".parse::<BodyType>().unwrap(), BodyType::Suv);
    assert_eq!(" manual ".parse::<Transmission>().unwrap(), Transmission::Manual);
    assert_eq!("Electric".parse::<FuelType>().unwrap(), FuelType::Electric);
    assert_eq!("new".parse::<Condition>().unwrap(), Condition::New);
    assert!("minivan".parse::<BodyType>().is_err());
}

#[test]
fn enums_serialize_lowercase() {
    let json = serde_json::to_string(&BodyType::Hatchback).unwrap();
    assert_eq!(json, "\"hatchback\"");
    assert_eq!(FuelType::Hybrid.to_string(), "hybrid");
    assert_eq!(BodyType::ALL.len(), 6);
}

#[test]
fn valid_vehicle_has_no_errors() {
    let vehicle = make_test_vehicle("1", "Toyota", "VIN1");
    assert!(vehicle.validate().is_empty());
}

#[test]
fn validate_reports_every_failing_field() {
    let mut vehicle = make_test_vehicle("1", "", "  ");
    vehicle.year = 1899;
    vehicle.price = 0.0;
    vehicle.description = String::new();

    let errors = vehicle.validate();
    assert_eq!(errors.len(), 5);
    assert_eq!(errors.get("make"), Some("Make is required"));
    assert_eq!(errors.get("year"), Some("Valid year is required"));
    assert_eq!(errors.get("price"), Some("Valid price is required"));
    assert_eq!(errors.get("vin"), Some("VIN is required"));
    assert!(errors.get("description").is_some());
    assert!(errors.get("model").is_none());
}

#[test]
fn validate_rejects_non_finite_price() {
    let mut vehicle = make_test_vehicle("1", "Toyota", "VIN1");
    vehicle.price = f64::NAN;
    assert!(vehicle.validate().get("price").is_some());
}

#[test]
fn draft_into_record_trims_and_dedups_features() {
    let vehicle = make_test_vehicle("ignored", " Honda ", " VIN2 ");
    let draft = VehicleDraft {
        make: vehicle.make,
        model: vehicle.model,
        year: vehicle.year,
        condition: vehicle.condition,
        body_type: vehicle.body_type,
        transmission: vehicle.transmission,
        fuel_type: vehicle.fuel_type,
        exterior_color: vehicle.exterior_color,
        interior_color: vehicle.interior_color,
        engine: vehicle.engine,
        price: vehicle.price,
        mileage: vehicle.mileage,
        available: true,
        images: vec![],
        features: vec![
            "AWD".to_string(),
            " Sunroof".to_string(),
            "AWD".to_string(),
            "".to_string(),
        ],
        description: vehicle.description,
        vin: vehicle.vin,
    };

    let record = draft.into_record("abc".to_string());
    assert_eq!(record.id, "abc");
    assert_eq!(record.make, "Honda");
    assert_eq!(record.vin, "VIN2");
    assert_eq!(record.features, vec!["AWD", "Sunroof"]);
}

#[test]
fn draft_available_defaults_to_true() {
    let json = r#"{
        "make": "Kia", "model": "Soul", "year": 2022, "condition": "used",
        "body_type": "hatchback", "transmission": "automatic", "fuel_type": "gasoline",
        "exterior_color": "Red", "interior_color": "Black", "engine": "2.0L",
        "price": 18000, "mileage": 21000, "vin": "KNDJ23AU1N7000001"
    }"#;
    let draft: VehicleDraft = serde_json::from_str(json).unwrap();
    assert!(draft.available);
    assert!(draft.features.is_empty());
}

#[test]
fn patch_applies_only_populated_fields() {
    let mut vehicle = make_test_vehicle("7", "Ford", "VIN7");
    let patch = VehiclePatch {
        price: Some(19999.0),
        available: Some(false),
        features: Some(vec!["4WD".to_string(), "4WD".to_string()]),
        ..Default::default()
    };

    patch.apply(&mut vehicle);
    assert_eq!(vehicle.id, "7");
    assert_eq!(vehicle.make, "Ford");
    assert_eq!(vehicle.price, 19999.0);
    assert!(!vehicle.available);
    assert_eq!(vehicle.features, vec!["4WD"]);
}

#[test]
fn loose_number_parses_scraped_text() {
    assert_eq!(LooseNumber::from("$45,900").as_f64(), Some(45900.0));
    assert_eq!(LooseNumber::from("12,500 mi").as_f64(), Some(12500.0));
    assert_eq!(LooseNumber::from(2023u32).as_f64(), Some(2023.0));
    assert_eq!(LooseNumber::from("call for price").as_f64(), None);
    assert_eq!(LooseNumber::from(f64::INFINITY).as_f64(), None);
}

#[test]
fn import_candidate_deserializes_scraped_listing() {
    let json = r#"{
        "id": "scraped_1",
        "make": "Chevrolet",
        "model": "Silverado 1500",
        "year": 2023,
        "price": "$45,900",
        "mileage": 12500,
        "vin": "1GCUYDED5PZ123456",
        "exterior_color": "Summit White",
        "interior_color": "Jet Black",
        "engine": "5.3L V8",
        "transmission": "automatic",
        "fuel_type": "gasoline",
        "features": ["4WD", "Crew Cab"],
        "description": "Low mileage truck",
        "images": ["https://example.com/1.jpg"],
        "stock_number": "FC2023001",
        "source": "freedom_chevrolet"
    }"#;

    let candidate: ImportCandidate = serde_json::from_str(json).unwrap();
    assert_eq!(candidate.model, "Silverado 1500");
    assert_eq!(candidate.price.as_ref().and_then(|p| p.as_f64()), Some(45900.0));
    assert_eq!(candidate.stock_number.as_deref(), Some("FC2023001"));
    assert!(candidate.url.is_none());
    assert!(candidate.body_type.is_none());
}

#[test]
fn import_candidate_treats_null_like_missing() {
    let json = r#"{
        "make": "Chevrolet",
        "model": "Equinox",
        "vin": "2GNAXSEV4P6789012",
        "engine": null,
        "fuelType": null,
        "features": null,
        "images": null,
        "description": null,
        "price": null
    }"#;

    let candidate: ImportCandidate = serde_json::from_str(json).unwrap();
    assert_eq!(candidate.vin, "2GNAXSEV4P6789012");
    assert_eq!(candidate.engine, "");
    assert_eq!(candidate.fuel_type, "");
    assert!(candidate.features.is_empty());
    assert!(candidate.images.is_empty());
    assert!(candidate.price.is_none());
}

#[test]
fn vin_key_ignores_case_and_whitespace() {
    assert_eq!(vin_key(" 1gcuyded5pz123456 "), "1GCUYDED5PZ123456");
}

#[test]
fn new_vehicle_ids_are_unique() {
    let a = new_vehicle_id();
    let b = new_vehicle_id();
    assert_ne!(a, b);
    assert!(!a.is_empty());
}
