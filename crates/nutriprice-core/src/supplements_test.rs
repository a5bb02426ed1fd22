use chrono::Utc;

use super::*;

fn brand(price: Option<f64>) -> Brand {
    Brand {
        brand_name: "Hardline".to_string(),
        product_link: "https://www.trendyol.com/hardline/whey-p-1".to_string(),
        price,
        scale: None,
    }
}

fn approx(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}

#[test]
fn average_ignores_brands_without_valid_price() {
    let brands = vec![brand(Some(100.0)), brand(None), brand(Some(200.0)), brand(Some(f64::NAN))];
    let avg = average_price(&brands).expect("average");
    assert!(approx(avg, 150.0), "got {avg}");
}

#[test]
fn average_is_none_when_nothing_is_priced() {
    assert_eq!(average_price(&[]), None);
    assert_eq!(average_price(&[brand(None), brand(Some(f64::INFINITY))]), None);
}

#[test]
fn zero_counts_as_a_real_price() {
    let avg = average_price(&[brand(Some(0.0)), brand(Some(10.0))]).expect("average");
    assert!(approx(avg, 5.0));
}

#[test]
fn recompute_keeps_previous_average_without_valid_prices() {
    let now = Utc::now();
    let mut supplement = Supplement {
        id: Uuid::new_v4(),
        name: "Creatine".to_string(),
        amount: None,
        category: None,
        kind: "creatine".to_string(),
        average_price: 42.5,
        brands: vec![brand(None)],
        created_at: now,
        updated_at: now,
    };

    assert!(!supplement.recompute_average());
    assert!(approx(supplement.average_price, 42.5));

    supplement.brands.push(brand(Some(40.0)));
    assert!(supplement.recompute_average());
    assert!(approx(supplement.average_price, 40.0));
    assert!(!supplement.recompute_average(), "unchanged average reports false");
}

#[test]
fn extracted_price_is_divided_by_scale() {
    let mut b = brand(Some(1.0));
    b.scale = Some(2.0);
    assert!(b.apply_extracted_price(199.90));
    assert!(approx(b.price.expect("price"), 99.95));
}

#[test]
fn unusable_scale_falls_back_to_one() {
    let mut b = brand(None);
    b.scale = Some(0.0);
    assert!(approx(b.divisor(), 1.0));
    b.scale = Some(f64::NAN);
    assert!(approx(b.divisor(), 1.0));
}

#[test]
fn non_finite_extracted_price_keeps_previous_value() {
    let mut b = brand(Some(12.0));
    assert!(!b.apply_extracted_price(f64::NAN));
    assert_eq!(b.price, Some(12.0));
}

#[test]
fn new_supplement_requires_name_and_type() {
    let missing_name = NewSupplement {
        kind: Some("protein".to_string()),
        ..NewSupplement::default()
    };
    assert!(matches!(
        missing_name.into_supplement(Utc::now()),
        Err(CoreError::MissingField(ref f)) if f == "name"
    ));

    let blank_type = NewSupplement {
        name: Some("Whey".to_string()),
        kind: Some("   ".to_string()),
        ..NewSupplement::default()
    };
    assert!(matches!(
        blank_type.into_supplement(Utc::now()),
        Err(CoreError::MissingField(ref f)) if f == "type"
    ));
}

#[test]
fn new_supplement_reports_missing_brand_fields_with_index() {
    let input = NewSupplement {
        name: Some("Whey".to_string()),
        kind: Some("protein".to_string()),
        brands: vec![
            BrandInput {
                brand_name: Some("A".to_string()),
                product_link: Some("https://www.trendyol.com/a".to_string()),
                ..BrandInput::default()
            },
            BrandInput {
                brand_name: Some("B".to_string()),
                ..BrandInput::default()
            },
        ],
        ..NewSupplement::default()
    };
    let err = input.into_supplement(Utc::now()).unwrap_err();
    assert!(
        matches!(err, CoreError::MissingField(ref f) if f == "brands[1].productLink"),
        "got {err:?}"
    );
}

#[test]
fn brand_input_rejects_non_http_link_and_bad_scale() {
    let bad_link = BrandInput {
        brand_name: Some("A".to_string()),
        product_link: Some("ftp://example.com".to_string()),
        ..BrandInput::default()
    };
    assert!(matches!(bad_link.validate(0), Err(CoreError::InvalidField { .. })));

    let bad_scale = BrandInput {
        brand_name: Some("A".to_string()),
        product_link: Some("https://example.com".to_string()),
        scale: Some(0.0),
        ..BrandInput::default()
    };
    assert!(matches!(
        bad_scale.validate(3),
        Err(CoreError::InvalidField { ref field, .. }) if field == "brands[3].scale"
    ));
}

#[test]
fn new_supplement_trims_and_seeds_average_from_supplied_prices() {
    let input = NewSupplement {
        name: Some("  Omega 3 ".to_string()),
        amount: Some(" ".to_string()),
        category: Some("oils".to_string()),
        kind: Some("omega".to_string()),
        brands: vec![BrandInput {
            brand_name: Some(" Nutrition X ".to_string()),
            product_link: Some("https://shop.example.com/omega".to_string()),
            price: Some(80.0),
            scale: None,
        }],
    };
    let s = input.into_supplement(Utc::now()).expect("valid");
    assert_eq!(s.name, "Omega 3");
    assert_eq!(s.amount, None);
    assert_eq!(s.category.as_deref(), Some("oils"));
    assert_eq!(s.brands[0].brand_name, "Nutrition X");
    assert!(approx(s.average_price, 80.0));
}

#[test]
fn new_supplement_without_prices_starts_at_zero() {
    let input = NewSupplement {
        name: Some("Zinc".to_string()),
        kind: Some("mineral".to_string()),
        ..NewSupplement::default()
    };
    let s = input.into_supplement(Utc::now()).expect("valid");
    assert!(s.brands.is_empty());
    assert!(approx(s.average_price, 0.0));
}

#[test]
fn patch_validation_only_checks_supplied_fields() {
    let changes = SupplementPatch {
        category: Some(" vitamins ".to_string()),
        ..SupplementPatch::default()
    }
    .validate()
    .expect("valid");
    assert_eq!(changes.category.as_deref(), Some("vitamins"));
    assert!(changes.name.is_none());
    assert!(changes.brands.is_none());

    let blank_name = SupplementPatch {
        name: Some(String::new()),
        ..SupplementPatch::default()
    };
    assert!(blank_name.validate().is_err());
}

#[test]
fn patch_treats_blank_optional_text_as_absent() {
    let changes = SupplementPatch {
        amount: Some("   ".to_string()),
        category: Some(String::new()),
        ..SupplementPatch::default()
    }
    .validate()
    .expect("valid");
    assert_eq!(changes, SupplementChanges::default());

    let created = NewSupplement {
        name: Some("Whey".to_string()),
        kind: Some("protein".to_string()),
        amount: Some("   ".to_string()),
        ..NewSupplement::default()
    }
    .into_supplement(Utc::now())
    .expect("valid");
    assert!(created.amount.is_none());
}

#[test]
fn changes_apply_in_place() {
    let created = Utc::now();
    let mut s = NewSupplement {
        name: Some("Whey".to_string()),
        kind: Some("protein".to_string()),
        ..NewSupplement::default()
    }
    .into_supplement(created)
    .expect("valid");

    let later = created + chrono::Duration::seconds(5);
    SupplementChanges::prices(vec![brand(Some(10.0))], 10.0).apply_to(&mut s, later);

    assert_eq!(s.brands.len(), 1);
    assert!(approx(s.average_price, 10.0));
    assert_eq!(s.name, "Whey");
    assert_eq!(s.created_at, created);
    assert_eq!(s.updated_at, later);
}

#[test]
fn supplement_serializes_with_camel_case_wire_names() {
    let s = NewSupplement {
        name: Some("Whey".to_string()),
        kind: Some("protein".to_string()),
        brands: vec![BrandInput {
            brand_name: Some("A".to_string()),
            product_link: Some("https://example.com/a".to_string()),
            price: Some(5.0),
            scale: Some(2.0),
        }],
        ..NewSupplement::default()
    }
    .into_supplement(Utc::now())
    .expect("valid");

    let json = serde_json::to_value(&s).expect("serialize");
    assert_eq!(json["type"], "protein");
    assert!(json["averagePrice"].is_number());
    assert_eq!(json["brands"][0]["brandName"], "A");
    assert_eq!(json["brands"][0]["productLink"], "https://example.com/a");
    assert!(json["createdAt"].is_string());
}

#[test]
fn patch_deserializes_from_wire_json() {
    let patch: SupplementPatch = serde_json::from_value(serde_json::json!({
        "type": "protein",
        "brands": [{ "brandName": "A", "productLink": "https://example.com", "scale": 3 }]
    }))
    .expect("deserialize");
    assert_eq!(patch.kind.as_deref(), Some("protein"));
    let brands = patch.brands.expect("brands");
    assert_eq!(brands[0].scale, Some(3.0));
}
