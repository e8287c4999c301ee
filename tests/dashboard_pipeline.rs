use std::collections::HashSet;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use vizcount::catalogue::DEFAULT_EXPIRY_OFFSETS;
use vizcount::generator::RecordGenerator;
use vizcount::prelude::*;

fn start_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 12, 30).unwrap()
}

fn aggregator_with(catalogue: Catalogue, clock: Arc<ManualClock>) -> Aggregator {
    Aggregator::with_catalogue(Arc::new(catalogue), clock).unwrap()
}

#[tokio::test]
async fn every_record_holds_its_invariants() {
    let clock = Arc::new(ManualClock::new(start_date()));
    let aggregator = aggregator_with(Catalogue::default(), clock.clone());

    for day in 0..5 {
        let today = clock.today();
        let all = aggregator.get_all().await.unwrap();

        for record in all.iter() {
            assert_eq!(record.total_count, record.cooler_count + record.floor_count);
            assert_eq!(record.days_to_expiry, (record.expiry_date - today).num_days());
            assert!((8..=80).contains(&record.cooler_count), "day {day}: {record:?}");
            assert!((2..=25).contains(&record.floor_count), "day {day}: {record:?}");
            assert!(DEFAULT_EXPIRY_OFFSETS.contains(&record.days_to_expiry), "day {day}: {record:?}");
        }

        // Crosses the year boundary on the way.
        clock.advance_days(1);
    }
}

#[tokio::test]
async fn categories_follow_the_catalogue() {
    let aggregator = aggregator_with(Catalogue::default(), Arc::new(ManualClock::new(start_date())));
    let catalogue = aggregator.catalogue();

    let mut expected_all = Vec::new();
    for category in catalogue.categories() {
        let records = aggregator.get_category(category.name()).await.unwrap();
        let products = records.iter().map(|r| r.product.clone()).collect::<Vec<_>>();
        assert_eq!(products, category.products());
        assert_eq!(products.iter().collect::<HashSet<_>>().len(), products.len());
        expected_all.extend(products);
    }

    let all = aggregator.get_all().await.unwrap();
    assert_eq!(all.len(), catalogue.product_count());
    assert_eq!(all.iter().map(|r| r.product.clone()).collect::<Vec<_>>(), expected_all);
}

#[tokio::test]
async fn single_product_catalogue_is_reproducible() {
    let catalogue = || Catalogue::from_json_str(r#"{"categories": [{"name": "Beef", "products": ["Ribeye Steak"]}]}"#);

    let first = aggregator_with(catalogue().unwrap(), Arc::new(ManualClock::new(start_date())))
        .get_category("Beef")
        .await
        .unwrap();

    // Default seed 42.
    assert_eq!(
        *first,
        [InventoryRecord {
            product:        "Ribeye Steak".to_string(),
            cooler_count:   46,
            floor_count:    7,
            expiry_date:    NaiveDate::from_ymd_opt(2025, 12, 29).unwrap(),
            days_to_expiry: -1,
            total_count:    53,
        }]
    );

    for _ in 0..5 {
        let clock = Arc::new(ManualClock::new(start_date()));
        let aggregator = aggregator_with(catalogue().unwrap(), clock.clone());
        let fresh = aggregator.get_category("Beef").await.unwrap();
        assert_eq!(*fresh, *first);

        // A stale entry regenerates to the very same values.
        clock.advance(Duration::from_secs(61));
        assert_eq!(aggregator.entry_state(&MemoKey::Category("Beef".into())).await.unwrap(), EntryState::Stale);
        assert_eq!(*aggregator.get_category("Beef").await.unwrap(), *first);
    }
}

#[test]
fn first_record_of_every_category_draws_alike() {
    let generator = RecordGenerator::builder()
        .catalogue(Arc::new(Catalogue::default()))
        .build()
        .unwrap();
    let firsts = ["Beef", "Pork", "Chicken", "Seafood", "Halal"]
        .iter()
        .map(|category| {
            let draw = generator.generate_seeded(category, start_date()).unwrap().remove(0);
            (draw.cooler_count, draw.floor_count, draw.expiry_date)
        })
        .collect::<HashSet<_>>();

    assert_eq!(firsts.len(), 1);
}

#[tokio::test]
async fn repeated_calls_within_ttl_share_the_collection() {
    let clock = Arc::new(ManualClock::new(start_date()));
    let aggregator = aggregator_with(Catalogue::default(), clock.clone());

    let first = aggregator.get_category("Beef").await.unwrap();
    clock.advance(Duration::from_secs(59));
    let second = aggregator.get_category("Beef").await.unwrap();

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(*first, *second);
}

#[tokio::test]
async fn unknown_category_has_no_side_effects() {
    let aggregator = aggregator_with(Catalogue::default(), Arc::new(ManualClock::new(start_date())));

    let err = aggregator.get_category("NotARealCategory").await.unwrap_err();
    assert!(matches!(err, VizError::UnknownCategory(ref name) if name == "NotARealCategory"));
    assert_eq!(err.to_string(), "unknown category 'NotARealCategory'");

    assert_eq!(
        aggregator
            .entry_state(&MemoKey::Category("NotARealCategory".into()))
            .await
            .unwrap(),
        EntryState::Absent
    );
    assert_eq!(aggregator.entry_state(&MemoKey::All).await.unwrap(), EntryState::Absent);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_readers_populate_once() {
    let aggregator = Arc::new(aggregator_with(
        Catalogue::default(),
        Arc::new(ManualClock::new(start_date())),
    ));
    let mut tasks = tokio::task::JoinSet::new();

    for _ in 0..32 {
        let aggregator = aggregator.clone();
        tasks.spawn(async move { aggregator.get_category("Chicken").await.unwrap() });
    }

    let mut results = Vec::new();
    while let Some(res) = tasks.join_next().await {
        results.push(res.unwrap());
    }

    // A single generation means a single shared collection.
    assert!(results.windows(2).all(|pair| Arc::ptr_eq(&pair[0], &pair[1])));
}

#[tokio::test]
async fn catalogue_file_drives_the_dashboard() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"{{
            "categories": [
                {{ "name": "Lamb", "products": ["Lamb Chops", "Leg of Lamb"] }},
                {{ "name": "Deli", "products": ["Salami"] }}
            ],
            "expiry_offsets": [-1, 0, 1]
        }}"#
    )
    .unwrap();

    let catalogue = Catalogue::load(file.path()).unwrap();
    let aggregator = aggregator_with(catalogue, Arc::new(ManualClock::new(start_date())));

    let all = aggregator.get_all().await.unwrap();
    assert_eq!(
        all.iter().map(|r| r.product.as_str()).collect::<Vec<_>>(),
        ["Lamb Chops", "Leg of Lamb", "Salami"]
    );
    assert!(all.iter().all(|r| (-1..=1).contains(&r.days_to_expiry)));

    let kpis = Kpis::from_records(&all);
    assert_eq!(kpis.unique_products, 3);
    assert_eq!(
        kpis.total_cooler + kpis.total_floor,
        all.iter().map(|r| u64::from(r.total_count)).sum::<u64>()
    );
    assert!(matches!(
        aggregator.get_category("Beef").await,
        Err(VizError::UnknownCategory(_))
    ));
}

#[test]
fn invalid_catalogue_files_are_rejected() {
    for json in [
        r#"{"categories": []}"#,
        r#"{"categories": [{"name": "Beef", "products": []}]}"#,
        r#"{"categories": [{"name": "Beef", "products": ["A", "A"]}]}"#,
        r#"{"categories": [{"name": "Beef", "products": ["A"]}], "expiry_offsets": []}"#,
        r#"{"categories": [{"name": "Beef", "products": ["A"]}], "expiry_offsets": [100000000]}"#,
        r#"{"categories": [{"name": "Beef", "products": ["A"]}], "colour": "red"}"#,
    ] {
        assert!(
            matches!(Catalogue::from_json_str(json), Err(VizError::InvalidCatalogue(_))),
            "{json}"
        );
    }
}
