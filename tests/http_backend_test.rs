use timetable_grid::grid::EntryFilter;
use timetable_grid::persistence::{HttpBackendConfig, HttpTimetableBackend, TimetableBackend};
use uuid::Uuid;

#[tokio::test]
#[ignore] // Run with: cargo test -- --ignored --test-threads=1
async fn test_fetch_timetable_from_service() {
    // Load environment variables
    dotenvy::dotenv().ok();

    let config = HttpBackendConfig::new_from_env().expect("Failed to load backend config");
    let backend = HttpTimetableBackend::new(config).expect("Failed to create backend client");

    let uuid: Uuid = std::env::var("TIMETABLE_TEST_UUID")
        .expect("TIMETABLE_TEST_UUID must be set")
        .parse()
        .expect("TIMETABLE_TEST_UUID must be a uuid");

    let timetable = backend
        .fetch_timetable_by_uuid(uuid)
        .await
        .expect("Failed to fetch timetable");
    assert_eq!(timetable.uuid, uuid);
    println!("✓ Fetched {} entries", timetable.entries.len());

    let entries = backend
        .filter_timetable_entries(uuid, &EntryFilter::default())
        .await
        .expect("Failed to filter entries");
    assert!(entries.len() <= timetable.entries.len());
    println!("✓ Filter returned {} entries", entries.len());
}

#[tokio::test]
#[ignore]
async fn test_unknown_timetable_is_backend_error() {
    dotenvy::dotenv().ok();

    let config = HttpBackendConfig::new_from_env().expect("Failed to load backend config");
    let backend = HttpTimetableBackend::new(config).expect("Failed to create backend client");

    let err = backend
        .fetch_timetable_by_uuid(Uuid::new_v4())
        .await
        .unwrap_err();
    println!("Unknown timetable: {}", err);
}
