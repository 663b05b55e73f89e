// tests/store_env.rs
//
// Store selection is driven entirely by environment variables; these tests
// mutate process env, so they run serially.

use serial_test::serial;

use trendfeed::store::{self, RecordFilter, ENV_DATABASE_URL, ENV_SEED_PATH};

fn clear_env() {
    std::env::remove_var(ENV_DATABASE_URL);
    std::env::remove_var(ENV_SEED_PATH);
}

#[tokio::test]
#[serial]
async fn unconfigured_process_gets_a_disconnected_store() {
    clear_env();
    let store = store::from_env();
    let err = store
        .count(&RecordFilter::default())
        .await
        .expect_err("disconnected store must error");
    assert!(
        err.to_string().contains("not configured"),
        "got: {err}"
    );
}

#[tokio::test]
#[serial]
async fn seed_path_loads_an_in_memory_store() {
    clear_env();
    let path = std::env::temp_dir().join("trendfeed-store-env-seed.json");
    std::fs::write(&path, r#"[{"id": "s1", "title": "seeded"}]"#).expect("write seed");
    std::env::set_var(ENV_SEED_PATH, &path);

    let store = store::from_env();
    let total = store.count(&RecordFilter::default()).await.expect("count");
    assert_eq!(total, 1);

    std::env::remove_var(ENV_SEED_PATH);
    let _ = std::fs::remove_file(&path);
}
