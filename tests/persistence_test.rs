use auriga::persistence::{JsonStateStore, StateStore, decode};
use serde_json::{Map, json};

fn updates(pairs: &[(&str, serde_json::Value)]) -> Map<String, serde_json::Value> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

#[test]
fn multi_key_write_is_visible_per_entity() {
    let tmp = tempfile::NamedTempFile::new().unwrap();
    let mut store = JsonStateStore::new(&tmp.path().to_string_lossy());

    store
        .set_all(
            "tariff_home",
            updates(&[
                ("current_rate", json!(9.24)),
                ("api_today", json!("2021-01-15")),
                ("api_afternoon_refresh", json!(false)),
            ]),
        )
        .unwrap();

    assert_eq!(store.get("tariff_home", "current_rate"), Some(json!(9.24)));
    assert_eq!(store.get("charger", "current_rate"), None);
    let all = store.entity_state("tariff_home").unwrap();
    assert_eq!(all.len(), 3);
}

#[test]
fn state_survives_reload() {
    let tmp = tempfile::NamedTempFile::new().unwrap();
    let path = tmp.path().to_string_lossy().to_string();

    let mut store = JsonStateStore::new(&path);
    store
        .set_all(
            "charger",
            updates(&[
                ("charge_hours_delivered", json!(2.5)),
                ("on", json!(true)),
                ("current_from_period", json!("2021-01-15T04:30:00Z")),
            ]),
        )
        .unwrap();

    let mut reloaded = JsonStateStore::new(&path);
    reloaded.load().unwrap();
    assert_eq!(
        decode::<f64>(reloaded.get("charger", "charge_hours_delivered")),
        Some(2.5)
    );
    assert_eq!(decode::<bool>(reloaded.get("charger", "on")), Some(true));
    assert_eq!(
        decode::<String>(reloaded.get("charger", "current_from_period")),
        Some("2021-01-15T04:30:00Z".to_string())
    );
}

#[test]
fn missing_file_loads_empty() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("does_not_exist.json");
    let mut store = JsonStateStore::new(&path.to_string_lossy());
    store.load().unwrap();
    assert_eq!(store.get("anything", "key"), None);
}

#[test]
fn decode_tolerates_type_mismatch() {
    let tmp = tempfile::NamedTempFile::new().unwrap();
    let mut store = JsonStateStore::new(&tmp.path().to_string_lossy());
    store
        .set_all("e", updates(&[("api_today", json!("API Refresh Failed"))]))
        .unwrap();
    // A failure marker is not a date; typed decode yields None, not a panic
    assert_eq!(decode::<u32>(store.get("e", "api_today")), None);
}
