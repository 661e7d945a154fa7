use std::io::Write;
use std::sync::Arc;

use blobrelay::batch::{run_batch, BatchPayload, BatchResult};
use blobrelay::config::{LogLevel, RelayConfig};
use blobrelay::{MemoryStore, ObjectLocation, TransferStatus};
use tempfile::NamedTempFile;

fn config() -> RelayConfig {
    RelayConfig {
        retry_delay_secs: 0,
        ..Default::default()
    }
}

#[tokio::test]
async fn test_batch_reports_each_object() {
    let store = Arc::new(MemoryStore::new());
    store.insert(&ObjectLocation::new("gs", "src", "a.bin"), vec![7u8; 1024]);
    store.insert(&ObjectLocation::new("gs", "src", "c.bin"), b"third".to_vec());

    let payload = BatchPayload::from_json(
        r#"{
            "objects": [
                {"source_uri": "gs://src/a.bin", "target_uri": "s3://dst/a.bin", "checksum": "yes"},
                {"source_uri": "gs://src/missing.bin", "target_uri": "s3://dst/b.bin"},
                {"source_uri": "gs://src/c.bin", "target_uri": "s3://dst/c.bin"}
            ],
            "defaults": {"checksum": "no", "max_workers": 1}
        }"#,
    )
    .unwrap();

    let response = run_batch(&payload, store.clone(), store.clone(), &config()).await;

    assert_eq!(response.results.len(), 3);
    assert_eq!(response.failed_count(), 1);
    assert!(response.has_problems());

    match &response.results[0] {
        BatchResult::Copied(outcome) => {
            assert_eq!(outcome.status, TransferStatus::SizeMatched);
            assert!(outcome.checksum_crc32c.is_some());
        }
        other => panic!("expected a copied object, got {:?}", other),
    }
    assert!(response.results[1].is_failed());
    assert!(!response.results[2].is_failed());

    // A failure in the middle does not stop later objects
    assert_eq!(
        store
            .object(&ObjectLocation::new("s3", "dst", "c.bin"))
            .unwrap()
            .as_ref(),
        b"third"
    );

    let json = serde_json::to_value(&response).unwrap();
    let failed = &json["results"][1];
    assert_eq!(failed["status"], "FAILED");
    assert_eq!(failed["err_code"], 500);
    assert!(failed["err_message"]
        .as_str()
        .unwrap()
        .contains("missing.bin"));
    assert_eq!(json["results"][2]["status"], "SIZE_MATCHED");
    assert_eq!(json["results"][2]["bucket_name"], "dst");
}

#[tokio::test]
async fn test_clean_batch_has_no_problems() {
    let store = Arc::new(MemoryStore::new());
    store.insert(&ObjectLocation::new("gs", "src", "a.bin"), b"alpha".to_vec());

    let payload = BatchPayload::from_json(
        r#"{"objects": [{"source_uri": "gs://src/a.bin", "target_uri": "s3://dst/a.bin"}]}"#,
    )
    .unwrap();

    let response = run_batch(&payload, store.clone(), store, &config()).await;
    assert!(!response.has_problems());
    assert_eq!(response.failed_count(), 0);
}

#[test]
fn test_payload_from_file() {
    let mut file = NamedTempFile::new().unwrap();
    write!(
        file,
        r#"{{"objects": [{{"source_uri": "gs://src/a.bin", "target_uri": "s3://dst/a.bin", "chunk_size": 8388608}}]}}"#
    )
    .unwrap();

    let payload = BatchPayload::from_file(file.path()).unwrap();
    assert_eq!(payload.objects.len(), 1);
    assert_eq!(payload.objects[0].chunk_size, Some(8 * 1024 * 1024));
}

#[test]
fn test_config_file_round_trip() {
    let file = NamedTempFile::new().unwrap();
    let config = RelayConfig {
        chunk_size: 16 * 1024 * 1024,
        max_workers: 4,
        checksum: true,
        log_level: LogLevel::Debug,
        s3_region: Some("eu-west-1".to_string()),
        ..Default::default()
    };

    config.to_file(file.path()).unwrap();
    let loaded = RelayConfig::from_file(file.path()).unwrap();
    assert_eq!(loaded, config);
}
