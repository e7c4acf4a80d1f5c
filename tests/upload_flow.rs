//! End-to-end scenarios through the service facade.

use bytes::Bytes;
use serde_json::json;
use tempfile::TempDir;

use lanshare::{TransferError, TransferService};

fn write_config(dir: &TempDir, stores: serde_json::Value) -> std::path::PathBuf {
    let path = dir.path().join("config.json");
    let document = json!({
        "service_name": "test transfer",
        "max_file_size_gb": 1,
        "allowed_extensions": ["txt", "pdf"],
        "trans_stores": stores,
    });
    std::fs::write(&path, serde_json::to_vec_pretty(&document).unwrap()).unwrap();
    path
}

#[tokio::test]
async fn test_upload_lands_in_single_store_and_lists() {
    let dir = TempDir::new().unwrap();
    let store_path = dir.path().join("trans_store");
    let config = write_config(
        &dir,
        json!([{ "name": "trans_store_1", "path": store_path.to_str().unwrap(), "enabled": true }]),
    );

    let service = TransferService::new(config);
    service.initialize().await.unwrap();

    let stored = service
        .upload("report.pdf", Bytes::from(vec![0u8; 1024]))
        .await
        .unwrap();
    assert_eq!(stored.stored_name, "report.pdf");
    assert_eq!(stored.store_name, "trans_store_1");
    assert_eq!(stored.size, 1024);

    let files = service.list(false).await.unwrap();
    assert_eq!(files.len(), 1);
    assert_eq!(files[0].name, "report.pdf");
    assert_eq!(files[0].store_name, "trans_store_1");
    assert_eq!(files[0].size, 1024);
    assert!(store_path.join("report.pdf").is_file());
}

#[tokio::test]
async fn test_disallowed_extension_rejected_without_touching_stores() {
    let dir = TempDir::new().unwrap();
    let store_path = dir.path().join("store");
    let config = write_config(
        &dir,
        json!([{ "name": "only", "path": store_path.to_str().unwrap(), "enabled": true }]),
    );

    let service = TransferService::new(config);
    service.initialize().await.unwrap();

    let err = service
        .upload("tool.exe", Bytes::from_static(b"MZ"))
        .await
        .unwrap_err();
    assert!(matches!(err, TransferError::DisallowedExtension(_)));

    assert!(service.list(false).await.unwrap().is_empty());
    assert_eq!(std::fs::read_dir(&store_path).unwrap().count(), 0);
}

#[tokio::test]
async fn test_upload_over_global_size_limit_rejected() {
    let dir = TempDir::new().unwrap();
    let store_path = dir.path().join("store");
    let path = dir.path().join("config.json");
    // A 0 GB global limit admits nothing.
    let document = json!({
        "service_name": "test transfer",
        "max_file_size_gb": 0,
        "allowed_extensions": ["txt"],
        "trans_stores": [{ "name": "only", "path": store_path.to_str().unwrap(), "enabled": true }],
    });
    std::fs::write(&path, serde_json::to_vec_pretty(&document).unwrap()).unwrap();

    let service = TransferService::new(path);
    service.initialize().await.unwrap();

    let err = service
        .upload("big.txt", Bytes::from_static(b"x"))
        .await
        .unwrap_err();
    assert!(matches!(err, TransferError::TooLarge { size: 1, limit: 0 }));
    assert!(service.list(false).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_all_stores_unreachable_degrades_without_failing() {
    let dir = TempDir::new().unwrap();
    // Paths under a regular file cannot be provisioned.
    let blocker = dir.path().join("blocker");
    std::fs::write(&blocker, b"x").unwrap();
    let config = write_config(
        &dir,
        json!([
            { "name": "bad1", "path": blocker.join("s1").to_str().unwrap(), "enabled": true },
            { "name": "bad2", "path": blocker.join("s2").to_str().unwrap(), "enabled": true },
        ]),
    );

    let service = TransferService::new(config);
    service.initialize().await.unwrap();

    assert!(service.effective_stores().await.is_empty());
    assert_eq!(service.diagnostics().await.len(), 2);
    assert!(service.list(false).await.unwrap().is_empty());

    let err = service
        .upload("a.txt", Bytes::from_static(b"hi"))
        .await
        .unwrap_err();
    assert!(matches!(err, TransferError::CapacityExceeded { .. }));
}

#[tokio::test]
async fn test_delete_invalidates_catalog_before_returning() {
    let dir = TempDir::new().unwrap();
    let store_path = dir.path().join("store");
    let config = write_config(
        &dir,
        json!([{ "name": "only", "path": store_path.to_str().unwrap(), "enabled": true }]),
    );

    let service = TransferService::new(config);
    service.initialize().await.unwrap();

    service.upload("keep.txt", Bytes::from_static(b"keep")).await.unwrap();
    service.upload("gone.txt", Bytes::from_static(b"gone")).await.unwrap();
    assert_eq!(service.list(false).await.unwrap().len(), 2);

    service.delete("gone.txt").await.unwrap();

    let files = service.list(false).await.unwrap();
    assert_eq!(files.len(), 1);
    assert_eq!(files[0].name, "keep.txt");

    let err = service.delete("gone.txt").await.unwrap_err();
    assert!(matches!(err, TransferError::NotFound(_)));
}

#[tokio::test]
async fn test_uploads_spill_to_next_store_when_cap_reached() {
    let dir = TempDir::new().unwrap();
    let a_path = dir.path().join("a");
    let b_path = dir.path().join("b");
    let config = write_config(
        &dir,
        json!([
            { "name": "a", "path": a_path.to_str().unwrap(), "max_size": 1500, "enabled": true },
            { "name": "b", "path": b_path.to_str().unwrap(), "enabled": true },
        ]),
    );

    let service = TransferService::new(config);
    service.initialize().await.unwrap();

    let first = service
        .upload("f1.txt", Bytes::from(vec![b'x'; 1024]))
        .await
        .unwrap();
    assert_eq!(first.store_name, "a");

    let second = service
        .upload("f2.txt", Bytes::from(vec![b'y'; 1024]))
        .await
        .unwrap();
    assert_eq!(second.store_name, "b");

    assert!(a_path.join("f1.txt").is_file());
    assert!(b_path.join("f2.txt").is_file());
}

#[tokio::test]
async fn test_external_config_edit_picked_up_without_restart() {
    let dir = TempDir::new().unwrap();
    let first_path = dir.path().join("first");
    let config = write_config(
        &dir,
        json!([{ "name": "first", "path": first_path.to_str().unwrap(), "enabled": true }]),
    );

    let service = TransferService::new(config.clone());
    service.initialize().await.unwrap();
    service.upload("one.txt", Bytes::from_static(b"1")).await.unwrap();
    assert_eq!(service.list(false).await.unwrap().len(), 1);

    // Second store appears via an external edit to the document.
    let second_path = dir.path().join("second");
    std::fs::create_dir_all(&second_path).unwrap();
    std::fs::write(second_path.join("two.txt"), b"2").unwrap();

    // mtime resolution guard
    std::thread::sleep(std::time::Duration::from_millis(20));
    std::fs::write(
        &config,
        serde_json::to_vec_pretty(&json!({
            "service_name": "test transfer",
            "max_file_size_gb": 1,
            "allowed_extensions": ["txt", "pdf"],
            "trans_stores": [
                { "name": "first", "path": first_path.to_str().unwrap(), "enabled": true },
                { "name": "second", "path": second_path.to_str().unwrap(), "enabled": true },
            ],
        }))
        .unwrap(),
    )
    .unwrap();

    let files = service.list(false).await.unwrap();
    let names: Vec<&str> = files.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(names, vec!["one.txt", "two.txt"]);
}

#[tokio::test]
async fn test_store_status_reports_usage_and_counts() {
    let dir = TempDir::new().unwrap();
    let store_path = dir.path().join("store");
    let config = write_config(
        &dir,
        json!([{ "name": "only", "path": store_path.to_str().unwrap(), "enabled": true }]),
    );

    let service = TransferService::new(config);
    service.initialize().await.unwrap();
    service.upload("f.txt", Bytes::from_static(b"data")).await.unwrap();

    let report = service.store_status().await.unwrap();
    assert_eq!(report.len(), 1);
    assert_eq!(report[0].name, "only");
    assert_eq!(report[0].store_number, 1);
    assert_eq!(report[0].file_count, 1);
    assert!(report[0].total_gb > 0.0);
    assert!(report[0].free_gb > 0.0);
    assert!(report[0].usage_percent >= 0.0 && report[0].usage_percent <= 100.0);
}
