use axum::body::Bytes;
use serial_test::serial;
use std::env;
use tempfile::TempDir;
use user_registry_server::{
    config::Config,
    database::Database,
    error::AppError,
    service::UserService,
    storage::BlobStore,
    upload::{UploadedFile, UserForm},
};

struct Harness {
    service: UserService,
    db: Database,
    blobs: BlobStore,
    upload_dir: TempDir,
}

fn test_config(database_url: &str) -> Config {
    Config {
        database_url: database_url.to_string(),
        database_max_connections: 5,
        database_acquire_timeout: 5,
        database_idle_timeout: 60,
        port: 0,
        upload_dir: "./uploads".to_string(),
        upload_field: "photo".to_string(),
        allowed_mime_types: vec!["image/jpeg".to_string(), "image/png".to_string()],
        max_file_size: 4096,
        environment: "test".to_string(),
    }
}

async fn setup() -> Option<Harness> {
    let Ok(database_url) = env::var("TEST_DATABASE_URL") else {
        eprintln!("TEST_DATABASE_URL not set, skipping service test");
        return None;
    };

    let db = Database::new(&test_config(&database_url))
        .await
        .expect("Failed to connect to test database");
    db.ensure_schema().await.expect("Failed to create schema");
    sqlx::query("TRUNCATE TABLE users RESTART IDENTITY")
        .execute(db.pool())
        .await
        .expect("Failed to clean test database");

    let upload_dir = TempDir::new().expect("Failed to create temp dir");
    let blobs = BlobStore::new(upload_dir.path()).expect("Failed to create blob store");

    Some(Harness {
        service: UserService::new(db.clone(), blobs.clone()),
        db,
        blobs,
        upload_dir,
    })
}

fn form(name: &str, email: &str, photo: Option<UploadedFile>) -> UserForm {
    UserForm {
        name: name.to_string(),
        email: email.to_string(),
        photo,
    }
}

fn png_upload(bytes: &'static [u8]) -> UploadedFile {
    UploadedFile {
        original_name: "portrait.png".to_string(),
        content_type: "image/png".to_string(),
        data: Bytes::from_static(bytes),
    }
}

fn blob_count(harness: &Harness) -> usize {
    std::fs::read_dir(harness.upload_dir.path()).unwrap().count()
}

#[tokio::test]
#[serial]
async fn test_create_with_photo_writes_blob() {
    let Some(harness) = setup().await else { return };

    let user = harness
        .service
        .create_user(form("Ada", "ada@example.com", Some(png_upload(b"png bytes"))))
        .await
        .unwrap();

    let stored = user.photo.expect("photo reference missing");
    let path = harness
        .blobs
        .resolve(&stored)
        .expect("stored name should resolve");
    assert_eq!(std::fs::read(path).unwrap(), b"png bytes");
    assert_eq!(blob_count(&harness), 1);
}

#[tokio::test]
#[serial]
async fn test_create_without_photo_stores_null_reference() {
    let Some(harness) = setup().await else { return };

    let user = harness
        .service
        .create_user(form("Ada", "ada@example.com", None))
        .await
        .unwrap();

    assert!(user.photo.is_none());
    assert_eq!(blob_count(&harness), 0);
}

#[tokio::test]
#[serial]
async fn test_create_with_blank_name_leaves_nothing_behind() {
    let Some(harness) = setup().await else { return };

    let err = harness
        .service
        .create_user(form("   ", "ada@example.com", Some(png_upload(b"png"))))
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::Validation(_)));
    assert_eq!(blob_count(&harness), 0);
    assert!(harness.service.list_users().await.unwrap().is_empty());
}

#[tokio::test]
#[serial]
async fn test_insert_failure_discards_freshly_written_blob() {
    let Some(harness) = setup().await else { return };

    // Drop the table so the insert fails after the blob write. The next
    // test's setup recreates it.
    sqlx::query("DROP TABLE users")
        .execute(harness.db.pool())
        .await
        .unwrap();

    let err = harness
        .service
        .create_user(form("Ada", "ada@example.com", Some(png_upload(b"orphan"))))
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::Database(_)));
    assert_eq!(blob_count(&harness), 0);
}

#[tokio::test]
#[serial]
async fn test_update_with_new_photo_replaces_old_blob() {
    let Some(harness) = setup().await else { return };

    let user = harness
        .service
        .create_user(form("Ada", "ada@example.com", Some(png_upload(b"old"))))
        .await
        .unwrap();
    let old_name = user.photo.clone().unwrap();

    let updated = harness
        .service
        .update_user(
            user.id,
            form("Ada", "ada@example.com", Some(png_upload(b"new"))),
        )
        .await
        .unwrap();
    let new_name = updated.photo.unwrap();

    assert_ne!(new_name, old_name);
    assert_eq!(blob_count(&harness), 1);
    let path = harness.blobs.resolve(&new_name).unwrap();
    assert_eq!(std::fs::read(path).unwrap(), b"new");
}

#[tokio::test]
#[serial]
async fn test_update_without_photo_keeps_existing_blob() {
    let Some(harness) = setup().await else { return };

    let user = harness
        .service
        .create_user(form("Ada", "ada@example.com", Some(png_upload(b"keep me"))))
        .await
        .unwrap();
    let stored = user.photo.clone().unwrap();

    let updated = harness
        .service
        .update_user(user.id, form("Ada L.", "ada.l@example.com", None))
        .await
        .unwrap();

    assert_eq!(updated.photo.as_deref(), Some(stored.as_str()));
    assert_eq!(updated.name, "Ada L.");
    let path = harness.blobs.resolve(&stored).unwrap();
    assert_eq!(std::fs::read(path).unwrap(), b"keep me");
}

#[tokio::test]
#[serial]
async fn test_update_unknown_id_is_not_found_and_leaves_no_orphan() {
    let Some(harness) = setup().await else { return };

    let err = harness
        .service
        .update_user(
            9999,
            form("Ghost", "ghost@example.com", Some(png_upload(b"orphan?"))),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::NotFound));
    assert_eq!(blob_count(&harness), 0);
}

#[tokio::test]
#[serial]
async fn test_delete_removes_record_and_blob() {
    let Some(harness) = setup().await else { return };

    let user = harness
        .service
        .create_user(form("Ada", "ada@example.com", Some(png_upload(b"gone soon"))))
        .await
        .unwrap();

    let deleted = harness.service.delete_user(user.id).await.unwrap();
    assert_eq!(deleted.id, user.id);
    assert_eq!(blob_count(&harness), 0);

    let err = harness.service.get_user(user.id).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound));
}

#[tokio::test]
#[serial]
async fn test_delete_unknown_id_is_not_found() {
    let Some(harness) = setup().await else { return };

    let err = harness.service.delete_user(9999).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound));
}

#[tokio::test]
#[serial]
async fn test_concurrent_creates_with_same_filename_never_collide() {
    let Some(harness) = setup().await else { return };

    let mut handles = Vec::new();
    for i in 0..8 {
        let service = harness.service.clone();
        handles.push(tokio::spawn(async move {
            service
                .create_user(UserForm {
                    name: format!("User {}", i),
                    email: format!("user{}@example.com", i),
                    photo: Some(png_upload(b"same original name")),
                })
                .await
        }));
    }

    let mut ids = Vec::new();
    let mut names = Vec::new();
    for handle in handles {
        let user = handle.await.unwrap().unwrap();
        ids.push(user.id);
        names.push(user.photo.unwrap());
    }

    ids.sort_unstable();
    ids.dedup();
    assert_eq!(ids.len(), 8);

    names.sort();
    names.dedup();
    assert_eq!(names.len(), 8);
    assert_eq!(blob_count(&harness), 8);
}
