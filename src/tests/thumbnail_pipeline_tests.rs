use super::{encode_image, test_config, SOURCE_BUCKET};
use crate::error::ThumbnailError;
use crate::image_event::ImageEvent;
use crate::notifier::MemoryPublisher;
use crate::object_store::MemoryObjectStore;
use crate::safe_search::{FixedClassifier, SafeSearchVerdict, Severity};
use crate::thumbnail_pipeline::{ThumbnailOutcome, ThumbnailPipeline};
use image::ImageFormat;
use std::sync::Arc;

fn safe() -> SafeSearchVerdict {
    SafeSearchVerdict::new(Severity::VeryUnlikely, Severity::Unlikely)
}

async fn setup(
    verdict: Option<SafeSearchVerdict>,
    width: u32,
    height: u32,
) -> (ThumbnailPipeline, Arc<MemoryObjectStore>, Arc<FixedClassifier>) {
    let classifier = Arc::new(match verdict {
        Some(verdict) => FixedClassifier::new(verdict),
        None => FixedClassifier::failing(),
    });
    let store = Arc::new(MemoryObjectStore::new());
    store
        .insert(SOURCE_BUCKET, "photo.png", encode_image(width, height, ImageFormat::Png))
        .await;

    let pipeline = ThumbnailPipeline::new(&test_config(), classifier.clone(), store.clone());
    (pipeline, store, classifier)
}

fn event() -> ImageEvent {
    ImageEvent::new(SOURCE_BUCKET, "photo.png").unwrap()
}

#[tokio::test]
async fn test_wide_image_is_resized_and_stored() {
    let (pipeline, store, classifier) = setup(Some(safe()), 1000, 500).await;

    let outcome = pipeline.handle(&event()).await.unwrap();

    assert_eq!(classifier.calls(), 1);
    assert_eq!(
        outcome,
        ThumbnailOutcome::Completed {
            destination_bucket: "public-thumbnails".to_string(),
            destination_object_name: "thumbnail-photo.png".to_string(),
            resized: true,
            width: 280,
            height: 140,
            message_id: None,
        }
    );

    let writes = store.writes().await;
    assert_eq!(
        writes,
        vec![("public-thumbnails".to_string(), "thumbnail-photo.png".to_string())]
    );

    let stored = store
        .object("public-thumbnails", "thumbnail-photo.png")
        .await
        .unwrap();
    assert_eq!(stored.content_type, "image/png");
    let decoded = image::load_from_memory(&stored.data).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (280, 140));
}

#[tokio::test]
async fn test_small_image_is_copied_unchanged() {
    let (pipeline, store, _) = setup(Some(safe()), 200, 100).await;

    let outcome = pipeline.handle(&event()).await.unwrap();
    assert!(matches!(
        outcome,
        ThumbnailOutcome::Completed {
            resized: false,
            width: 200,
            height: 100,
            ..
        }
    ));

    let source = store.object(SOURCE_BUCKET, "photo.png").await.unwrap();
    let stored = store
        .object("public-thumbnails", "thumbnail-photo.png")
        .await
        .unwrap();
    assert_eq!(stored.data, source.data);
}

#[tokio::test]
async fn test_top_severity_is_rejected_without_writes() {
    for verdict in [
        SafeSearchVerdict::new(Severity::VeryLikely, Severity::Unknown),
        SafeSearchVerdict::new(Severity::VeryUnlikely, Severity::VeryLikely),
        SafeSearchVerdict::new(Severity::VeryLikely, Severity::VeryLikely),
    ] {
        let (pipeline, store, _) = setup(Some(verdict), 1000, 500).await;

        let outcome = pipeline.handle(&event()).await.unwrap();

        assert_eq!(outcome, ThumbnailOutcome::Rejected { verdict });
        assert!(store.writes().await.is_empty());
    }
}

#[tokio::test]
async fn test_likely_content_still_passes() {
    let verdict = SafeSearchVerdict::new(Severity::Likely, Severity::Likely);
    let (pipeline, store, _) = setup(Some(verdict), 300, 300).await;

    let outcome = pipeline.handle(&event()).await.unwrap();

    assert!(matches!(outcome, ThumbnailOutcome::Completed { width: 280, height: 280, .. }));
    assert_eq!(store.writes().await.len(), 1);
}

#[tokio::test]
async fn test_classification_failure_aborts_before_storage() {
    let (pipeline, store, classifier) = setup(None, 1000, 500).await;

    let err = pipeline.handle(&event()).await.unwrap_err();

    assert!(matches!(err, ThumbnailError::Classification(_)));
    assert_eq!(classifier.calls(), 1);
    assert!(store.writes().await.is_empty());
}

#[tokio::test]
async fn test_missing_source_object() {
    let (pipeline, store, _) = setup(Some(safe()), 100, 100).await;
    let missing = ImageEvent::new(SOURCE_BUCKET, "gone.png").unwrap();

    let err = pipeline.handle(&missing).await.unwrap_err();

    assert!(matches!(err, ThumbnailError::ObjectNotFound { .. }));
    assert!(store.writes().await.is_empty());
}

#[tokio::test]
async fn test_undecodable_source_is_a_failure() {
    let (pipeline, store, _) = setup(Some(safe()), 100, 100).await;
    store
        .insert(SOURCE_BUCKET, "notes.txt", &b"just some text"[..])
        .await;

    let err = pipeline
        .handle(&ImageEvent::new(SOURCE_BUCKET, "notes.txt").unwrap())
        .await
        .unwrap_err();

    assert!(matches!(err, ThumbnailError::Decode(_)));
    assert!(store.writes().await.is_empty());
}

#[tokio::test]
async fn test_storage_write_failure_propagates() {
    let classifier = Arc::new(FixedClassifier::new(safe()));
    let store = Arc::new(MemoryObjectStore::failing_writes());
    store
        .insert(SOURCE_BUCKET, "photo.png", encode_image(50, 50, ImageFormat::Png))
        .await;
    let publisher = Arc::new(MemoryPublisher::new());
    let pipeline = ThumbnailPipeline::new(&test_config(), classifier, store)
        .with_publisher(publisher.clone());

    let err = pipeline.handle(&event()).await.unwrap_err();

    assert!(matches!(err, ThumbnailError::StorageWrite(_)));
    assert!(publisher.messages().await.is_empty());
}

#[tokio::test]
async fn test_reprocessing_overwrites_identically() {
    let (pipeline, store, _) = setup(Some(safe()), 1000, 750).await;

    pipeline.handle(&event()).await.unwrap();
    let first = store
        .object("public-thumbnails", "thumbnail-photo.png")
        .await
        .unwrap();

    pipeline.handle(&event()).await.unwrap();
    let second = store
        .object("public-thumbnails", "thumbnail-photo.png")
        .await
        .unwrap();

    assert_eq!(first, second);
    assert_eq!(store.writes().await.len(), 2);
}

#[tokio::test]
async fn test_custom_width_and_prefix() {
    let mut config = test_config();
    config.max_width = 100;
    config.prefix = "small".to_string();

    let classifier = Arc::new(FixedClassifier::new(safe()));
    let store = Arc::new(MemoryObjectStore::new());
    store
        .insert(SOURCE_BUCKET, "photo.png", encode_image(400, 300, ImageFormat::Png))
        .await;
    let pipeline = ThumbnailPipeline::new(&config, classifier, store.clone());

    let outcome = pipeline.handle(&event()).await.unwrap();

    assert!(matches!(
        outcome,
        ThumbnailOutcome::Completed { width: 100, height: 75, .. }
    ));
    assert!(store.object("public-thumbnails", "small-photo.png").await.is_some());
}
