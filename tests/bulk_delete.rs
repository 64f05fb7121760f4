//! Bulk delete scenarios run through the public library API against an
//! in-memory object store.

mod common;

use std::sync::Arc;

use common::{ImmediateRetryPolicy, InMemoryStore};
use s3clean_rs::{
    BucketTarget, BulkDeleter, Config, DeletionStatistics, ObjectIdentifier, ObjectIdentifierSet,
    OutcomeStatus, Region, S3cleanError, build_config_from_args,
    create_deletion_cancellation_token,
};

const BUCKET: &str = "integration-bucket";

fn deleter_for(store: &InMemoryStore, config: Config) -> BulkDeleter {
    BulkDeleter::new(
        config,
        Box::new(store.clone()),
        create_deletion_cancellation_token(),
    )
    .with_retry_policy(Arc::new(ImmediateRetryPolicy { max_attempts: 3 }))
}

fn small_batches() -> Config {
    let mut config = Config::for_bucket(BUCKET).unwrap();
    config.worker_size = 4;
    config.batch_size = 7;
    config.max_keys = 10;
    config
}

fn populated_store() -> InMemoryStore {
    let store = InMemoryStore::new();
    store.create_bucket(BUCKET, Region::EuWest1);
    for i in 0..20 {
        store.put_object(BUCKET, &format!("logs/{i:03}.log"));
    }
    for i in 0..5 {
        store.put_versioned_object(BUCKET, &format!("data/{i}.bin"), 3);
    }
    store
}

#[tokio::test]
async fn bucket_and_every_version_are_deleted() {
    let store = populated_store();
    let deleter = deleter_for(&store, small_batches());

    let outcome = deleter.delete_bucket_and_contents(BUCKET).await.unwrap();

    // 20 plain objects, 5 keys with 3 versions and a delete marker each
    assert_eq!(outcome.deleted_count, 40);
    assert_eq!(outcome.status, OutcomeStatus::Success);
    assert!(!store.bucket_exists(BUCKET));
    // 40 identifiers in batches of 7
    assert_eq!(store.batch_calls(), 6);
}

#[tokio::test]
async fn prefix_target_leaves_other_keys_and_bucket() {
    let store = populated_store();
    let deleter = deleter_for(&store, small_batches());

    let target = BucketTarget::parse(&format!("s3://{BUCKET}/data/")).unwrap();
    let outcome = deleter.delete_target(&target, false).await.unwrap();

    assert_eq!(outcome.deleted_count, 20);
    assert!(store.bucket_exists(BUCKET));
    let remaining = store.objects(BUCKET);
    assert_eq!(remaining.len(), 20);
    assert!(remaining.iter().all(|i| i.key.starts_with("logs/")));
}

#[tokio::test]
async fn keep_bucket_empties_without_deleting() {
    let store = populated_store();
    let deleter = deleter_for(&store, small_batches());

    let target = BucketTarget::parse(&format!("s3://{BUCKET}")).unwrap();
    deleter.delete_target(&target, true).await.unwrap();

    assert!(store.bucket_exists(BUCKET));
    assert!(store.objects(BUCKET).is_empty());
}

#[tokio::test]
async fn refused_keys_are_reported_and_bucket_survives() {
    let store = populated_store();
    store.refuse_key("logs/003.log", "AccessDenied");
    store.refuse_key("data/1.bin", "AccessDenied");
    let deleter = deleter_for(&store, small_batches());

    let failure = deleter
        .delete_bucket_and_contents(BUCKET)
        .await
        .unwrap_err();

    // logs/003.log plus the 4 identifiers of data/1.bin
    assert_eq!(failure.outcome.failed_count(), 5);
    assert_eq!(failure.outcome.deleted_count, 35);
    assert_eq!(failure.outcome.status, OutcomeStatus::PartialFailure);
    assert_eq!(failure.exit_code(), 3);
    assert!(
        failure
            .outcome
            .failed
            .iter()
            .all(|f| f.error_code == "AccessDenied")
    );
    assert!(store.bucket_exists(BUCKET));
    assert_eq!(store.objects(BUCKET).len(), 5);
}

#[tokio::test]
async fn throttled_keys_are_resubmitted() {
    let store = populated_store();
    store.throttle_key("logs/010.log", 2);
    let deleter = deleter_for(&store, small_batches());

    let outcome = deleter.delete_all(BUCKET).await.unwrap();

    assert_eq!(outcome.deleted_count, 40);
    assert!(store.objects(BUCKET).is_empty());
    assert_eq!(deleter.get_deletion_stats().stats_retried_requests, 2);
    // 6 batches plus 2 single-key resubmissions
    assert_eq!(store.batch_calls(), 8);
}

#[tokio::test]
async fn throttling_beyond_attempt_budget_fails_only_that_key() {
    let store = populated_store();
    store.throttle_key("logs/010.log", 10);
    let deleter = deleter_for(&store, small_batches());

    let failure = deleter.delete_all(BUCKET).await.unwrap_err();

    assert_eq!(failure.outcome.deleted_count, 39);
    assert_eq!(failure.outcome.failed.len(), 1);
    assert_eq!(failure.outcome.failed[0].identifier.key, "logs/010.log");
    assert_eq!(failure.outcome.failed[0].error_code, "SlowDown");
}

#[tokio::test]
async fn explicit_identifier_set_is_deleted() {
    let store = populated_store();
    let deleter = deleter_for(&store, small_batches());

    let mut identifiers = ObjectIdentifierSet::new();
    assert!(identifiers.add(ObjectIdentifier::new("logs/000.log")).unwrap());
    assert!(identifiers.add(ObjectIdentifier::with_version("data/0.bin", "v1")).unwrap());
    // duplicates are dropped
    assert!(!identifiers.add(ObjectIdentifier::new("logs/000.log")).unwrap());

    let outcome = deleter.delete_set(BUCKET, &identifiers).await.unwrap();

    assert_eq!(outcome.deleted_count, 2);
    assert_eq!(store.objects(BUCKET).len(), 38);
    assert_eq!(store.list_calls(), 0);
}

#[tokio::test]
async fn second_run_is_a_no_op() {
    let store = populated_store();
    let deleter = deleter_for(&store, small_batches());

    deleter.delete_all(BUCKET).await.unwrap();
    let batch_calls = store.batch_calls();

    let outcome = deleter.delete_all(BUCKET).await.unwrap();
    assert_eq!(outcome.deleted_count, 0);
    assert_eq!(store.batch_calls(), batch_calls);
}

#[tokio::test]
async fn missing_bucket_is_a_precondition_failure() {
    let store = InMemoryStore::new();
    let deleter = deleter_for(&store, small_batches());

    let failure = deleter.delete_all("no-such-bucket").await.unwrap_err();

    assert!(matches!(
        failure.error.downcast_ref::<S3cleanError>(),
        Some(S3cleanError::Precondition(_))
    ));
    assert_eq!(failure.outcome.status, OutcomeStatus::FatalFailure);
    assert_eq!(failure.exit_code(), 1);
    assert_eq!(store.list_calls(), 0);
}

#[tokio::test]
async fn invalid_bucket_name_is_rejected_before_any_call() {
    let store = populated_store();
    let deleter = deleter_for(&store, small_batches());

    let failure = deleter.delete_all("Not_A_Bucket").await.unwrap_err();

    assert_eq!(failure.exit_code(), 2);
    assert_eq!(store.list_calls(), 0);
    assert_eq!(store.batch_calls(), 0);
}

#[tokio::test]
async fn config_from_cli_args_drives_the_deleter() {
    let store = populated_store();
    let config = build_config_from_args(vec![
        "s3clean",
        &format!("s3://{BUCKET}/logs/"),
        "--worker-size",
        "2",
        "--batch-size",
        "5",
    ])
    .unwrap();
    let target = config.targets[0].clone();
    let deleter = deleter_for(&store, config);

    let outcome = deleter
        .delete_target(&target, false)
        .await
        .unwrap();

    assert_eq!(outcome.deleted_count, 20);
    assert_eq!(store.batch_calls(), 4);
    assert_eq!(store.objects(BUCKET).len(), 20);
}

#[tokio::test]
async fn progress_events_account_for_every_identifier() {
    let store = populated_store();
    store.refuse_key("logs/000.log", "AccessDenied");
    let deleter = deleter_for(&store, small_batches());
    let stats_receiver = deleter.get_stats_receiver();

    let _ = deleter.delete_all(BUCKET).await;
    deleter.close_stats_sender();

    let mut listed = 0;
    let mut deleted = 0;
    let mut failed = 0;
    while let Ok(event) = stats_receiver.recv().await {
        match event {
            DeletionStatistics::ObjectsListed(count) => listed += count,
            DeletionStatistics::DeleteComplete { .. } => deleted += 1,
            DeletionStatistics::DeleteError { .. } => failed += 1,
            _ => {}
        }
    }

    assert_eq!(listed, 40);
    assert_eq!(deleted, 39);
    assert_eq!(failed, 1);

    let stats = deleter.get_deletion_stats();
    assert_eq!(stats.stats_listed_objects, 40);
    assert_eq!(stats.stats_deleted_objects, 39);
    assert_eq!(stats.stats_failed_objects, 1);
}
