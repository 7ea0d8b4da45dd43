use hcp_models::{
    OperationRecord, OperationRequest, ProvisioningState, ResourceId, ResourceRecord,
    ResourceRecordPatch, ResourceType, Subscription, SubscriptionState,
};
use hcp_storage::{
    DocumentStore, ListOptions, OperationFilter, OperationStorage, ResourceStorage,
    StorageError, SubscriptionStorage, memory::MemoryDocumentStore,
};

fn cluster(name: &str) -> ResourceId {
    ResourceId::cluster("sub-1", "rg", name)
}

#[tokio::test]
async fn create_and_read_back_in_one_commit() {
    let store = MemoryDocumentStore::new();
    let id = cluster("dev");
    let op = OperationRecord::new(OperationRequest::Create, id.clone(), None, None);

    let mut tx = store.new_transaction("SUB-1");
    let op_id = tx.create_operation(op).unwrap();
    let mut record = ResourceRecord::new(id.clone());
    record.active_operation_id = Some(op_id.clone());
    tx.create_resource(record).unwrap();
    let result = tx.execute().await.unwrap();

    assert!(result.get_operation(&op_id).is_some());
    let stored = store.get_resource(&id).await.unwrap().unwrap();
    assert_eq!(stored.active_operation_id.as_deref(), Some(op_id.as_str()));
    assert!(store.get_operation("sub-1", &op_id).await.unwrap().is_some());
}

#[tokio::test]
async fn failed_step_leaves_nothing_behind() {
    let store = MemoryDocumentStore::new();
    let mut tx = store.new_transaction("sub-1");
    tx.create_operation(OperationRecord::new(
        OperationRequest::Update,
        cluster("dev"),
        None,
        None,
    ))
    .unwrap();
    // Patching a record that does not exist fails the whole batch.
    tx.patch_resource(
        &cluster("missing"),
        ResourceRecordPatch::new().provisioning_state(ProvisioningState::Updating),
    )
    .unwrap();

    let err = tx.execute().await.unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(store.operation_count("sub-1").await, 0);
}

#[tokio::test]
async fn injected_commit_failure_is_atomic() {
    let store = MemoryDocumentStore::new();
    store.fail_next_commits(1);

    let mut tx = store.new_transaction("sub-1");
    tx.create_resource(ResourceRecord::new(cluster("dev"))).unwrap();
    assert!(matches!(
        tx.execute().await,
        Err(StorageError::CommitFailed(_))
    ));
    assert_eq!(store.resource_count("sub-1").await, 0);

    let mut tx = store.new_transaction("sub-1");
    tx.create_resource(ResourceRecord::new(cluster("dev"))).unwrap();
    tx.execute().await.unwrap();
    assert_eq!(store.resource_count("sub-1").await, 1);
}

#[tokio::test]
async fn later_steps_win_over_earlier_ones() {
    let store = MemoryDocumentStore::new();
    let id = cluster("dev");
    store.insert_resource(ResourceRecord::new(id.clone())).await;

    let mut tx = store.new_transaction("sub-1");
    tx.patch_resource(
        &id,
        ResourceRecordPatch::new().provisioning_state(ProvisioningState::Canceled),
    )
    .unwrap();
    tx.patch_resource(
        &id,
        ResourceRecordPatch::new().provisioning_state(ProvisioningState::Deleting),
    )
    .unwrap();
    let result = tx.execute().await.unwrap();

    assert_eq!(
        result.get_resource(&id).unwrap().provisioning_state,
        ProvisioningState::Deleting
    );
}

#[tokio::test]
async fn active_operation_filter_covers_descendants() {
    let store = MemoryDocumentStore::new();
    let parent = cluster("dev");
    let child = parent.child("nodePools", "np1");
    let other = cluster("other");

    store
        .insert_operation(OperationRecord::new(OperationRequest::Create, parent.clone(), None, None))
        .await;
    store
        .insert_operation(OperationRecord::new(OperationRequest::Update, child.clone(), None, None))
        .await;
    store
        .insert_operation(OperationRecord::new(OperationRequest::Create, other, None, None))
        .await;
    let mut done = OperationRecord::new(OperationRequest::Update, parent.clone(), None, None);
    done.status = ProvisioningState::Succeeded;
    store.insert_operation(done).await;

    let own = store
        .list_active_operations("sub-1", &OperationFilter::for_resource(&parent))
        .await
        .unwrap();
    assert_eq!(own.len(), 1);

    let tree = store
        .list_active_operations(
            "sub-1",
            &OperationFilter::for_resource(&parent).with_descendants(),
        )
        .await
        .unwrap();
    assert_eq!(tree.len(), 2);

    let updates = store
        .list_active_operations(
            "sub-1",
            &OperationFilter::for_resource(&parent)
                .with_descendants()
                .requests(&[OperationRequest::Update]),
        )
        .await
        .unwrap();
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0].external_id, child);
}

#[tokio::test]
async fn listing_pages_with_continuation_token() {
    let store = MemoryDocumentStore::new();
    for name in ["a", "b", "c", "d", "e"] {
        let id = cluster(name);
        store.insert_resource(ResourceRecord::new(id.clone())).await;
        store
            .insert_resource(ResourceRecord::new(id.child("nodePools", "np")))
            .await;
    }
    let scope = ResourceId::subscription("sub-1");
    let options = |token: Option<String>| ListOptions {
        resource_type: Some(ResourceType::cluster()),
        page_size: Some(2),
        continuation_token: token,
    };

    let first = store.list_resources(&scope, options(None)).await.unwrap();
    assert_eq!(first.items.len(), 2);
    assert_eq!(first.items[0].external_id.name(), "a");
    let token = first.continuation_token.clone().unwrap();

    let second = store.list_resources(&scope, options(Some(token))).await.unwrap();
    let names: Vec<_> = second.items.iter().map(|r| r.external_id.name()).collect();
    assert_eq!(names, vec!["c", "d"]);

    let third = store
        .list_resources(&scope, options(second.continuation_token.clone()))
        .await
        .unwrap();
    assert_eq!(third.items.len(), 1);
    assert!(third.continuation_token.is_none());
}

#[tokio::test]
async fn subscriptions_round_trip_case_insensitively() {
    let store = MemoryDocumentStore::new();
    assert!(store.get_subscription("SUB-1").await.unwrap().is_none());
    store
        .put_subscription("SUB-1", &Subscription::registered())
        .await
        .unwrap();
    let sub = store.get_subscription("sub-1").await.unwrap().unwrap();
    assert_eq!(sub.state, SubscriptionState::Registered);
}
