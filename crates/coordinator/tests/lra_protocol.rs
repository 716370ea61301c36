//! Integration tests driving full LRA lifecycles through the coordinator,
//! the participant registry and the recovery scheduler together.

use std::sync::Arc;
use std::time::Duration;

use common::LraId;
use coordinator::{
    InMemoryParticipantClient, LraCoordinator, RecoveryScheduler, Scripted,
};
use store::{InMemoryRecordStore, LraStatus, Participant, ParticipantStatus, RecordStore};

type TestCoordinator = LraCoordinator<InMemoryRecordStore, InMemoryParticipantClient>;

struct TestHarness {
    coordinator: Arc<TestCoordinator>,
    scheduler: RecoveryScheduler<InMemoryRecordStore, InMemoryParticipantClient>,
    client: InMemoryParticipantClient,
    store: InMemoryRecordStore,
}

impl TestHarness {
    fn new() -> Self {
        let store = InMemoryRecordStore::new();
        let client = InMemoryParticipantClient::new();
        let coordinator = Arc::new(LraCoordinator::new(store.clone(), client.clone()));
        let scheduler = RecoveryScheduler::new(coordinator.clone());

        Self {
            coordinator,
            scheduler,
            client,
            store,
        }
    }

    async fn enlist(&self, lra: LraId, name: &str) -> Participant {
        let mut p = Participant::new(format!("http://svc/{name}"));
        p.complete_url = Some(format!("http://svc/{name}/complete"));
        p.compensate_url = Some(format!("http://svc/{name}/compensate"));
        self.coordinator
            .registry()
            .enlist(lra, p.clone())
            .await
            .unwrap();
        p
    }

    fn complete_url(name: &str) -> String {
        format!("http://svc/{name}/complete")
    }

    fn compensate_url(name: &str) -> String {
        format!("http://svc/{name}/compensate")
    }
}

#[tokio::test]
async fn test_join_then_close_completes_every_participant() {
    let h = TestHarness::new();
    let lra = h.coordinator.start(None, "order-service", None).await.unwrap();
    h.enlist(lra, "inventory").await;
    h.enlist(lra, "payment").await;

    assert!(h.coordinator.is_active(lra).await.unwrap());
    assert_eq!(h.coordinator.close(lra).await.unwrap(), LraStatus::Closed);

    assert_eq!(h.client.completion_count(&TestHarness::complete_url("inventory")), 1);
    assert_eq!(h.client.completion_count(&TestHarness::complete_url("payment")), 1);
    assert_eq!(h.client.compensation_count(&TestHarness::compensate_url("inventory")), 0);

    // a finished LRA no longer shows up as active
    assert!(h.store.list_active().await.unwrap().is_empty());
    assert!(h.coordinator.is_completed(lra).await.unwrap());
}

#[tokio::test]
async fn test_cancel_compensates_every_participant() {
    let h = TestHarness::new();
    let lra = h.coordinator.start(None, "order-service", None).await.unwrap();
    h.enlist(lra, "inventory").await;
    h.enlist(lra, "payment").await;

    assert_eq!(h.coordinator.cancel(lra).await.unwrap(), LraStatus::Cancelled);

    assert_eq!(h.client.compensation_count(&TestHarness::compensate_url("inventory")), 1);
    assert_eq!(h.client.compensation_count(&TestHarness::compensate_url("payment")), 1);
    assert_eq!(h.client.completion_count(&TestHarness::complete_url("inventory")), 0);
    assert!(h.coordinator.is_compensated(lra).await.unwrap());
}

#[tokio::test]
async fn test_timeout_cancels_instead_of_closing() {
    let h = TestHarness::new();
    let lra = h
        .coordinator
        .start(None, "order-service", Some(Duration::ZERO))
        .await
        .unwrap();
    h.enlist(lra, "inventory").await;

    let report = h.scheduler.run_recovery_scan().await.unwrap();
    assert_eq!(report.timed_out, 1);
    assert_eq!(h.coordinator.status(lra).await.unwrap(), LraStatus::Cancelled);
    assert_eq!(h.client.compensation_count(&TestHarness::compensate_url("inventory")), 1);
    assert_eq!(h.client.completion_count(&TestHarness::complete_url("inventory")), 0);
}

#[tokio::test]
async fn test_repeated_join_yields_one_enlistment() {
    let h = TestHarness::new();
    let lra = h.coordinator.start(None, "order-service", None).await.unwrap();
    h.enlist(lra, "inventory").await;
    h.enlist(lra, "inventory").await;
    h.enlist(lra, "inventory").await;

    let record = h.store.get(lra).await.unwrap();
    assert_eq!(record.participants.len(), 1);

    h.coordinator.close(lra).await.unwrap();
    assert_eq!(h.client.completion_count(&TestHarness::complete_url("inventory")), 1);
}

#[tokio::test]
async fn test_leave_before_close_skips_callback() {
    let h = TestHarness::new();
    let lra = h.coordinator.start(None, "order-service", None).await.unwrap();
    let p = h.enlist(lra, "inventory").await;
    h.enlist(lra, "payment").await;

    h.coordinator
        .registry()
        .leave(lra, &p.endpoint)
        .await
        .unwrap();
    h.coordinator.close(lra).await.unwrap();

    assert_eq!(h.client.completion_count(&TestHarness::complete_url("inventory")), 0);
    assert_eq!(h.client.completion_count(&TestHarness::complete_url("payment")), 1);
}

#[tokio::test]
async fn test_close_of_parent_closes_nested_child() {
    let h = TestHarness::new();
    let parent = h.coordinator.start(None, "order-service", None).await.unwrap();
    let child = h
        .coordinator
        .start(Some(parent), "shipping-service", None)
        .await
        .unwrap();
    h.enlist(parent, "parent-p").await;
    h.enlist(child, "child-p").await;

    assert_eq!(h.coordinator.close(parent).await.unwrap(), LraStatus::Closed);
    assert_eq!(h.coordinator.status(child).await.unwrap(), LraStatus::Closed);
    assert_eq!(h.client.completion_count(&TestHarness::complete_url("parent-p")), 1);
    assert_eq!(h.client.completion_count(&TestHarness::complete_url("child-p")), 1);
}

#[tokio::test]
async fn test_mixed_outcome_nested_child_not_completed_twice() {
    // A child closed on its own, then cancelled while its parent is still
    // running, compensates; closing the parent afterwards must not invoke
    // the child's completion again.
    let h = TestHarness::new();
    let parent = h.coordinator.start(None, "order-service", None).await.unwrap();
    let child = h
        .coordinator
        .start(Some(parent), "shipping-service", None)
        .await
        .unwrap();
    h.enlist(child, "child-p").await;
    h.enlist(parent, "parent-p").await;

    assert_eq!(h.coordinator.close(child).await.unwrap(), LraStatus::Closed);
    assert_eq!(h.client.completion_count(&TestHarness::complete_url("child-p")), 1);

    // provisional close: the child can still be pulled back for cancellation
    assert_eq!(h.coordinator.cancel(child).await.unwrap(), LraStatus::Cancelled);
    assert_eq!(h.client.compensation_count(&TestHarness::compensate_url("child-p")), 1);

    assert_eq!(h.coordinator.close(parent).await.unwrap(), LraStatus::Closed);
    assert_eq!(h.client.completion_count(&TestHarness::complete_url("child-p")), 1);
    assert_eq!(h.client.complete_call_count(&TestHarness::complete_url("child-p")), 1);
    assert_eq!(h.client.completion_count(&TestHarness::complete_url("parent-p")), 1);
}

#[tokio::test]
async fn test_cancel_of_parent_compensates_completed_child() {
    let h = TestHarness::new();
    let parent = h.coordinator.start(None, "order-service", None).await.unwrap();
    let child = h
        .coordinator
        .start(Some(parent), "shipping-service", None)
        .await
        .unwrap();
    h.enlist(child, "child-p").await;

    assert_eq!(h.coordinator.close(child).await.unwrap(), LraStatus::Closed);
    assert_eq!(h.coordinator.cancel(parent).await.unwrap(), LraStatus::Cancelled);

    // cancellation of the parent re-opens the provisionally closed child
    assert_eq!(h.coordinator.status(child).await.unwrap(), LraStatus::Cancelled);
    assert_eq!(h.client.completion_count(&TestHarness::complete_url("child-p")), 1);
    assert_eq!(h.client.compensation_count(&TestHarness::compensate_url("child-p")), 1);
}

#[tokio::test]
async fn test_three_level_nesting_closes_depth_first() {
    let h = TestHarness::new();
    let root = h.coordinator.start(None, "root", None).await.unwrap();
    let mid = h.coordinator.start(Some(root), "mid", None).await.unwrap();
    let leaf = h.coordinator.start(Some(mid), "leaf", None).await.unwrap();
    h.enlist(root, "root-p").await;
    h.enlist(mid, "mid-p").await;
    h.enlist(leaf, "leaf-p").await;

    assert_eq!(h.coordinator.close(root).await.unwrap(), LraStatus::Closed);
    assert_eq!(h.coordinator.status(mid).await.unwrap(), LraStatus::Closed);
    assert_eq!(h.coordinator.status(leaf).await.unwrap(), LraStatus::Closed);
    for name in ["root-p", "mid-p", "leaf-p"] {
        assert_eq!(h.client.completion_count(&TestHarness::complete_url(name)), 1);
    }
}

#[tokio::test]
async fn test_accepted_participant_settled_by_later_scan() {
    let h = TestHarness::new();
    let lra = h.coordinator.start(None, "order-service", None).await.unwrap();
    h.enlist(lra, "inventory").await;
    h.client
        .script_complete(&TestHarness::complete_url("inventory"), Scripted::Accepted);

    assert_eq!(h.coordinator.close(lra).await.unwrap(), LraStatus::Closing);
    // still active work pending: the LRA remains observable
    assert_eq!(h.store.list_active().await.unwrap().len(), 1);

    h.scheduler.run_recovery_scan().await.unwrap();
    assert_eq!(h.coordinator.status(lra).await.unwrap(), LraStatus::Closed);
    assert_eq!(h.client.completion_count(&TestHarness::complete_url("inventory")), 1);
}

#[tokio::test]
async fn test_failed_compensation_marks_lra_failed_to_cancel() {
    let h = TestHarness::new();
    let lra = h.coordinator.start(None, "order-service", None).await.unwrap();
    h.enlist(lra, "inventory").await;
    h.enlist(lra, "payment").await;
    h.client
        .script_compensate(&TestHarness::compensate_url("payment"), Scripted::Fail(500));

    assert_eq!(
        h.coordinator.cancel(lra).await.unwrap(),
        LraStatus::FailedToCancel
    );
    // the healthy participant still compensated
    assert_eq!(h.client.compensation_count(&TestHarness::compensate_url("inventory")), 1);

    let record = h.store.get(lra).await.unwrap();
    let failed = record
        .participants
        .iter()
        .find(|p| p.endpoint == "http://svc/payment")
        .unwrap();
    assert_eq!(failed.status, ParticipantStatus::FailedToCompensate);
}

#[tokio::test]
async fn test_close_is_idempotent_across_calls_and_scans() {
    let h = TestHarness::new();
    let lra = h.coordinator.start(None, "order-service", None).await.unwrap();
    h.enlist(lra, "inventory").await;

    assert_eq!(h.coordinator.close(lra).await.unwrap(), LraStatus::Closed);
    assert_eq!(h.coordinator.close(lra).await.unwrap(), LraStatus::Closed);
    h.scheduler.run_recovery_scan().await.unwrap();
    assert_eq!(h.coordinator.close(lra).await.unwrap(), LraStatus::Closed);

    assert_eq!(h.client.complete_call_count(&TestHarness::complete_url("inventory")), 1);
}
