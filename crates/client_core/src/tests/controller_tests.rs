use super::*;
use std::{
    collections::VecDeque,
    sync::atomic::{AtomicBool, AtomicUsize, Ordering},
};

use async_trait::async_trait;
use tokio::sync::broadcast::error::TryRecvError;

use crate::{
    error::StoreOperation, form::{CREATE_LABEL, UPDATE_LABEL}, intents::{Intent, IntentOutcome},
};

/// In-memory record store that also records every call it receives.
#[derive(Default)]
struct TestGateway {
    records: Mutex<Vec<Record>>,
    created: AtomicUsize,
    list_calls: AtomicUsize,
    upserts: Mutex<Vec<(Option<RecordId>, CustomerFields)>>,
    deletes: Mutex<Vec<RecordId>>,
    upsert_delays: Mutex<VecDeque<Duration>>,
    fail_list: AtomicBool,
    fail_upsert: AtomicBool,
    fail_delete: AtomicBool,
}

impl TestGateway {
    fn with_records(records: Vec<Record>) -> Self {
        Self {
            records: Mutex::new(records),
            ..Self::default()
        }
    }

    async fn delay_upserts(&self, delays: impl IntoIterator<Item = Duration>) {
        self.upsert_delays.lock().await.extend(delays);
    }

    fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RecordStoreGateway for TestGateway {
    async fn list_all(&self) -> Result<Vec<Record>, StoreError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_list.load(Ordering::SeqCst) {
            return Err(StoreError::new(StoreOperation::ListAll, "network down"));
        }
        Ok(self.records.lock().await.clone())
    }

    async fn upsert(
        &self,
        id: Option<&RecordId>,
        fields: &CustomerFields,
    ) -> Result<RecordId, StoreError> {
        self.upserts
            .lock()
            .await
            .push((id.cloned(), fields.clone()));
        let delay = self.upsert_delays.lock().await.pop_front();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_upsert.load(Ordering::SeqCst) {
            return Err(StoreError::new(StoreOperation::Upsert, "permission denied"));
        }

        let id = match id {
            Some(id) => id.clone(),
            None => RecordId(format!(
                "id-{}",
                self.created.fetch_add(1, Ordering::SeqCst) + 1
            )),
        };
        let record = Record::new(id.clone(), fields.clone());
        let mut records = self.records.lock().await;
        match records.iter_mut().find(|r| r.id == id) {
            Some(existing) => *existing = record,
            None => records.push(record),
        }
        Ok(id)
    }

    async fn delete(&self, id: &RecordId) -> Result<(), StoreError> {
        self.deletes.lock().await.push(id.clone());
        if self.fail_delete.load(Ordering::SeqCst) {
            return Err(StoreError::new(StoreOperation::Delete, "not found"));
        }
        self.records.lock().await.retain(|r| &r.id != id);
        Ok(())
    }
}

fn bob() -> Record {
    Record::new(
        RecordId::from("7"),
        CustomerFields::new("Bob", "99999999", "b@x.com"),
    )
}

fn controller_for(gateway: &Arc<TestGateway>) -> Arc<CustomerController> {
    CustomerController::new(Arc::clone(gateway) as Arc<dyn RecordStoreGateway>)
}

fn controller_with_window(gateway: &Arc<TestGateway>, window: Duration) -> Arc<CustomerController> {
    CustomerController::with_config(
        Arc::clone(gateway) as Arc<dyn RecordStoreGateway>,
        ControllerConfig {
            saving_display_window: Some(window),
            ..ControllerConfig::default()
        },
    )
}

async fn fill_form(controller: &CustomerController, name: &str, phone: &str, email: &str) {
    controller.change_name(name).await;
    assert!(controller.change_phone(phone).await);
    controller.change_email(email).await;
}

#[tokio::test]
async fn refresh_on_empty_store_yields_empty_list() {
    let gateway = Arc::new(TestGateway::default());
    let controller = controller_for(&gateway);

    controller.load().await.expect("refresh");

    let snapshot = controller.snapshot().await;
    assert!(snapshot.records.is_empty());
    assert!(snapshot.is_empty);
    assert_eq!(snapshot.record_count, 0);
    assert_eq!(gateway.list_calls(), 1);
}

#[tokio::test]
async fn create_submits_without_id_then_refreshes_and_resets_form() {
    let gateway = Arc::new(TestGateway::default());
    let controller = controller_for(&gateway);
    fill_form(&controller, "Ana", "12345678", "a@x.com").await;

    let outcome = controller.submit().await.expect("submit");
    let SubmitOutcome::Saved { id, created } = outcome else {
        panic!("expected saved outcome, got {outcome:?}");
    };
    assert!(created);

    assert_eq!(
        *gateway.upserts.lock().await,
        vec![(None, CustomerFields::new("Ana", "12345678", "a@x.com"))]
    );
    let snapshot = controller.snapshot().await;
    assert_eq!(
        snapshot.records,
        vec![Record::new(
            id,
            CustomerFields::new("Ana", "12345678", "a@x.com")
        )]
    );
    assert_eq!(snapshot.form, FormState::default());
    assert_eq!(snapshot.submit_label, CREATE_LABEL);
    assert!(!snapshot.saving);
    assert_eq!(snapshot.record_count, 1);
    assert!(!snapshot.is_empty);
}

#[tokio::test]
async fn editing_a_record_submits_with_its_id() {
    let gateway = Arc::new(TestGateway::with_records(vec![bob()]));
    let controller = controller_for(&gateway);
    controller.refresh().await.expect("refresh");

    controller.start_edit(&bob()).await;
    let snapshot = controller.snapshot().await;
    assert_eq!(snapshot.form.name, "Bob");
    assert_eq!(snapshot.form.phone, "99999999");
    assert_eq!(snapshot.form.email, "b@x.com");
    assert_eq!(snapshot.form.editing_id, Some(RecordId::from("7")));
    assert_eq!(snapshot.submit_label, UPDATE_LABEL);

    controller.change_name("Bobby").await;
    let outcome = controller.submit().await.expect("submit");
    assert_eq!(
        outcome,
        SubmitOutcome::Saved {
            id: RecordId::from("7"),
            created: false
        }
    );

    let upserts = gateway.upserts.lock().await;
    assert_eq!(upserts.len(), 1);
    assert_eq!(upserts[0].0, Some(RecordId::from("7")));
    assert_eq!(upserts[0].1.name, "Bobby");
    drop(upserts);

    let snapshot = controller.snapshot().await;
    assert_eq!(snapshot.records.len(), 1);
    assert_eq!(snapshot.records[0].name, "Bobby");
    assert_eq!(snapshot.form, FormState::default());
}

#[tokio::test]
async fn delete_refreshes_exactly_once() {
    let gateway = Arc::new(TestGateway::with_records(vec![
        bob(),
        Record::new(
            RecordId::from("8"),
            CustomerFields::new("Eve", "11111111", ""),
        ),
    ]));
    let controller = controller_for(&gateway);
    controller.refresh().await.expect("refresh");
    let calls_before = gateway.list_calls();

    controller
        .delete_record(&RecordId::from("7"))
        .await
        .expect("delete");

    assert_eq!(gateway.list_calls() - calls_before, 1);
    let snapshot = controller.snapshot().await;
    assert!(snapshot.records.iter().all(|r| r.id != RecordId::from("7")));
    assert_eq!(snapshot.record_count, 1);
}

#[tokio::test]
async fn failed_upsert_keeps_list_and_typed_form() {
    let gateway = Arc::new(TestGateway::with_records(vec![bob()]));
    gateway.fail_upsert.store(true, Ordering::SeqCst);
    let controller = controller_for(&gateway);
    controller.refresh().await.expect("refresh");
    let mut events = controller.subscribe();
    fill_form(&controller, "Ana", "12345678", "a@x.com").await;
    let before = controller.snapshot().await;

    let err = controller.submit().await.expect_err("upsert fails");
    assert_eq!(err.operation, StoreOperation::Upsert);

    let after = controller.snapshot().await;
    assert_eq!(after.records, before.records);
    assert_eq!(after.form, before.form);
    assert!(!after.saving);
    assert_eq!(gateway.list_calls(), 1);

    let mut saw_failure = false;
    while let Ok(event) = events.try_recv() {
        if let ControllerEvent::StoreFailure(failure) = event {
            assert_eq!(failure, err);
            saw_failure = true;
        }
    }
    assert!(saw_failure, "store failure should be published");
}

#[tokio::test]
async fn failed_delete_leaves_list_untouched() {
    let gateway = Arc::new(TestGateway::with_records(vec![bob()]));
    gateway.fail_delete.store(true, Ordering::SeqCst);
    let controller = controller_for(&gateway);
    controller.refresh().await.expect("refresh");

    let err = controller
        .delete_record(&RecordId::from("7"))
        .await
        .expect_err("delete fails");
    assert_eq!(err.operation, StoreOperation::Delete);
    assert_eq!(controller.snapshot().await.records, vec![bob()]);
    assert_eq!(gateway.list_calls(), 1);
}

#[tokio::test]
async fn failed_refresh_keeps_previous_list() {
    let gateway = Arc::new(TestGateway::with_records(vec![bob()]));
    let controller = controller_for(&gateway);
    controller.refresh().await.expect("refresh");

    gateway.fail_list.store(true, Ordering::SeqCst);
    gateway.records.lock().await.clear();
    let mut events = controller.subscribe();

    let err = controller.refresh().await.expect_err("refresh fails");
    assert_eq!(err.operation, StoreOperation::ListAll);
    assert_eq!(controller.snapshot().await.records, vec![bob()]);
    assert!(matches!(
        events.try_recv(),
        Ok(ControllerEvent::StoreFailure(_))
    ));
}

#[tokio::test]
async fn successful_write_still_clears_form_when_refresh_fails() {
    let gateway = Arc::new(TestGateway::default());
    gateway.fail_list.store(true, Ordering::SeqCst);
    let controller = controller_for(&gateway);
    fill_form(&controller, "Ana", "12345678", "a@x.com").await;

    let outcome = controller.submit().await.expect("write succeeded");
    assert!(matches!(outcome, SubmitOutcome::Saved { created: true, .. }));
    let snapshot = controller.snapshot().await;
    assert_eq!(snapshot.form, FormState::default());
    assert!(snapshot.records.is_empty());
}

#[tokio::test]
async fn submit_is_blocked_while_phone_is_invalid() {
    let gateway = Arc::new(TestGateway::default());
    let controller = controller_for(&gateway);
    controller.change_name("Ana").await;
    assert!(controller.change_phone("1234").await);

    let outcome = controller.submit().await.expect("local rejection");
    assert_eq!(
        outcome,
        SubmitOutcome::Rejected(PhoneValidationError::TooShort { min: 8, actual: 4 })
    );
    assert!(gateway.upserts.lock().await.is_empty());
    let snapshot = controller.snapshot().await;
    assert!(!snapshot.saving);
    assert_eq!(snapshot.form.name, "Ana");
}

#[tokio::test]
async fn untouched_empty_phone_is_rejected_at_submit() {
    let gateway = Arc::new(TestGateway::default());
    let controller = controller_for(&gateway);
    controller.change_name("Ana").await;

    let outcome = controller.submit().await.expect("local rejection");
    assert_eq!(outcome, SubmitOutcome::Rejected(PhoneValidationError::Empty));
    assert!(controller.snapshot().await.form.phone_invalid);
    assert!(gateway.upserts.lock().await.is_empty());
}

#[tokio::test]
async fn phone_flag_follows_the_digit_and_length_rule() {
    let controller = controller_for(&Arc::new(TestGateway::default()));
    for len in 1..=12 {
        let phone = "9".repeat(len);
        assert!(controller.change_phone(&phone).await);
        assert_eq!(
            controller.snapshot().await.form.phone_invalid,
            len < 8,
            "length {len}"
        );
    }

    assert!(!controller.change_phone("1234567a").await);
    assert_eq!(controller.snapshot().await.form.phone, "9".repeat(12));
}

#[tokio::test]
async fn start_edit_then_clear_returns_to_create_state() {
    let controller = controller_for(&Arc::new(TestGateway::default()));
    controller.start_edit(&bob()).await;
    controller.clear().await;
    let snapshot = controller.snapshot().await;
    assert_eq!(snapshot.form, FormState::default());
    assert_eq!(snapshot.submit_label, CREATE_LABEL);
}

#[tokio::test]
async fn clearing_twice_publishes_a_single_change() {
    let controller = controller_for(&Arc::new(TestGateway::default()));
    controller.start_edit(&bob()).await;
    let mut events = controller.subscribe();

    controller.clear().await;
    let once = controller.snapshot().await;
    controller.clear().await;
    assert_eq!(controller.snapshot().await, once);

    assert!(matches!(
        events.try_recv(),
        Ok(ControllerEvent::StateChanged(snapshot)) if snapshot == once
    ));
    assert!(matches!(events.try_recv(), Err(TryRecvError::Empty)));
}

#[tokio::test]
async fn duplicate_ids_from_the_store_are_collapsed() {
    let mut renamed = bob();
    renamed.name = "Robert".into();
    let gateway = Arc::new(TestGateway::with_records(vec![bob(), renamed]));
    let controller = controller_for(&gateway);
    controller.refresh().await.expect("refresh");
    assert_eq!(controller.snapshot().await.records, vec![bob()]);
}

#[tokio::test]
async fn intents_drive_the_full_create_flow() {
    let gateway = Arc::new(TestGateway::default());
    let controller = controller_for(&gateway);

    for intent in [
        Intent::EditName("Ana".into()),
        Intent::EditPhone("12345678".into()),
        Intent::EditEmail("a@x.com".into()),
    ] {
        assert_eq!(
            controller.dispatch(intent).await.expect("edit"),
            IntentOutcome::Applied
        );
    }
    assert_eq!(
        controller
            .dispatch(Intent::EditPhone("1234x".into()))
            .await
            .expect("edit"),
        IntentOutcome::Ignored
    );

    let outcome = controller.dispatch(Intent::Submit).await.expect("submit");
    assert!(matches!(
        outcome,
        IntentOutcome::Submitted(SubmitOutcome::Saved { created: true, .. })
    ));

    let id = controller.snapshot().await.records[0].id.clone();
    assert_eq!(
        controller
            .dispatch(Intent::StartEdit(id.clone()))
            .await
            .expect("start edit"),
        IntentOutcome::Applied
    );
    assert_eq!(controller.snapshot().await.form.editing_id, Some(id.clone()));
    assert_eq!(
        controller
            .dispatch(Intent::StartEdit(RecordId::from("missing")))
            .await
            .expect("start edit"),
        IntentOutcome::Ignored
    );

    controller.dispatch(Intent::Clear).await.expect("clear");
    controller
        .dispatch(Intent::Delete(id))
        .await
        .expect("delete");
    assert!(controller.snapshot().await.is_empty);

    gateway.fail_list.store(true, Ordering::SeqCst);
    let err = controller
        .dispatch(Intent::Refresh)
        .await
        .expect_err("refresh fails");
    assert_eq!(err.operation, StoreOperation::ListAll);
}

#[tokio::test]
async fn state_changes_are_published_to_subscribers() {
    let controller = controller_for(&Arc::new(TestGateway::default()));
    let mut events = controller.subscribe();
    controller.change_name("Ana").await;
    match events.recv().await.expect("event") {
        ControllerEvent::StateChanged(snapshot) => assert_eq!(snapshot.form.name, "Ana"),
        other => panic!("unexpected event {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn saving_tracks_the_write_until_it_completes() {
    let gateway = Arc::new(TestGateway::default());
    gateway.delay_upserts([Duration::from_secs(10)]).await;
    let controller = controller_for(&gateway);
    fill_form(&controller, "Ana", "12345678", "a@x.com").await;

    let submitting = Arc::clone(&controller);
    let handle = tokio::spawn(async move { submitting.submit().await });

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert!(controller.snapshot().await.saving);

    handle.await.expect("join").expect("submit");
    assert!(!controller.snapshot().await.saving);
}

#[tokio::test(start_paused = true)]
async fn overlapping_submits_keep_saving_until_the_last_completes() {
    let gateway = Arc::new(TestGateway::default());
    gateway
        .delay_upserts([Duration::from_secs(5), Duration::from_secs(10)])
        .await;
    let controller = controller_for(&gateway);

    fill_form(&controller, "Ana", "12345678", "a@x.com").await;
    let first = Arc::clone(&controller);
    let first = tokio::spawn(async move { first.submit().await });
    tokio::time::sleep(Duration::from_secs(1)).await;

    fill_form(&controller, "Bob", "99999999", "b@x.com").await;
    let second = Arc::clone(&controller);
    let second = tokio::spawn(async move { second.submit().await });

    tokio::time::sleep(Duration::from_secs(5)).await;
    first.await.expect("join").expect("first submit");
    assert!(controller.snapshot().await.saving);

    second.await.expect("join").expect("second submit");
    let snapshot = controller.snapshot().await;
    assert!(!snapshot.saving);
    assert_eq!(snapshot.record_count, 2);
}

#[tokio::test(start_paused = true)]
async fn display_window_drops_the_indicator_before_a_slow_write_finishes() {
    let gateway = Arc::new(TestGateway::default());
    gateway.delay_upserts([Duration::from_secs(10)]).await;
    let controller = controller_with_window(&gateway, LEGACY_SAVING_DISPLAY_WINDOW);
    fill_form(&controller, "Ana", "12345678", "a@x.com").await;

    let submitting = Arc::clone(&controller);
    let handle = tokio::spawn(async move { submitting.submit().await });

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert!(controller.snapshot().await.saving);
    tokio::time::sleep(Duration::from_secs(3)).await;
    assert!(!controller.snapshot().await.saving);

    let outcome = handle.await.expect("join").expect("submit");
    assert!(matches!(outcome, SubmitOutcome::Saved { .. }));
    assert!(!controller.snapshot().await.saving);
}

#[tokio::test(start_paused = true)]
async fn an_earlier_display_window_does_not_clear_a_later_submit() {
    let gateway = Arc::new(TestGateway::default());
    gateway
        .delay_upserts([Duration::from_secs(1), Duration::from_secs(10)])
        .await;
    let controller = controller_with_window(&gateway, Duration::from_secs(3));

    fill_form(&controller, "Ana", "12345678", "a@x.com").await;
    controller.submit().await.expect("first submit");
    tokio::time::sleep(Duration::from_secs(1)).await;

    fill_form(&controller, "Bob", "99999999", "b@x.com").await;
    let submitting = Arc::clone(&controller);
    let handle = tokio::spawn(async move { submitting.submit().await });

    // Past the first submit's window, inside the second's.
    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert!(controller.snapshot().await.saving);

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert!(!controller.snapshot().await.saving);

    handle.await.expect("join").expect("second submit");
}
