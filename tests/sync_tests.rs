//! Integration tests for cross-session change messages

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::NaiveDate;
use patientdb::config::{EngineMode, RegistryConfig, SyncMode};
use patientdb::core::Result;
use patientdb::engine::{Engine, SqliteEngine};
use patientdb::facade::DatabaseHandle;
use patientdb::registry::{Gender, PatientForm};
use patientdb::sync::{ChangeMessage, ChannelHub, ChannelState};
use patientdb::{RecordSet, Session, Value};
use uuid::Uuid;

/// Counts calls reaching the engine.
struct CountingEngine {
    inner: SqliteEngine,
    calls: AtomicUsize,
}

#[async_trait]
impl Engine for CountingEngine {
    async fn query(&self, sql: &str, params: &[Value]) -> Result<RecordSet> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.query(sql, params).await
    }

    async fn exec(&self, sql: &str) -> Result<Vec<RecordSet>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.exec(sql).await
    }

    async fn close(&self) -> Result<()> {
        self.inner.close().await
    }

    fn url(&self) -> String {
        self.inner.url()
    }
}

fn config() -> RegistryConfig {
    RegistryConfig::in_memory().engine_mode(EngineMode::InProcess)
}

fn counted(config: RegistryConfig) -> (Arc<DatabaseHandle>, Arc<CountingEngine>) {
    let engine = Arc::new(CountingEngine {
        inner: SqliteEngine::open(&config).unwrap(),
        calls: AtomicUsize::new(0),
    });
    let handle = DatabaseHandle::with_engine(config, engine.clone());
    (handle, engine)
}

fn form(name: &str) -> PatientForm {
    PatientForm {
        name: name.into(),
        gender: Some(Gender::Male),
        contact: "555-0199".into(),
        ..PatientForm::default()
    }
}

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, 15).unwrap()
}

#[tokio::test]
async fn test_receiver_mirrors_payload_without_querying() {
    let hub = ChannelHub::new(8);
    let (writer_handle, _) = counted(config());
    let mut writer = Session::with_hub(writer_handle, &hub).unwrap();
    writer.bootstrap().await.unwrap();

    // The receiver has its own engine; it must never be consulted
    let (reader_handle, reader_engine) = counted(config());
    let mut reader = Session::with_hub(reader_handle, &hub).unwrap();

    writer.register_patient_on(&mut form("Alan"), today()).await.unwrap();

    assert_eq!(reader.poll_changes().await, 1);
    assert_eq!(reader_engine.calls.load(Ordering::SeqCst), 0);

    let mirrored = reader.records().unwrap();
    assert_eq!(mirrored, writer.records().unwrap());
    assert_eq!(mirrored.get(0, "id"), Some(&Value::Integer(1)));
    assert_eq!(mirrored.get(0, "name"), Some(&Value::from("Alan")));
}

#[tokio::test]
async fn test_sender_ignores_its_own_messages() {
    let hub = ChannelHub::new(8);
    let (handle, engine) = counted(config());
    let mut session = Session::with_hub(handle, &hub).unwrap();
    session.bootstrap().await.unwrap();

    session.register_patient_on(&mut form("Alan"), today()).await.unwrap();
    let calls = engine.calls.load(Ordering::SeqCst);

    assert_eq!(session.poll_changes().await, 0);
    assert_eq!(engine.calls.load(Ordering::SeqCst), calls);
}

#[tokio::test]
async fn test_late_subscriber_misses_earlier_messages() {
    let hub = ChannelHub::new(8);
    let handle = DatabaseHandle::open(config()).await.unwrap();
    let mut writer = Session::with_hub(handle.clone(), &hub).unwrap();
    writer.bootstrap().await.unwrap();
    writer.register_patient_on(&mut form("Alan"), today()).await.unwrap();

    let mut late = Session::with_hub(handle, &hub).unwrap();
    assert_eq!(late.poll_changes().await, 0);
    assert!(late.records().is_none());
}

#[tokio::test]
async fn test_closed_session_receives_nothing() {
    let hub = ChannelHub::new(8);
    let handle = DatabaseHandle::open(config()).await.unwrap();
    let mut writer = Session::with_hub(handle.clone(), &hub).unwrap();
    writer.bootstrap().await.unwrap();

    let mut closed = Session::with_hub(handle, &hub).unwrap();
    closed.close();
    assert_eq!(closed.channel_state(), ChannelState::Closed);

    writer.register_patient_on(&mut form("Alan"), today()).await.unwrap();
    assert_eq!(closed.poll_changes().await, 0);
    assert!(!closed.next_change().await);
}

#[tokio::test]
async fn test_dropped_session_releases_subscription() {
    let hub = ChannelHub::new(8);
    let handle = DatabaseHandle::open(config()).await.unwrap();
    let name = handle.config().channel_name.clone();

    let session = Session::with_hub(handle, &hub).unwrap();
    assert_eq!(hub.subscriber_count(&name), 1);
    drop(session);
    assert_eq!(hub.subscriber_count(&name), 0);
}

#[tokio::test]
async fn test_reconcile_refetches_authoritative_listing() {
    let hub = ChannelHub::new(8);
    let handle = DatabaseHandle::open(config().sync_mode(SyncMode::Reconcile))
        .await
        .unwrap();
    let mut writer = Session::with_hub(handle.clone(), &hub).unwrap();
    writer.bootstrap().await.unwrap();
    let mut reader = Session::with_hub(handle.clone(), &hub).unwrap();

    writer.register_patient_on(&mut form("Alan"), today()).await.unwrap();
    // A write nobody announces
    handle
        .exec("INSERT INTO patients (name) VALUES ('Unannounced')")
        .await
        .unwrap();

    assert_eq!(reader.poll_changes().await, 1);
    assert_eq!(reader.records().unwrap().row_count(), 2);
}

#[tokio::test]
async fn test_mirror_can_diverge_from_database() {
    let hub = ChannelHub::new(8);
    let handle = DatabaseHandle::open(config()).await.unwrap();
    let mut writer = Session::with_hub(handle.clone(), &hub).unwrap();
    writer.bootstrap().await.unwrap();
    let mut reader = Session::with_hub(handle.clone(), &hub).unwrap();

    writer.register_patient_on(&mut form("Alan"), today()).await.unwrap();
    handle
        .exec("INSERT INTO patients (name) VALUES ('Unannounced')")
        .await
        .unwrap();

    reader.poll_changes().await;
    assert_eq!(reader.records().unwrap().row_count(), 1);
}

#[tokio::test]
async fn test_broadcast_can_be_disabled() {
    let hub = ChannelHub::new(8);
    let handle = DatabaseHandle::open(config().broadcast_writes(false))
        .await
        .unwrap();
    let mut writer = Session::with_hub(handle.clone(), &hub).unwrap();
    writer.bootstrap().await.unwrap();
    let mut reader = Session::with_hub(handle, &hub).unwrap();

    writer.register_patient_on(&mut form("Alan"), today()).await.unwrap();
    assert_eq!(reader.poll_changes().await, 0);
}

#[tokio::test]
async fn test_messages_from_any_other_origin_are_applied() {
    let hub = ChannelHub::new(8);
    let handle = DatabaseHandle::open(config()).await.unwrap();
    let name = handle.config().channel_name.clone();
    let mut reader = Session::with_hub(handle, &hub).unwrap();

    let outsider = hub.open(&name, Uuid::new_v4()).unwrap();
    let mirrored = RecordSet::affected(0);
    outsider.post(&ChangeMessage::data_changed(mirrored.clone())).unwrap();

    assert_eq!(reader.poll_changes().await, 1);
    assert_eq!(reader.records(), Some(&mirrored));
}

#[tokio::test]
async fn test_next_change_waits_for_a_message() {
    let hub = ChannelHub::new(8);
    let handle = DatabaseHandle::open(config()).await.unwrap();
    let mut writer = Session::with_hub(handle.clone(), &hub).unwrap();
    writer.bootstrap().await.unwrap();
    let mut reader = Session::with_hub(handle, &hub).unwrap();

    let listener = tokio::spawn(async move {
        let applied = reader.next_change().await;
        (applied, reader.records().map(|r| r.row_count()))
    });
    tokio::task::yield_now().await;
    writer.register_patient_on(&mut form("Alan"), today()).await.unwrap();

    let (applied, rows) = listener.await.unwrap();
    assert!(applied);
    assert_eq!(rows, Some(1));
}

#[tokio::test]
async fn test_global_hub_channel_uses_configured_capacity() {
    // A fresh name so no other test has created this channel on the global hub
    let name = format!("capacity-{}", Uuid::new_v4());
    let handle = DatabaseHandle::open(config().channel_name(&name).channel_capacity(2))
        .await
        .unwrap();
    let mut writer = Session::open(handle.clone()).unwrap();
    writer.bootstrap().await.unwrap();
    let mut reader = Session::open(handle).unwrap();

    for patient in ["Alan", "Barbara", "Edsger"] {
        writer.register_patient_on(&mut form(patient), today()).await.unwrap();
    }

    // Only the two newest messages fit; the last one still carries every row
    assert_eq!(reader.poll_changes().await, 2);
    assert_eq!(reader.records().unwrap().row_count(), 3);
}
