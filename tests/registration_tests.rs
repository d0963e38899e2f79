//! Integration tests for patient registration and deletion

use chrono::NaiveDate;
use patientdb::config::{EngineMode, RegistryConfig};
use patientdb::facade::DatabaseHandle;
use patientdb::registry::{BloodGroup, Gender, Patient, PatientForm, repository};
use patientdb::sync::ChannelHub;
use patientdb::{RegistryError, Session, Value};
use tempfile::TempDir;

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, 15).unwrap()
}

fn complete_form() -> PatientForm {
    PatientForm {
        name: "Ada Lovelace".into(),
        date_of_birth: "2000-06-16".into(),
        gender: Some(Gender::Female),
        contact: "+44 20 7946 0000".into(),
        blood_group: Some(BloodGroup::ONegative),
        description: "Allergic to penicillin; it's noted".into(),
    }
}

async fn ready_session(hub: &ChannelHub, config: RegistryConfig) -> Session {
    let handle = DatabaseHandle::open(config).await.unwrap();
    let mut session = Session::with_hub(handle, hub).unwrap();
    session.bootstrap().await.unwrap();
    session
}

#[tokio::test]
async fn test_registration_adds_exactly_one_row() {
    let hub = ChannelHub::new(8);
    let mut session = ready_session(&hub, RegistryConfig::in_memory()).await;
    let mut form = complete_form();

    let inserted = session.register_patient_on(&mut form, today()).await.unwrap();
    assert_eq!(inserted.affected_rows(), 1);
    assert_eq!(form, PatientForm::default());

    let shown = session.records().unwrap();
    assert_eq!(shown.row_count(), 1);
    assert_eq!(
        session.view().notification().unwrap().message,
        "Patient registered successfully!"
    );
    assert!(!session.view().is_loading());
}

#[tokio::test]
async fn test_registered_values_round_trip() {
    let temp_dir = TempDir::new().unwrap();
    let config = RegistryConfig::new(temp_dir.path().join("patients.db"))
        .engine_mode(EngineMode::InProcess);
    let hub = ChannelHub::new(8);
    let mut session = ready_session(&hub, config).await;

    let submitted = complete_form();
    let mut form = submitted.clone();
    session.register_patient_on(&mut form, today()).await.unwrap();

    let listing = session.fetch_patients().await.unwrap();
    let patient = Patient::from_row(&listing.rows()[0]).unwrap();
    assert_eq!(patient.name, submitted.name);
    assert_eq!(patient.age, Some(23));
    assert_eq!(patient.gender.as_deref(), Some("female"));
    assert_eq!(patient.contact.as_deref(), Some(submitted.contact.as_str()));
    assert_eq!(patient.blood_group.as_deref(), Some("O-"));
    assert_eq!(patient.description.as_deref(), Some(submitted.description.as_str()));

    let found = repository::find(session.handle(), patient.id).await.unwrap();
    assert_eq!(found, Some(patient));
}

#[tokio::test]
async fn test_optional_fields_are_stored_as_null() {
    let hub = ChannelHub::new(8);
    let mut session = ready_session(&hub, RegistryConfig::in_memory()).await;
    let mut form = PatientForm {
        name: "Grace".into(),
        date_of_birth: "not a date".into(),
        gender: Some(Gender::Other),
        contact: "555".into(),
        ..PatientForm::default()
    };

    session.register_patient_on(&mut form, today()).await.unwrap();
    let shown = session.records().unwrap();
    assert_eq!(shown.get(0, "age"), Some(&Value::Null));
    assert_eq!(shown.get(0, "blood_group"), Some(&Value::Null));
    assert_eq!(shown.get(0, "description"), Some(&Value::Null));
}

#[tokio::test]
async fn test_invalid_form_is_kept_and_not_inserted() {
    let hub = ChannelHub::new(8);
    let mut session = ready_session(&hub, RegistryConfig::in_memory()).await;
    let mut form = PatientForm {
        gender: None,
        ..complete_form()
    };

    let err = session.register_patient_on(&mut form, today()).await.unwrap_err();
    assert!(matches!(err, RegistryError::Precondition(_)));
    assert_eq!(form.name, "Ada Lovelace");
    assert_eq!(
        session.view().notification().unwrap().message,
        "Error registering patient: Gender is required"
    );

    let listing = repository::fetch_all(session.handle()).await.unwrap();
    assert!(listing.is_empty());
}

#[tokio::test]
async fn test_failed_insert_keeps_form() {
    let hub = ChannelHub::new(8);
    let mut session = ready_session(&hub, RegistryConfig::in_memory()).await;
    session.handle().exec("DROP TABLE patients").await.unwrap();

    let mut form = complete_form();
    assert!(session.register_patient_on(&mut form, today()).await.is_err());
    assert_eq!(form, complete_form());
    assert!(session
        .view()
        .notification()
        .unwrap()
        .message
        .contains("no such table"));
}

#[tokio::test]
async fn test_delete_by_id() {
    let hub = ChannelHub::new(8);
    let mut session = ready_session(&hub, RegistryConfig::in_memory()).await;
    session
        .register_patient_on(&mut complete_form(), today())
        .await
        .unwrap();
    let id = session.records().unwrap().get(0, "id").and_then(Value::as_i64);

    let deleted = session.delete_patient(id).await.unwrap();
    assert_eq!(deleted.affected_rows(), 1);
    assert!(session.records().unwrap().is_empty());
    assert_eq!(
        session.view().notification().unwrap().message,
        "Deleted 1 patient record(s)"
    );
}

#[tokio::test]
async fn test_delete_missing_id_changes_nothing() {
    let hub = ChannelHub::new(8);
    let mut session = ready_session(&hub, RegistryConfig::in_memory()).await;
    session
        .register_patient_on(&mut complete_form(), today())
        .await
        .unwrap();

    let deleted = session.delete_patient(Some(9999)).await.unwrap();
    assert_eq!(deleted.affected_rows(), 0);
    assert_eq!(session.records().unwrap().row_count(), 1);
}

#[tokio::test]
async fn test_delete_without_selection_is_refused() {
    let hub = ChannelHub::new(8);
    let handle = DatabaseHandle::new(RegistryConfig::in_memory());
    let mut session = Session::with_hub(handle, &hub).unwrap();

    // Refused before the handle is consulted, so not-ready does not show
    let err = session.delete_patient(None).await.unwrap_err();
    assert!(matches!(err, RegistryError::Precondition(_)));
    assert_eq!(
        session.view().notification().unwrap().message,
        "Error deleting patient: No patient selected"
    );
}

#[tokio::test]
async fn test_selected_patient_loads_into_form() {
    let hub = ChannelHub::new(8);
    let mut session = ready_session(&hub, RegistryConfig::in_memory()).await;
    session
        .register_patient_on(&mut complete_form(), today())
        .await
        .unwrap();
    let listing = session.records().unwrap().clone();
    let id = listing.get(0, "id").and_then(Value::as_i64);

    let patient = session.load_patient(id).await.unwrap();
    assert_eq!(Some(patient.id), id);
    assert_eq!(
        session.view().notification().unwrap().message,
        "Loaded patient Ada Lovelace"
    );
    // Loading reads only; the listing is unchanged
    assert_eq!(session.records(), Some(&listing));

    let form = PatientForm::from_patient(&patient);
    assert_eq!(
        form,
        PatientForm {
            date_of_birth: String::new(),
            ..complete_form()
        }
    );
}

#[tokio::test]
async fn test_loading_unknown_or_unselected_patient_is_refused() {
    let hub = ChannelHub::new(8);
    let mut session = ready_session(&hub, RegistryConfig::in_memory()).await;

    let err = session.load_patient(Some(42)).await.unwrap_err();
    assert!(matches!(err, RegistryError::Precondition(_)));
    assert_eq!(
        session.view().notification().unwrap().message,
        "Error loading patient: Patient 42 not found"
    );

    let err = session.load_patient(None).await.unwrap_err();
    assert!(matches!(err, RegistryError::Precondition(_)));
    assert_eq!(
        session.view().notification().unwrap().message,
        "Error loading patient: No patient selected"
    );
    assert!(!session.view().is_loading());
}
