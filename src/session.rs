//! One interactive session over a shared database handle.
//!
//! A session owns its displayed state ([`ViewState`]) and its subscription to
//! the change channel. Every operation converts failures into the single
//! notification the user sees, and also returns them to the caller.
//!
//! ```no_run
//! use patientdb::config::RegistryConfig;
//! use patientdb::facade::DatabaseHandle;
//! use patientdb::session::Session;
//!
//! # async fn demo() -> patientdb::core::Result<()> {
//! let handle = DatabaseHandle::open(RegistryConfig::in_memory()).await?;
//! let mut session = Session::open(handle)?;
//! session.bootstrap().await?;
//! session.execute_query("SELECT * FROM patients").await?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use chrono::{Local, NaiveDate};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::SyncMode;
use crate::core::{RegistryError, Result};
use crate::facade::DatabaseHandle;
use crate::registry::{Patient, PatientForm};
use crate::registry::repository;
use crate::result::RecordSet;
use crate::sql::{StatementClass, classify};
use crate::sync::{BroadcastChannel, ChangeMessage, ChannelHub, ChannelState, ContextId};
use crate::view::{Action, Notification, ViewState};

/// Result of a console statement.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryOutcome {
    pub class: StatementClass,
    /// One record set per statement, as the engine returned them.
    pub results: Vec<RecordSet>,
    /// Set when a write succeeded but the listing could not be re-fetched.
    pub refresh_error: Option<RegistryError>,
}

pub struct Session {
    id: ContextId,
    handle: Arc<DatabaseHandle>,
    channel: BroadcastChannel,
    view: ViewState,
}

impl Session {
    /// Opens a session on the process-wide channel hub.
    pub fn open(handle: Arc<DatabaseHandle>) -> Result<Self> {
        Self::with_hub(handle, ChannelHub::global())
    }

    /// Opens a session on `hub`. The channel is sized from the handle's
    /// `channel_capacity` when this session is the first to open it.
    pub fn with_hub(handle: Arc<DatabaseHandle>, hub: &ChannelHub) -> Result<Self> {
        let id = Uuid::new_v4();
        let config = handle.config();
        let channel = hub.open_with_capacity(&config.channel_name, id, config.channel_capacity)?;
        info!(session = %id, channel = %channel.name(), "session opened");

        Ok(Self {
            id,
            handle,
            channel,
            view: ViewState::new(),
        })
    }

    pub fn id(&self) -> ContextId {
        self.id
    }

    pub fn handle(&self) -> &Arc<DatabaseHandle> {
        &self.handle
    }

    pub fn view(&self) -> &ViewState {
        &self.view
    }

    pub fn records(&self) -> Option<&RecordSet> {
        self.view.records()
    }

    pub fn channel_state(&self) -> ChannelState {
        self.channel.state()
    }

    pub fn dismiss_notification(&mut self) {
        self.view.apply(Action::ClearNotification);
    }

    /// Creates the schema, then loads the listing.
    pub async fn bootstrap(&mut self) -> Result<Arc<RecordSet>> {
        self.view.apply(Action::Started);
        let created = repository::create_schema(&self.handle).await;
        self.view.apply(Action::Finished);

        match created {
            Ok(()) => self.notify(Notification::success("Patients table initialized successfully!")),
            Err(err) => {
                self.notify_failure("Error creating patients table", &err);
                return Err(err);
            }
        }
        self.fetch_patients().await
    }

    pub async fn fetch_patients(&mut self) -> Result<Arc<RecordSet>> {
        self.view.apply(Action::Started);
        let fetched = self.refresh().await;
        self.view.apply(Action::Finished);

        match fetched {
            Ok(records) => {
                self.notify(Notification::success("Patients data loaded successfully!"));
                Ok(records)
            }
            Err(err) => {
                self.notify_failure("Error fetching patients", &err);
                Err(err)
            }
        }
    }

    /// Runs console text. Reads display their first result; writes and schema
    /// changes re-fetch the canonical listing and announce it.
    pub async fn execute_query(&mut self, sql: &str) -> Result<QueryOutcome> {
        self.view.apply(Action::Started);
        let executed = self.run_console(sql).await;
        self.view.apply(Action::Finished);

        match &executed {
            Ok(outcome) => match &outcome.refresh_error {
                None => self.notify(Notification::success("Query executed successfully!")),
                Some(err) => self.notify_failure("Error fetching patients", err),
            },
            Err(err) => self.notify_failure("Error executing query", err),
        }
        executed
    }

    async fn run_console(&mut self, sql: &str) -> Result<QueryOutcome> {
        if sql.trim().is_empty() {
            return Err(RegistryError::precondition("Query is empty"));
        }

        let class = classify(sql);
        let results = self.handle.exec(sql).await?;
        debug!(session = %self.id, class = %class, statements = results.len(), "console statement executed");

        let mut refresh_error = None;
        if class.is_read() {
            if let Some(first) = results.first() {
                self.view.apply(Action::Records(Arc::new(first.clone())));
            }
        } else if let Err(err) = self.after_write().await {
            refresh_error = Some(err);
        }

        Ok(QueryOutcome {
            class,
            results,
            refresh_error,
        })
    }

    /// Registers a patient, deriving the age from today's local date.
    pub async fn register_patient(&mut self, form: &mut PatientForm) -> Result<RecordSet> {
        self.register_patient_on(form, Local::now().date_naive()).await
    }

    /// Registers a patient. The form is cleared on success and left as typed
    /// on failure.
    pub async fn register_patient_on(
        &mut self,
        form: &mut PatientForm,
        today: NaiveDate,
    ) -> Result<RecordSet> {
        self.view.apply(Action::Started);

        let inserted = match form.validate() {
            Ok(()) => repository::insert(&self.handle, form, today).await,
            Err(err) => Err(err),
        };
        let outcome = match inserted {
            Ok(inserted) => {
                info!(session = %self.id, name = %form.name, "patient registered");
                form.clear();
                self.settle_write("Patient registered successfully!".to_string()).await;
                Ok(inserted)
            }
            Err(err) => {
                self.notify_failure("Error registering patient", &err);
                Err(err)
            }
        };

        self.view.apply(Action::Finished);
        outcome
    }

    /// Deletes by id. `None` is refused without touching the database.
    pub async fn delete_patient(&mut self, id: Option<i64>) -> Result<RecordSet> {
        self.view.apply(Action::Started);

        let deleted = match id {
            Some(id) => repository::delete(&self.handle, id).await,
            None => Err(RegistryError::precondition("No patient selected")),
        };
        let outcome = match deleted {
            Ok(deleted) => {
                info!(session = %self.id, id = ?id, affected = deleted.affected_rows(), "patient deleted");
                let message = format!("Deleted {} patient record(s)", deleted.affected_rows());
                self.settle_write(message).await;
                Ok(deleted)
            }
            Err(err) => {
                self.notify_failure("Error deleting patient", &err);
                Err(err)
            }
        };

        self.view.apply(Action::Finished);
        outcome
    }

    /// Reads one stored patient, for pre-filling the registration form.
    /// Leaves the displayed records untouched.
    pub async fn load_patient(&mut self, id: Option<i64>) -> Result<Patient> {
        self.view.apply(Action::Started);

        let loaded = match id {
            Some(id) => repository::find(&self.handle, id)
                .await
                .and_then(|found| {
                    found.ok_or_else(|| RegistryError::precondition(format!("Patient {} not found", id)))
                }),
            None => Err(RegistryError::precondition("No patient selected")),
        };
        let outcome = match loaded {
            Ok(patient) => {
                debug!(session = %self.id, id = patient.id, "patient loaded");
                self.notify(Notification::success(format!("Loaded patient {}", patient.name)));
                Ok(patient)
            }
            Err(err) => {
                self.notify_failure("Error loading patient", &err);
                Err(err)
            }
        };

        self.view.apply(Action::Finished);
        outcome
    }

    /// Applies every pending change message from other sessions without
    /// waiting. Returns how many were received.
    pub async fn poll_changes(&mut self) -> usize {
        let mut received = 0;
        let mut latest = None;
        while let Some(message) = self.channel.try_recv() {
            received += 1;
            latest = Some(message);
        }
        // Each message replaces the whole listing, so only the last one counts.
        if let Some(message) = latest {
            self.apply_change(message).await;
        }
        received
    }

    /// Waits for the next change message and applies it. `false` once the
    /// channel is closed.
    pub async fn next_change(&mut self) -> bool {
        match self.channel.recv().await {
            Some(message) => {
                self.apply_change(message).await;
                true
            }
            None => false,
        }
    }

    async fn apply_change(&mut self, message: ChangeMessage) {
        match self.handle.config().sync_mode {
            SyncMode::Mirror => {
                let results = message.payload.results;
                debug!(session = %self.id, rows = results.row_count(), "mirroring change message");
                self.view.apply(Action::Records(Arc::new(results)));
            }
            SyncMode::Reconcile => {
                debug!(session = %self.id, "change message received, re-fetching");
                if let Err(err) = self.refresh().await {
                    self.notify_failure("Error fetching patients", &err);
                }
            }
        }
    }

    /// Releases the channel subscription. Idempotent.
    pub fn close(&mut self) {
        self.channel.close();
        info!(session = %self.id, "session closed");
    }

    async fn refresh(&mut self) -> Result<Arc<RecordSet>> {
        let records = Arc::new(repository::fetch_all(&self.handle).await?);
        self.view.apply(Action::Records(records.clone()));
        Ok(records)
    }

    async fn after_write(&mut self) -> Result<Arc<RecordSet>> {
        let records = self.refresh().await?;
        self.announce(&records);
        Ok(records)
    }

    async fn settle_write(&mut self, success: String) {
        match self.after_write().await {
            Ok(_) => self.notify(Notification::success(success)),
            Err(err) => self.notify_failure("Error fetching patients", &err),
        }
    }

    fn announce(&self, records: &RecordSet) {
        if !self.handle.config().broadcast_writes {
            return;
        }
        match self.channel.post(&ChangeMessage::data_changed(records.clone())) {
            Ok(listeners) => debug!(session = %self.id, listeners, "change announced"),
            Err(err) => warn!(session = %self.id, error = %err, "could not announce change"),
        }
    }

    fn notify(&mut self, notification: Notification) {
        self.view.apply(Action::Notify(notification));
    }

    fn notify_failure(&mut self, context: &str, err: &RegistryError) {
        warn!(session = %self.id, category = ?err.category(), error = %err, "{}", context);
        self.notify(Notification::error(format!("{}: {}", context, err)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RegistryConfig;
    use crate::core::Value;

    async fn session(hub: &ChannelHub) -> Session {
        let config = RegistryConfig::in_memory().engine_mode(crate::config::EngineMode::InProcess);
        let handle = DatabaseHandle::open(config).await.unwrap();
        Session::with_hub(handle, hub).unwrap()
    }

    #[tokio::test]
    async fn bootstrap_ends_with_the_loaded_notification() {
        let hub = ChannelHub::new(8);
        let mut s = session(&hub).await;
        let records = s.bootstrap().await.unwrap();
        assert!(records.is_empty());
        assert_eq!(
            s.view().notification().unwrap().message,
            "Patients data loaded successfully!"
        );
        assert!(!s.view().is_loading());
    }

    #[tokio::test]
    async fn empty_console_text_is_refused() {
        let hub = ChannelHub::new(8);
        let mut s = session(&hub).await;
        let err = s.execute_query("   ").await.unwrap_err();
        assert!(matches!(err, RegistryError::Precondition(_)));
        assert!(s.view().notification().unwrap().is_error());
    }

    #[tokio::test]
    async fn read_results_are_displayed_directly() {
        let hub = ChannelHub::new(8);
        let mut s = session(&hub).await;
        let outcome = s.execute_query("SELECT 1 AS one, 'x' AS two").await.unwrap();
        assert_eq!(outcome.class, StatementClass::Read);
        let shown = s.records().unwrap();
        assert_eq!(shown.get(0, "one"), Some(&Value::Integer(1)));
    }

    #[tokio::test]
    async fn close_is_idempotent() {
        let hub = ChannelHub::new(8);
        let mut s = session(&hub).await;
        s.close();
        s.close();
        assert_eq!(s.channel_state(), ChannelState::Closed);
        assert_eq!(hub.subscriber_count(&s.handle().config().channel_name), 0);
    }
}
