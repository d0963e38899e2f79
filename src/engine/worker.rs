use std::sync::mpsc;
use std::thread;

use async_trait::async_trait;
use rusqlite::Connection;
use tokio::sync::oneshot;
use tracing::{debug, error};

use super::Engine;
use super::sqlite::{close_connection, location_url, open_connection, run_batch, run_query};
use crate::config::RegistryConfig;
use crate::core::{RegistryError, Result, Value};
use crate::result::RecordSet;

enum Request {
    Query {
        sql: String,
        params: Vec<Value>,
        reply: oneshot::Sender<Result<RecordSet>>,
    },
    Exec {
        sql: String,
        reply: oneshot::Sender<Result<Vec<RecordSet>>>,
    },
    Close {
        reply: oneshot::Sender<Result<()>>,
    },
}

/// Engine whose connection lives on a dedicated thread.
///
/// Every call is sent to the worker as a request and answered over a one-shot
/// channel, so requests from all sessions are executed one at a time in
/// arrival order.
pub struct WorkerEngine {
    requests: mpsc::Sender<Request>,
    url: String,
}

impl WorkerEngine {
    /// Starts the worker and waits until it has opened the database.
    pub async fn spawn(config: &RegistryConfig) -> Result<Self> {
        let (requests, inbox) = mpsc::channel::<Request>();
        let (ready_tx, ready_rx) = oneshot::channel::<Result<()>>();
        let location = config.database.clone();
        let busy_timeout = config.busy_timeout;
        let url = location_url(&location);

        thread::Builder::new()
            .name("patientdb-engine".into())
            .spawn(move || match open_connection(&location, busy_timeout) {
                Ok(conn) => {
                    let _ = ready_tx.send(Ok(()));
                    serve(conn, inbox);
                }
                Err(err) => {
                    let _ = ready_tx.send(Err(err));
                }
            })?;

        ready_rx
            .await
            .map_err(|_| RegistryError::WorkerUnavailable("worker exited during startup".into()))??;

        debug!(url = %url, "engine worker started");
        Ok(Self { requests, url })
    }

    async fn call<T>(&self, request: impl FnOnce(oneshot::Sender<Result<T>>) -> Request) -> Result<T> {
        let (reply, response) = oneshot::channel();
        self.requests
            .send(request(reply))
            .map_err(|_| RegistryError::WorkerUnavailable("worker has stopped".into()))?;

        response
            .await
            .map_err(|_| RegistryError::WorkerUnavailable("worker dropped the request".into()))?
    }
}

fn serve(conn: Connection, inbox: mpsc::Receiver<Request>) {
    for request in inbox {
        match request {
            Request::Query { sql, params, reply } => {
                let _ = reply.send(run_query(&conn, &sql, &params));
            }
            Request::Exec { sql, reply } => {
                let _ = reply.send(run_batch(&conn, &sql));
            }
            Request::Close { reply } => {
                let result = close_connection(conn);
                if let Err(err) = &result {
                    error!(error = %err, "failed to close engine connection");
                }
                let _ = reply.send(result);
                return;
            }
        }
    }
}

#[async_trait]
impl Engine for WorkerEngine {
    async fn query(&self, sql: &str, params: &[Value]) -> Result<RecordSet> {
        let sql = sql.to_string();
        let params = params.to_vec();
        self.call(|reply| Request::Query { sql, params, reply }).await
    }

    async fn exec(&self, sql: &str) -> Result<Vec<RecordSet>> {
        let sql = sql.to_string();
        self.call(|reply| Request::Exec { sql, reply }).await
    }

    async fn close(&self) -> Result<()> {
        self.call(|reply| Request::Close { reply }).await
    }

    fn url(&self) -> String {
        self.url.clone()
    }
}
