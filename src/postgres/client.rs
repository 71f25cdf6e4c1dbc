use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use deadpool_postgres::{Object, Pool};
use tokio_postgres::types::ToSql;
use uuid::Uuid;

use super::config::PostgresOptions;
use super::params::bind_named;
use super::query::build_result_set;
use crate::client::{BatchRequest, DataApiClient, StatementRequest};
use crate::error::DataApiError;
use crate::params::Params;
use crate::results::ResultSet;
use crate::target::ConnectionTarget;

enum Slot {
    Idle(Object),
    InUse,
    /// A statement future was dropped mid-flight; the connection was closed, which rolls the
    /// server-side transaction back.
    Abandoned,
}

#[derive(Clone, Copy)]
enum Ending {
    Commit,
    Rollback,
}

impl Ending {
    fn sql(self) -> &'static str {
        match self {
            Ending::Commit => "COMMIT",
            Ending::Rollback => "ROLLBACK",
        }
    }
}

/// A transaction's connection while one statement runs on it.
///
/// Dropped without [`check_in`](Lease::check_in) (the statement future was cancelled, e.g. by
/// a timeout), the connection is detached from the pool and closed and the slot is marked
/// abandoned, so no half-open `BEGIN` is ever handed to another borrower.
struct Lease<'a> {
    owner: &'a PostgresDataApi,
    transaction_id: String,
    conn: Option<Object>,
}

impl Lease<'_> {
    fn client(&self) -> Result<&Object, DataApiError> {
        self.conn.as_ref().ok_or_else(|| {
            DataApiError::TransactionError(format!(
                "transaction {} has no connection",
                self.transaction_id
            ))
        })
    }

    fn check_in(mut self) {
        if let Some(conn) = self.conn.take() {
            self.owner
                .slots()
                .insert(self.transaction_id.clone(), Slot::Idle(conn));
        }
    }
}

impl Drop for Lease<'_> {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            tracing::warn!(
                transaction_id = %self.transaction_id,
                "statement cancelled mid-flight; closing its connection"
            );
            drop(Object::take(conn));
            self.owner
                .slots()
                .insert(self.transaction_id.clone(), Slot::Abandoned);
        }
    }
}

/// [`DataApiClient`] that runs statements on a local Postgres pool.
///
/// A transaction is a pooled connection with `BEGIN` issued, keyed by a random id. While a
/// statement runs the connection is checked out of the map, so a second statement on the same
/// transaction id fails instead of interleaving on one session.
///
/// Sessions never outlive a unit of work: the pool resets every connection before reuse, so a
/// plain `SET` lasts until the end of its transaction, or of its single call outside one.
pub struct PostgresDataApi {
    pool: Pool,
    transactions: Mutex<HashMap<String, Slot>>,
}

impl PostgresDataApi {
    #[must_use]
    pub fn new(pool: Pool) -> Self {
        Self {
            pool,
            transactions: Mutex::new(HashMap::new()),
        }
    }

    /// # Errors
    /// Propagates [`PostgresOptions::build_pool`] errors.
    pub fn from_options(options: &PostgresOptions) -> Result<Self, DataApiError> {
        Ok(Self::new(options.build_pool()?))
    }

    #[must_use]
    pub fn pool(&self) -> &Pool {
        &self.pool
    }

    /// Number of transactions begun and not yet finished.
    #[must_use]
    pub fn open_transactions(&self) -> usize {
        self.slots().len()
    }

    fn slots(&self) -> MutexGuard<'_, HashMap<String, Slot>> {
        match self.transactions.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    async fn connection(&self) -> Result<Object, DataApiError> {
        self.pool.get().await.map_err(|e| {
            DataApiError::ConnectionError(format!("Postgres pool checkout failed: {e}"))
        })
    }

    fn check_out(&self, transaction_id: &str) -> Result<Lease<'_>, DataApiError> {
        let mut slots = self.slots();
        match slots.insert(transaction_id.to_string(), Slot::InUse) {
            Some(Slot::Idle(conn)) => Ok(Lease {
                owner: self,
                transaction_id: transaction_id.to_string(),
                conn: Some(conn),
            }),
            Some(previous) => {
                let err = busy_or_abandoned(transaction_id, &previous);
                slots.insert(transaction_id.to_string(), previous);
                Err(err)
            }
            None => {
                slots.remove(transaction_id);
                Err(not_found(transaction_id))
            }
        }
    }

    /// Take the connection out of the map for good and send `COMMIT` or `ROLLBACK`.
    ///
    /// Rolling back an abandoned transaction succeeds without a round trip; committing one
    /// fails since its work is already gone.
    async fn finish(&self, transaction_id: &str, ending: Ending) -> Result<(), DataApiError> {
        let conn = {
            let mut slots = self.slots();
            match (slots.remove(transaction_id), ending) {
                (Some(Slot::Idle(conn)), _) => conn,
                (Some(Slot::Abandoned), Ending::Rollback) => return Ok(()),
                (Some(Slot::Abandoned), Ending::Commit) => {
                    return Err(DataApiError::TransactionError(format!(
                        "transaction {transaction_id} was abandoned mid-statement and rolled back"
                    )));
                }
                (Some(Slot::InUse), _) => {
                    slots.insert(transaction_id.to_string(), Slot::InUse);
                    return Err(busy_or_abandoned(transaction_id, &Slot::InUse));
                }
                (None, _) => return Err(not_found(transaction_id)),
            }
        };
        if let Err(e) = conn.batch_execute(ending.sql()).await {
            // session state is unknown; keep it out of the pool
            drop(Object::take(conn));
            return Err(classify_pg_error(&e));
        }
        Ok(())
    }
}

fn busy_or_abandoned(transaction_id: &str, slot: &Slot) -> DataApiError {
    let why = match slot {
        Slot::Abandoned => "was abandoned mid-statement and rolled back",
        _ => "is already running a statement",
    };
    DataApiError::TransactionError(format!("transaction {transaction_id} {why}"))
}

fn not_found(transaction_id: &str) -> DataApiError {
    DataApiError::TransactionError(format!("transaction {transaction_id} is not found"))
}

async fn run_statement(
    client: &tokio_postgres::Client,
    sql: &str,
    params: &Params,
) -> Result<ResultSet, DataApiError> {
    let (sql, values) = bind_named(sql, params)?;
    let refs: Vec<&(dyn ToSql + Sync)> = values
        .iter()
        .map(|v| *v as &(dyn ToSql + Sync))
        .collect();

    let stmt = client
        .prepare(&sql)
        .await
        .map_err(|e| classify_pg_error(&e))?;
    if stmt.columns().is_empty() {
        let affected = client
            .execute(&stmt, &refs)
            .await
            .map_err(|e| classify_pg_error(&e))?;
        Ok(ResultSet::from_rows_affected(
            usize::try_from(affected).unwrap_or(usize::MAX),
        ))
    } else {
        let rows = client
            .query(&stmt, &refs)
            .await
            .map_err(|e| classify_pg_error(&e))?;
        build_result_set(&stmt, &rows)
    }
}

/// Server-reported errors (syntax, policy, constraint) are statement errors; the rest are
/// transport problems.
pub(crate) fn classify_pg_error(err: &tokio_postgres::Error) -> DataApiError {
    if let Some(db) = err.as_db_error() {
        return DataApiError::StatementError(format!(
            "{}: {}",
            db.code().code(),
            db.message()
        ));
    }
    let text = err.to_string();
    if text.contains("serializing parameter") {
        return DataApiError::ParameterError(text);
    }
    DataApiError::ConnectionError(text)
}

#[async_trait]
impl DataApiClient for PostgresDataApi {
    async fn execute_statement(
        &self,
        request: &StatementRequest<'_>,
    ) -> Result<ResultSet, DataApiError> {
        match request.transaction_id {
            Some(id) => {
                let lease = self.check_out(id)?;
                let result = run_statement(lease.client()?, request.sql, request.params).await;
                lease.check_in();
                result
            }
            None => {
                let conn = self.connection().await?;
                run_statement(&conn, request.sql, request.params).await
            }
        }
    }

    async fn batch_execute_statement(
        &self,
        request: &BatchRequest<'_>,
    ) -> Result<usize, DataApiError> {
        async fn run_all(
            client: &tokio_postgres::Client,
            request: &BatchRequest<'_>,
        ) -> Result<usize, DataApiError> {
            for params in request.parameter_sets {
                run_statement(client, request.sql, params).await?;
            }
            Ok(request.parameter_sets.len())
        }

        match request.transaction_id {
            Some(id) => {
                let lease = self.check_out(id)?;
                let result = run_all(lease.client()?, request).await;
                lease.check_in();
                result
            }
            None => {
                let conn = self.connection().await?;
                run_all(&conn, request).await
            }
        }
    }

    async fn begin_transaction(&self, _target: &ConnectionTarget) -> Result<String, DataApiError> {
        let conn = self.connection().await?;
        conn.batch_execute("BEGIN")
            .await
            .map_err(|e| classify_pg_error(&e))?;
        let id = Uuid::new_v4().to_string();
        self.slots().insert(id.clone(), Slot::Idle(conn));
        Ok(id)
    }

    async fn commit_transaction(
        &self,
        _target: &ConnectionTarget,
        transaction_id: &str,
    ) -> Result<String, DataApiError> {
        self.finish(transaction_id, Ending::Commit).await?;
        Ok("Transaction Committed".to_string())
    }

    async fn rollback_transaction(
        &self,
        _target: &ConnectionTarget,
        transaction_id: &str,
    ) -> Result<String, DataApiError> {
        self.finish(transaction_id, Ending::Rollback).await?;
        Ok("Rollback Complete".to_string())
    }
}
