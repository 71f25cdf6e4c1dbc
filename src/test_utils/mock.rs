use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use crate::client::{BatchRequest, DataApiClient, StatementRequest};
use crate::error::DataApiError;
use crate::params::{Parameter, Params};
use crate::results::ResultSet;
use crate::target::ConnectionTarget;
use crate::types::RowValues;

/// What the responder sees for one statement: the SQL, its parameters, and the session
/// settings visible to it.
pub struct MockStatement<'a> {
    pub sql: &'a str,
    pub params: &'a Params,
    pub transaction_id: Option<&'a str>,
    pub settings: &'a HashMap<String, String>,
}

type Responder = dyn Fn(&MockStatement<'_>) -> Result<ResultSet, DataApiError> + Send + Sync;

/// One call that reached the fake service.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordedCall {
    Execute {
        sql: String,
        params: Vec<Parameter>,
        transaction_id: Option<String>,
    },
    Batch {
        sql: String,
        sets: usize,
        transaction_id: Option<String>,
    },
    Begin,
    Commit(String),
    Rollback(String),
}

#[derive(Default)]
struct TxRecord {
    settings: HashMap<String, String>,
}

#[derive(Default)]
struct MockState {
    calls: Vec<RecordedCall>,
    next_id: u64,
    transactions: HashMap<String, TxRecord>,
    queued_errors: VecDeque<DataApiError>,
}

/// In-memory data-plane fake.
///
/// Models a service where no session outlives its unit of work, the same contract
/// the Postgres stand-in keeps by resetting pooled sessions:
/// a transaction is one session, so `set_config(...)`, `SET` and `SET LOCAL` inside it stay
/// visible to its later statements and are gone once it ends; outside a transaction each call
/// is its own session. Everything else is answered by the responder.
pub struct MockDataApi {
    state: Mutex<MockState>,
    responder: Arc<Responder>,
}

impl Default for MockDataApi {
    fn default() -> Self {
        Self::new()
    }
}

impl MockDataApi {
    /// A fake that answers every statement with an empty result set.
    #[must_use]
    pub fn new() -> Self {
        Self::with_responder(|_| Ok(ResultSet::default()))
    }

    pub fn with_responder(
        responder: impl Fn(&MockStatement<'_>) -> Result<ResultSet, DataApiError>
        + Send
        + Sync
        + 'static,
    ) -> Self {
        Self {
            state: Mutex::new(MockState::default()),
            responder: Arc::new(responder),
        }
    }

    /// Make the next remote call of any kind fail with `error`.
    pub fn queue_error(&self, error: DataApiError) {
        self.lock().queued_errors.push_back(error);
    }

    #[must_use]
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.lock().calls.clone()
    }

    /// Number of calls that reached the fake service.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.lock().calls.len()
    }

    /// Transactions begun and not yet committed or rolled back.
    #[must_use]
    pub fn open_transactions(&self) -> usize {
        self.lock().transactions.len()
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn record(&self, call: RecordedCall) -> Result<(), DataApiError> {
        let mut state = self.lock();
        state.calls.push(call);
        match state.queued_errors.pop_front() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn run(
        &self,
        sql: &str,
        params: &Params,
        transaction_id: Option<&str>,
    ) -> Result<ResultSet, DataApiError> {
        let mut settings = match transaction_id {
            Some(id) => self
                .lock()
                .transactions
                .get(id)
                .map(|tx| tx.settings.clone())
                .ok_or_else(|| {
                    DataApiError::TransactionError(format!(
                        "TransactionNotFoundException: transaction {id} is not found"
                    ))
                })?,
            None => HashMap::new(),
        };

        if let Some((name, value)) = session_assignment(sql, params) {
            settings.insert(name, value.clone());
            if let Some(id) = transaction_id
                && let Some(tx) = self.lock().transactions.get_mut(id)
            {
                tx.settings = settings;
            }
            let mut rs = ResultSet::with_capacity(1);
            rs.set_column_names(Arc::new(vec!["set_config".to_string()]));
            rs.add_row_values(vec![RowValues::Text(value)]);
            return Ok(rs);
        }

        (self.responder)(&MockStatement {
            sql,
            params,
            transaction_id,
            settings: &settings,
        })
    }

    fn end_transaction(&self, transaction_id: &str) -> Result<(), DataApiError> {
        self.lock()
            .transactions
            .remove(transaction_id)
            .map(|_| ())
            .ok_or_else(|| {
                DataApiError::TransactionError(format!(
                    "TransactionNotFoundException: transaction {transaction_id} is not found"
                ))
            })
    }
}

/// Recognise `set_config(:setting_name, :setting_value, ...)` and `SET [LOCAL] name = value`.
fn session_assignment(sql: &str, params: &Params) -> Option<(String, String)> {
    let trimmed = sql.trim().trim_end_matches(';');
    let lowered = trimmed.to_ascii_lowercase();

    if lowered.contains("set_config(") {
        let name = params.get("setting_name")?.as_text()?.to_string();
        let value = match params.get("setting_value")? {
            RowValues::Text(s) => s.clone(),
            RowValues::Int(i) => i.to_string(),
            _ => return None,
        };
        return Some((name, value));
    }

    let rest = lowered.strip_prefix("set ")?;
    let offset = trimmed.len() - rest.len();
    let rest = trimmed[offset..].trim_start();
    let rest = rest
        .strip_prefix("LOCAL ")
        .or_else(|| rest.strip_prefix("local "))
        .unwrap_or(rest);
    let (name, value) = rest.split_once('=').or_else(|| {
        let lowered = rest.to_ascii_lowercase();
        let at = lowered.find(" to ")?;
        Some((&rest[..at], &rest[at + 4..]))
    })?;
    let clean = |s: &str| s.trim().trim_matches('"').trim_matches('\'').to_string();
    Some((clean(name), clean(value)))
}

#[async_trait]
impl DataApiClient for MockDataApi {
    async fn execute_statement(
        &self,
        request: &StatementRequest<'_>,
    ) -> Result<ResultSet, DataApiError> {
        self.record(RecordedCall::Execute {
            sql: request.sql.to_string(),
            params: request.params.as_slice().to_vec(),
            transaction_id: request.transaction_id.map(str::to_string),
        })?;
        self.run(request.sql, request.params, request.transaction_id)
    }

    async fn batch_execute_statement(
        &self,
        request: &BatchRequest<'_>,
    ) -> Result<usize, DataApiError> {
        self.record(RecordedCall::Batch {
            sql: request.sql.to_string(),
            sets: request.parameter_sets.len(),
            transaction_id: request.transaction_id.map(str::to_string),
        })?;
        for params in request.parameter_sets {
            self.run(request.sql, params, request.transaction_id)?;
        }
        Ok(request.parameter_sets.len())
    }

    async fn begin_transaction(&self, _target: &ConnectionTarget) -> Result<String, DataApiError> {
        self.record(RecordedCall::Begin)?;
        let mut state = self.lock();
        state.next_id += 1;
        let id = format!("mock-tx-{}", state.next_id);
        state.transactions.insert(id.clone(), TxRecord::default());
        Ok(id)
    }

    async fn commit_transaction(
        &self,
        _target: &ConnectionTarget,
        transaction_id: &str,
    ) -> Result<String, DataApiError> {
        self.record(RecordedCall::Commit(transaction_id.to_string()))?;
        self.end_transaction(transaction_id)?;
        Ok("Transaction Committed".to_string())
    }

    async fn rollback_transaction(
        &self,
        _target: &ConnectionTarget,
        transaction_id: &str,
    ) -> Result<String, DataApiError> {
        self.record(RecordedCall::Rollback(transaction_id.to_string()))?;
        self.end_transaction(transaction_id)?;
        Ok("Rollback Complete".to_string())
    }
}
