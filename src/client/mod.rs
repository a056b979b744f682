//! Client - the connection state machine and the UI-facing actions
//!
//! ```text
//! Unchecked ─load()─► NoProvider ───────────────► (install wallet, retry load)
//!              │
//!              └────► ProviderDetected ─► Unauthorized ─connect()─► Authorized ─bind─► Idle
//!                                                                                   │  ▲
//!                                                               deposit()/withdraw() ▼  │ confirmed
//!                                                                            OperationInFlight
//! ```
//!
//! The client is the single writer of session, handle and ledger state.
//! Its state lock is never held across a suspension point.

mod config;
mod events;

pub use config::ClientConfig;
#[cfg(feature = "native")]
pub use config::config_path;
pub use events::{ClientEvent, ClientSnapshot, ClientStatus, LedgerView, Notice, Prompt};

use crate::error::{AtmError, AtmResult};
use crate::history::TransactionRecord;
use crate::ledger::{
    bind, Amount, Confirmation, ContractHandle, Direction, LedgerOperations, LedgerState, WaitCancel,
};
use crate::provider::{Discovery, Provider, ProviderHost};
use crate::session::{self, Address, Session};
use alloy_primitives::U256;
use futures::channel::mpsc;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Default)]
struct ClientInner {
    discovery: Discovery,
    accounts_checked: bool,
    session: Session,
    handle: Option<ContractHandle>,
}

#[derive(Clone)]
pub struct Client {
    host: Arc<dyn ProviderHost>,
    config: Arc<ClientConfig>,
    inner: Arc<Mutex<ClientInner>>,
    ledger: Arc<LedgerOperations>,
    watchers: Arc<Mutex<Vec<mpsc::UnboundedSender<ClientEvent>>>>,
}

impl Client {
    pub fn new(host: impl ProviderHost + 'static, config: ClientConfig) -> Self {
        let ledger = LedgerOperations::new(config.policy, config.poll_settings());
        Self {
            host: Arc::new(host),
            config: Arc::new(config),
            inner: Arc::new(Mutex::new(ClientInner::default())),
            ledger: Arc::new(ledger),
            watchers: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn config(&self) -> &ClientConfig { &self.config }

    fn inner(&self) -> MutexGuard<'_, ClientInner> {
        self.inner.lock().unwrap_or_else(|p| p.into_inner())
    }

    // Observation

    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<ClientEvent> {
        let (tx, rx) = mpsc::unbounded();
        self.watchers.lock().unwrap_or_else(|p| p.into_inner()).push(tx);
        rx
    }

    fn emit(&self, event: ClientEvent) {
        let mut watchers = self.watchers.lock().unwrap_or_else(|p| p.into_inner());
        watchers.retain(|tx| tx.unbounded_send(event.clone()).is_ok());
    }

    fn state_changed(&self) {
        self.emit(ClientEvent::StateChanged { status: self.status() });
    }

    fn notify(&self, notice: Notice) {
        self.emit(ClientEvent::Notice { notice });
    }

    pub fn status(&self) -> ClientStatus {
        let inner = self.inner();
        match (&inner.discovery, inner.session.is_authorized(), &inner.handle) {
            (Discovery::Unchecked, _, _) => ClientStatus::Unchecked,
            (Discovery::Absent, _, _) => ClientStatus::NoProvider,
            (Discovery::Detected(_), false, _) if !inner.accounts_checked => ClientStatus::ProviderDetected,
            (Discovery::Detected(_), false, _) => ClientStatus::Unauthorized,
            (Discovery::Detected(_), true, None) => ClientStatus::Authorized,
            (Discovery::Detected(_), true, Some(_)) => {
                if self.ledger.state().in_flight() > 0 {
                    ClientStatus::OperationInFlight
                } else {
                    ClientStatus::Idle
                }
            }
        }
    }

    pub fn prompt(&self) -> Prompt { self.status().into() }

    pub fn session(&self) -> Session { self.inner().session.clone() }

    pub fn ledger_state(&self) -> LedgerState { self.ledger.state() }

    pub fn transactions(&self) -> Vec<TransactionRecord> { self.ledger.log().all().cloned().collect() }

    pub fn snapshot(&self) -> ClientSnapshot {
        let status = self.status();
        let (session, contract) = {
            let inner = self.inner();
            (inner.session.clone(), inner.handle.as_ref().map(|h| h.address().clone()))
        };
        ClientSnapshot {
            status,
            prompt: status.into(),
            session,
            contract,
            ledger: LedgerView::from(&self.ledger.state()),
            transactions: self.transactions(),
        }
    }

    // Connection

    fn provider(&self) -> Option<Provider> { self.inner().discovery.provider().cloned() }

    fn discover(&self) -> Option<Provider> {
        let discovery = Discovery::run(self.host.as_ref());
        let provider = discovery.provider().cloned();
        let mut inner = self.inner();
        inner.discovery = discovery;
        inner.accounts_checked = false;
        if provider.is_none() {
            inner.session.clear();
            inner.handle = None;
        }
        provider
    }

    /// Detect the provider and pick up an already authorized account without
    /// prompting.
    pub async fn load(&self) -> ClientStatus {
        if let Some(provider) = self.discover() {
            let accounts = session::read_authorized(Some(provider.as_ref())).await;
            self.inner().accounts_checked = true;
            match self.adopt(&provider, &accounts) {
                Ok(()) => self.initial_balance().await,
                Err(e) => tracing::warn!("could not bind existing account: {}", e),
            }
        }
        let status = self.status();
        tracing::info!(?status, "client loaded");
        self.state_changed();
        status
    }

    /// Ask the wallet for account access, then bind the ledger.
    pub async fn connect(&self) -> AtmResult<Session> {
        let result = self.try_connect().await;
        match &result {
            Ok(session) => {
                tracing::info!(account = ?session.account(), "account connected");
            }
            Err(e) => self.notify(Notice::failed("connect", e)),
        }
        self.state_changed();
        result
    }

    async fn try_connect(&self) -> AtmResult<Session> {
        let checked = self.inner().discovery.is_checked();
        let provider = if checked { self.provider() } else { self.discover() };
        let provider = provider.ok_or(AtmError::ProviderUnavailable)?;

        let accounts = session::request_authorization(Some(provider.as_ref())).await?;
        self.inner().accounts_checked = true;
        if accounts.is_empty() {
            tracing::info!("no account found");
            return Err(AtmError::Unauthorized);
        }
        self.adopt(&provider, &accounts)?;
        self.initial_balance().await;
        Ok(self.session())
    }

    /// Read the balance once after binding when none is known yet. A failed
    /// read is reported but does not undo the connection.
    async fn initial_balance(&self) {
        if self.ledger.state().balance().is_some() {
            return;
        }
        let Ok(handle) = self.handle() else { return };
        match self.ledger.query_balance(&handle).await {
            Ok(balance) => tracing::debug!(%balance, "initial balance"),
            Err(e) => {
                tracing::warn!("initial balance read failed: {}", e);
                self.notify(Notice::failed("balance", &e));
            }
        }
    }

    /// Authorize the first account and (re)bind the handle when the account
    /// changed or no handle exists yet.
    fn adopt(&self, provider: &Provider, accounts: &[Address]) -> AtmResult<()> {
        if accounts.is_empty() {
            return Ok(());
        }
        let mut inner = self.inner();
        let changed = inner.session.authorize(accounts);
        if changed {
            self.ledger.forget();
        }
        if changed || inner.handle.is_none() {
            inner.handle = Some(bind(&inner.session, provider, &self.config.ledger)?);
        }
        Ok(())
    }

    pub fn disconnect(&self) {
        {
            let mut inner = self.inner();
            inner.session.clear();
            inner.handle = None;
        }
        self.ledger.forget();
        tracing::info!("session cleared");
        self.state_changed();
    }

    /// Wallet reported a new account list (`accountsChanged`).
    pub fn accounts_changed(&self, accounts: &[Address]) -> AtmResult<()> {
        if accounts.is_empty() {
            self.disconnect();
            return Ok(());
        }
        let provider = self.provider().ok_or(AtmError::ProviderUnavailable)?;
        self.adopt(&provider, accounts)?;
        self.state_changed();
        Ok(())
    }

    /// Bound handle, usable only while the session is authorized.
    pub fn handle(&self) -> AtmResult<ContractHandle> {
        let inner = self.inner();
        if !inner.session.is_authorized() {
            return Err(AtmError::Unauthorized);
        }
        inner.handle.clone().ok_or(AtmError::NotBound)
    }

    // Ledger actions

    pub async fn query_balance(&self) -> AtmResult<U256> {
        let result = match self.handle() {
            Ok(handle) => self.ledger.query_balance(&handle).await,
            Err(e) => Err(e),
        };
        match &result {
            Ok(_) => self.state_changed(),
            Err(e) => self.notify(Notice::failed("balance", e)),
        }
        result
    }

    pub async fn deposit(&self, amount: U256) -> AtmResult<Confirmation> {
        self.operate(Direction::Deposit, amount, None).await
    }

    pub async fn withdraw(&self, amount: U256) -> AtmResult<Confirmation> {
        self.operate(Direction::Withdraw, amount, None).await
    }

    pub async fn deposit_with(&self, amount: U256, cancel: WaitCancel) -> AtmResult<Confirmation> {
        self.operate(Direction::Deposit, amount, Some(cancel)).await
    }

    pub async fn withdraw_with(&self, amount: U256, cancel: WaitCancel) -> AtmResult<Confirmation> {
        self.operate(Direction::Withdraw, amount, Some(cancel)).await
    }

    async fn operate(&self, direction: Direction, amount: U256, cancel: Option<WaitCancel>) -> AtmResult<Confirmation> {
        let action = match direction {
            Direction::Deposit => "deposit",
            Direction::Withdraw => "withdraw",
        };
        let result = match (Amount::new(amount), self.handle()) {
            (Err(e), _) | (_, Err(e)) => Err(e),
            (Ok(amount), Ok(handle)) => self.ledger.submit(&handle, direction, amount, cancel).await,
        };
        match &result {
            Ok(confirmation) => self.notify(Notice::Confirmed { confirmation: confirmation.clone() }),
            Err(e) => self.notify(Notice::failed(action, e)),
        }
        self.state_changed();
        result
    }
}
