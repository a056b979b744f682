//! Integration Tests: provider discovery, account session, contract binding
//!
//! These tests verify:
//! 1. No provider leads to the install prompt and no wallet traffic
//! 2. Connecting authorizes the first account and binds the ledger
//! 3. A dismissed prompt surfaces as UserRejected
//! 4. An account authorized in an earlier visit is picked up without prompting
//! 5. Account changes rebind and drop the trusted balance
//! 6. Binding reads the balance once; a failed read does not undo the connection

#![cfg(feature = "native")]

use beeatm::ledger::DEFAULT_LEDGER_ADDRESS;
use beeatm::provider::methods;
use beeatm::{
    Address, AtmError, Client, ClientConfig, ClientEvent, ClientStatus, FixedHost, NoProvider, Notice, Prompt,
    SimWallet, U256,
};
use std::sync::Arc;

fn addr(s: &str) -> Address {
    Address::parse(s).expect("address")
}

fn client_for(wallet: &Arc<SimWallet>) -> Client {
    Client::new(FixedHost::new(wallet.clone()), ClientConfig::new().with_poll_interval_ms(5))
}

fn drain(rx: &mut futures::channel::mpsc::UnboundedReceiver<ClientEvent>) -> Vec<ClientEvent> {
    let mut events = Vec::new();
    while let Ok(Some(event)) = rx.try_next() {
        events.push(event);
    }
    events
}

/// Test: no wallet installed
#[tokio::test]
async fn missing_provider_prompts_install() {
    let client = Client::new(NoProvider, ClientConfig::default());
    assert_eq!(client.status(), ClientStatus::Unchecked);

    assert_eq!(client.load().await, ClientStatus::NoProvider);
    assert_eq!(client.prompt(), Prompt::InstallWallet);

    assert_eq!(client.connect().await, Err(AtmError::ProviderUnavailable));
    assert_eq!(client.deposit(U256::from(1)).await.unwrap_err(), AtmError::Unauthorized);
    assert!(!client.session().is_authorized());
    assert!(client.transactions().is_empty());
}

/// Test: wallet returns ["0xABC"], session and handle follow
#[tokio::test]
async fn connect_binds_first_account() {
    let wallet = Arc::new(SimWallet::new(addr("0xABC")));
    let client = client_for(&wallet);

    assert_eq!(client.load().await, ClientStatus::Unauthorized);
    assert_eq!(client.prompt(), Prompt::Connect);
    assert_eq!(wallet.calls(methods::REQUEST_ACCOUNTS), 0);

    let session = client.connect().await.unwrap();
    assert_eq!(session.account().map(Address::as_str), Some("0xABC"));
    assert!(session.is_authorized());
    assert_eq!(wallet.calls(methods::REQUEST_ACCOUNTS), 1);

    assert_eq!(client.status(), ClientStatus::Idle);
    assert_eq!(client.prompt(), Prompt::Ready);

    let handle = client.handle().unwrap();
    assert_eq!(handle.address().as_str(), DEFAULT_LEDGER_ADDRESS);
    assert_eq!(handle.signer(), &addr("0xabc"));
    assert_eq!(client.ledger_state().balance(), Some(U256::ZERO));
}

/// Test: connecting fills in the balance without a separate query
#[tokio::test]
async fn connect_reads_initial_balance() {
    let wallet = Arc::new(SimWallet::new(addr("0x00000000000000000000000000000000000000a1")).with_balance(U256::from(9)));
    let client = client_for(&wallet);
    assert_eq!(client.ledger_state().balance(), None);

    client.connect().await.unwrap();
    assert_eq!(client.ledger_state().balance(), Some(U256::from(9)));
    assert_eq!(wallet.calls(methods::CALL), 1);

    // Already known: reconnecting does not read again.
    client.connect().await.unwrap();
    assert_eq!(wallet.calls(methods::CALL), 1);
}

/// Test: balance read fails (nothing deployed at the ledger address)
#[tokio::test]
async fn failed_initial_read_keeps_connection() {
    let elsewhere = addr("0x00000000000000000000000000000000000000c3");
    let wallet = Arc::new(SimWallet::new(addr("0x00000000000000000000000000000000000000a1")).with_contract(elsewhere));
    let client = client_for(&wallet);
    let mut rx = client.subscribe();

    let session = client.connect().await.unwrap();
    assert!(session.is_authorized());
    assert_eq!(client.status(), ClientStatus::Idle);
    assert_eq!(client.ledger_state().balance(), None);

    let events = drain(&mut rx);
    assert!(events.iter().any(|e| matches!(
        e,
        ClientEvent::Notice { notice: Notice::Failed { action, kind, .. } } if action == "balance" && kind == "abi"
    )));
}

/// Test: connect without an earlier load still discovers the provider
#[tokio::test]
async fn connect_runs_discovery_when_unchecked() {
    let wallet = Arc::new(SimWallet::new(addr("0x00000000000000000000000000000000000000a1")));
    let client = client_for(&wallet);

    client.connect().await.unwrap();
    assert_eq!(client.status(), ClientStatus::Idle);
}

/// Test: user dismisses the account prompt
#[tokio::test]
async fn dismissed_prompt_is_user_rejected() {
    let wallet = Arc::new(SimWallet::new(addr("0x00000000000000000000000000000000000000a1")));
    wallet.set_reject_connect(true);
    let client = client_for(&wallet);
    client.load().await;
    let mut rx = client.subscribe();

    assert_eq!(client.connect().await, Err(AtmError::UserRejected));
    assert_eq!(client.status(), ClientStatus::Unauthorized);
    assert!(client.handle().is_err());

    let events = drain(&mut rx);
    assert!(events.iter().any(|e| matches!(
        e,
        ClientEvent::Notice { notice: Notice::Failed { action, kind, .. } } if action == "connect" && kind == "user_rejected"
    )));

    // A second attempt after the user changes their mind succeeds.
    wallet.set_reject_connect(false);
    client.connect().await.unwrap();
    assert_eq!(client.status(), ClientStatus::Idle);
}

/// Test: wallet with no accounts to offer
#[tokio::test]
async fn empty_account_list_is_unauthorized() {
    let wallet = Arc::new(SimWallet::new(addr("0x00000000000000000000000000000000000000a1")).with_accounts(vec![]));
    let client = client_for(&wallet);

    assert_eq!(client.connect().await, Err(AtmError::Unauthorized));
    assert_eq!(client.status(), ClientStatus::Unauthorized);
}

/// Test: site authorized in an earlier visit
#[tokio::test]
async fn load_picks_up_existing_authorization() {
    let owner = addr("0x00000000000000000000000000000000000000a1");
    let wallet = Arc::new(SimWallet::new(owner.clone()).connected());
    let client = client_for(&wallet);

    assert_eq!(client.load().await, ClientStatus::Idle);
    assert_eq!(client.session().account(), Some(&owner));
    assert_eq!(wallet.calls(methods::REQUEST_ACCOUNTS), 0);
    assert_eq!(wallet.calls(methods::ACCOUNTS), 1);
    assert_eq!(client.ledger_state().balance(), Some(U256::ZERO));
}

/// Test: accountsChanged rebinds, an empty list disconnects
#[tokio::test]
async fn account_change_rebinds_and_forgets_balance() {
    let first = addr("0x00000000000000000000000000000000000000a1");
    let second = addr("0x00000000000000000000000000000000000000b2");
    let wallet = Arc::new(
        SimWallet::new(first.clone())
            .with_accounts(vec![first.clone(), second.clone()])
            .with_balance(U256::from(7))
            .connected(),
    );
    let client = client_for(&wallet);
    client.load().await;
    assert_eq!(client.ledger_state().balance(), Some(U256::from(7)));
    assert_eq!(client.query_balance().await, Ok(U256::from(7)));

    client.accounts_changed(&[second.clone()]).unwrap();
    assert_eq!(client.session().account(), Some(&second));
    assert_eq!(client.handle().unwrap().signer(), &second);
    assert_eq!(client.ledger_state().balance(), None);

    // Same account again: nothing to forget.
    client.query_balance().await.unwrap();
    client.accounts_changed(&[second.clone(), first]).unwrap();
    assert_eq!(client.ledger_state().balance(), Some(U256::from(7)));

    client.accounts_changed(&[]).unwrap();
    assert_eq!(client.status(), ClientStatus::Unauthorized);
    assert_eq!(client.handle().unwrap_err(), AtmError::Unauthorized);
}

/// Test: disconnect clears the session but keeps the history
#[tokio::test]
async fn disconnect_keeps_history() {
    let wallet = Arc::new(SimWallet::new(addr("0x00000000000000000000000000000000000000a1")));
    let client = client_for(&wallet);
    client.connect().await.unwrap();
    client.deposit(U256::from(2)).await.unwrap();

    client.disconnect();
    assert!(!client.session().is_authorized());
    assert_eq!(client.prompt(), Prompt::Connect);
    assert_eq!(client.transactions().len(), 1);
    assert_eq!(client.withdraw(U256::from(1)).await.unwrap_err(), AtmError::Unauthorized);
}
