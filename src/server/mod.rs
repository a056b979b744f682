//! HTTP surface - the native UI boundary
//!
//! | Route | Method | Description |
//! |-------|--------|-------------|
//! | `/health` | GET | `{status, service}` |
//! | `/state` | GET | Client snapshot (status, prompt, session, ledger, transactions) |
//! | `/transactions` | GET | Records plus display lines |
//! | `/connect` | POST | Request wallet authorization and bind the ledger |
//! | `/disconnect` | POST | Clear the session |
//! | `/balance` | POST | Query the ledger balance |
//! | `/deposit` | POST | `{amount}` (default 1), waits for confirmation |
//! | `/withdraw` | POST | `{amount}` (default 1), waits for confirmation |

mod routes;

pub use routes::{create_router, create_router_with_name, status_for, AtmState};
