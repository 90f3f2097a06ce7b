/// Ledger Mock Server Library
///
/// Serves an in-process devnet ledger running the escrow program over the
/// JSON HTTP API that `HttpLedgerClient` speaks.

pub mod handlers;
pub mod server;

pub use handlers::{ApiError, AppState};
pub use server::{create_router, run_server};
