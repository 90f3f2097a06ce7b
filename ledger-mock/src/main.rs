/// Ledger Mock Server
///
/// A devnet ledger running the escrow program in memory, served over HTTP.
/// State is lost on restart.
use anyhow::{Context, Result};
use std::env;
use std::sync::Arc;

use instant_send::commitment::default_program_id;
use instant_send::InMemoryLedger;
use ledger_mock::run_server;
use wallet::Address;

const DEFAULT_FEE: u64 = 5_000;

#[derive(Debug)]
struct Config {
    // Ledger
    fee: u64,
    program_id: Address,

    // Server
    server_host: String,
    server_port: u16,
}

impl Config {
    fn from_env() -> Result<Self> {
        dotenv::dotenv().ok(); // Load .env file if present

        let fee = match env::var("LEDGER_FEE") {
            Ok(raw) => raw.parse().context("Invalid LEDGER_FEE")?,
            Err(_) => DEFAULT_FEE,
        };

        let program_id = match env::var("ESCROW_PROGRAM_ID") {
            Ok(raw) => raw
                .trim()
                .parse()
                .map_err(|e| anyhow::anyhow!("Invalid ESCROW_PROGRAM_ID: {}", e))?,
            Err(_) => default_program_id(),
        };

        let server_host = env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());

        let server_port = env::var("SERVER_PORT")
            .unwrap_or_else(|_| "3030".to_string())
            .parse()
            .context("Invalid SERVER_PORT")?;

        Ok(Self {
            fee,
            program_id,
            server_host,
            server_port,
        })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    log::info!("Starting ledger mock...");

    let config = Config::from_env().context("Failed to load configuration")?;
    log::info!("Server will listen on {}:{}", config.server_host, config.server_port);

    let ledger = Arc::new(InMemoryLedger::new(config.fee, config.program_id));

    run_server(ledger, config.server_host, config.server_port)
        .await
        .context("Server error")?;

    Ok(())
}
