//! Escrow protocol engine
//!
//! Creates, redeems and reclaims escrows through a [`LedgerClient`]. The
//! engine keeps no lock of its own: when two redeemers race on one link, the
//! ledger orders them and the loser sees `InvalidOrExpiredLink`.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use wallet::{Address, KeyPair, WalletError};
use zeroize::Zeroizing;

use crate::asset::{AssetClass, AssetRegistry, TokenInfo};
use crate::commitment::{derive_escrow_address, generate_secret, EscrowSecret};
use crate::config::EscrowConfig;
use crate::error::{EscrowError, LedgerError, RejectReason};
use crate::ledger::{EscrowAccount, LedgerClient, TransactionStatus};
use crate::link::RedeemLink;
use crate::pending::{PendingSend, PendingSends, SubmissionState};
use crate::transaction::{Instruction, Transaction, TransactionId};

/// Result of [`EscrowEngine::send`]
#[derive(Debug)]
pub struct CreatedEscrow {
    pub transaction_id: TransactionId,
    pub escrow_address: Address,
    pub expires_at: DateTime<Utc>,
    pub link: RedeemLink,
    /// Shareable URL; bearer material, do not log
    pub url: Zeroizing<String>,
}

pub struct EscrowEngine {
    ledger: Arc<dyn LedgerClient>,
    config: EscrowConfig,
    registry: AssetRegistry,
    pending: Option<PendingSends>,
}

impl EscrowEngine {
    pub fn new(ledger: Arc<dyn LedgerClient>, config: EscrowConfig) -> Self {
        Self {
            ledger,
            config,
            registry: AssetRegistry::default(),
            pending: None,
        }
    }

    pub fn with_registry(mut self, registry: AssetRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Keep a record of every link `send` hands out
    pub fn with_pending(mut self, pending: PendingSends) -> Self {
        self.pending = Some(pending);
        self
    }

    pub fn config(&self) -> &EscrowConfig {
        &self.config
    }

    pub fn registry(&self) -> &AssetRegistry {
        &self.registry
    }

    pub fn pending(&self) -> Option<&PendingSends> {
        self.pending.as_ref()
    }

    /// Where `(sender, secret, asset)` escrows live
    pub fn escrow_address(&self, sender: &Address, secret: &EscrowSecret, asset: &AssetClass) -> Address {
        derive_escrow_address(&self.config.program_id, sender, &secret.commitment(), asset)
    }

    /// Lock `amount` of `asset` under `secret` until `expires_at`.
    ///
    /// The balance check reads possibly stale state; the ledger re-checks
    /// atomically and its refusal is reported the same way.
    pub async fn create_escrow(
        &self,
        signer: &KeyPair,
        asset: &AssetClass,
        amount: u64,
        expires_at: DateTime<Utc>,
        secret: &EscrowSecret,
    ) -> Result<TransactionId, EscrowError> {
        if amount == 0 {
            return Err(EscrowError::InvalidAmount("amount must be positive".to_string()));
        }

        let now = self.ledger.current_time().await.map_err(EscrowError::Ledger)?;
        if expires_at <= now {
            return Err(EscrowError::InvalidExpiry);
        }

        let sender = signer.public_key();
        self.check_funds(&sender, asset, amount).await?;

        let commitment = secret.commitment();
        let escrow = derive_escrow_address(&self.config.program_id, &sender, &commitment, asset);
        let instruction = Instruction::Initialize {
            escrow,
            asset: *asset,
            amount,
            expires_at,
            commitment,
        };

        log::info!(
            "Creating escrow {} from {}: {} of {}, expires {}",
            escrow,
            sender,
            amount,
            asset,
            expires_at
        );

        self.submit(signer, instruction).await.map_err(|err| match err {
            Submission::Rejected(RejectReason::InsufficientFunds { required, available }) => {
                EscrowError::InsufficientFunds { required, available }
            }
            Submission::Rejected(RejectReason::InvalidExpiry) => EscrowError::InvalidExpiry,
            Submission::Rejected(RejectReason::InvalidAmount) => {
                EscrowError::InvalidAmount("rejected by ledger".to_string())
            }
            other => other.into_error(),
        })
    }

    /// Pure encoding; no network access
    pub fn build_redeem_link(
        &self,
        sender: &Address,
        secret: &EscrowSecret,
        asset_symbol: &str,
    ) -> Result<(RedeemLink, Zeroizing<String>), EscrowError> {
        let link = RedeemLink::new(secret.clone(), *sender, asset_symbol)?;
        let url = link.encode(&self.config.link_prefix)?;
        Ok((link, url))
    }

    /// Claim the escrow `(sender, secret, asset)` for the signer.
    ///
    /// Not-found, consumed, expired and wrong-secret all surface as the same
    /// `InvalidOrExpiredLink`.
    pub async fn redeem_escrow(
        &self,
        signer: &KeyPair,
        asset: &AssetClass,
        sender: &Address,
        secret: &EscrowSecret,
    ) -> Result<TransactionId, EscrowError> {
        let escrow = self.escrow_address(sender, secret, asset);

        let account = self
            .ledger
            .get_escrow(&escrow)
            .await
            .map_err(EscrowError::Ledger)?;
        let now = self.ledger.current_time().await.map_err(EscrowError::Ledger)?;
        match account {
            Some(account) if account.is_redeemable(now) => {}
            _ => {
                log::debug!("Escrow {} is not redeemable", escrow);
                return Err(EscrowError::InvalidOrExpiredLink);
            }
        }

        let redeemer = signer.public_key();
        let fee_balance = self
            .ledger
            .get_balance(&redeemer, &AssetClass::Native)
            .await
            .map_err(EscrowError::Ledger)?;
        if fee_balance < self.config.ledger_fee {
            return Err(EscrowError::InsufficientFunds {
                required: self.config.ledger_fee,
                available: fee_balance,
            });
        }

        log::info!("Redeeming escrow {} for {}", escrow, redeemer);
        let instruction = Instruction::Redeem {
            escrow,
            sender: *sender,
            asset: *asset,
            secret: secret.clone(),
        };

        self.submit(signer, instruction).await.map_err(|err| match err {
            Submission::Rejected(
                RejectReason::EscrowNotFound
                | RejectReason::AlreadyConsumed
                | RejectReason::CommitmentMismatch
                | RejectReason::AddressMismatch
                | RejectReason::Expired,
            ) => EscrowError::InvalidOrExpiredLink,
            Submission::Rejected(RejectReason::InsufficientFunds { required, available }) => {
                EscrowError::InsufficientFunds { required, available }
            }
            other => other.into_error(),
        })
    }

    /// Return an expired, unconsumed escrow to its sender
    pub async fn reclaim_expired(
        &self,
        signer: &KeyPair,
        escrow_address: &Address,
    ) -> Result<TransactionId, EscrowError> {
        let now = self.ledger.current_time().await.map_err(EscrowError::Ledger)?;
        let found = self
            .ledger
            .get_escrow(escrow_address)
            .await
            .map_err(EscrowError::Ledger)?;
        let account: EscrowAccount = match found {
            Some(account) if !account.is_consumed() => account,
            found => {
                // Redeemed or reclaimed already, or never landed
                let consumed = found.is_some();
                self.forget_pending(escrow_address, |entry| consumed || entry.is_expired(now));
                return Err(EscrowError::EscrowNotFound(*escrow_address));
            }
        };

        if account.sender != signer.public_key() {
            return Err(EscrowError::NotEscrowSender);
        }
        if !account.is_expired(now) {
            return Err(EscrowError::NotYetExpired(account.expires_at));
        }

        log::info!("Reclaiming escrow {} ({} of {})", escrow_address, account.amount, account.asset);
        let instruction = Instruction::Reclaim {
            escrow: *escrow_address,
        };

        let tx_id = self.submit(signer, instruction).await.map_err(|err| match err {
            Submission::Rejected(RejectReason::EscrowNotFound | RejectReason::AlreadyConsumed) => {
                EscrowError::EscrowNotFound(*escrow_address)
            }
            Submission::Rejected(RejectReason::NotSender) => EscrowError::NotEscrowSender,
            Submission::Rejected(RejectReason::NotYetExpired) => {
                EscrowError::NotYetExpired(account.expires_at)
            }
            Submission::Rejected(RejectReason::InsufficientFunds { required, available }) => {
                EscrowError::InsufficientFunds { required, available }
            }
            other => other.into_error(),
        })?;

        self.forget_pending(escrow_address, |_| true);
        Ok(tx_id)
    }

    /// Drop pending entries whose links can no longer pay out: the escrow was
    /// redeemed or reclaimed, or the create never landed and its expiry has
    /// passed. Returns how many entries were removed.
    pub async fn prune_pending(&self) -> Result<usize, EscrowError> {
        let pending = match &self.pending {
            Some(pending) => pending,
            None => return Ok(0),
        };
        let now = self.ledger.current_time().await.map_err(EscrowError::Ledger)?;

        let mut removed = 0;
        for entry in pending.list().map_err(WalletError::from)? {
            let settled = match self
                .ledger
                .get_escrow(&entry.escrow_address)
                .await
                .map_err(EscrowError::Ledger)?
            {
                Some(account) => account.is_consumed(),
                None => entry.is_expired(now),
            };
            if settled && pending.remove(&entry.transaction_id).map_err(WalletError::from)? {
                log::debug!("Pruned pending send {}", entry.transaction_id);
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Remove pending entries for `escrow_address` that match `settled`.
    /// Storage failures are logged; the ledger outcome stands regardless.
    fn forget_pending(&self, escrow_address: &Address, settled: impl Fn(&PendingSend) -> bool) {
        let pending = match &self.pending {
            Some(pending) => pending,
            None => return,
        };
        if let Err(e) = pending.remove_by_escrow(escrow_address, settled) {
            log::warn!("Could not clear pending entry for {}: {}", escrow_address, e);
        }
    }

    /// Generate a secret, lock `amount` of `token_symbol` for the configured
    /// TTL, and return the shareable link.
    ///
    /// On `SubmissionStatusUnknown` the link is still recorded as pending so
    /// the escrow stays recoverable if the create did land.
    pub async fn send(
        &self,
        signer: &KeyPair,
        token_symbol: &str,
        amount: u64,
    ) -> Result<CreatedEscrow, EscrowError> {
        let token: TokenInfo = self.registry.by_symbol(token_symbol)?.clone();
        let secret = generate_secret()?;
        let sender = signer.public_key();

        let now = self.ledger.current_time().await.map_err(EscrowError::Ledger)?;
        let expires_at = now + self.config.escrow_ttl;
        let escrow_address = self.escrow_address(&sender, &secret, &token.asset_class);
        let (link, url) = self.build_redeem_link(&sender, &secret, &token.symbol)?;

        let outcome = self
            .create_escrow(signer, &token.asset_class, amount, expires_at, &secret)
            .await;

        let (transaction_id, state) = match outcome {
            Ok(id) => (id, SubmissionState::Accepted),
            Err(EscrowError::SubmissionStatusUnknown { tx_id }) => (tx_id, SubmissionState::Unknown),
            Err(e) => return Err(e),
        };

        if let Some(pending) = &self.pending {
            let entry = PendingSend {
                transaction_id: transaction_id.clone(),
                escrow_address,
                link: url.to_string(),
                asset_symbol: token.symbol.clone(),
                amount,
                expires_at,
                created_at: now,
                state: state.clone(),
            };
            if let Err(e) = pending.record(&entry) {
                log::warn!("Could not record pending send {}: {}", transaction_id, e);
            }
        }

        if state == SubmissionState::Unknown {
            return Err(EscrowError::SubmissionStatusUnknown {
                tx_id: transaction_id,
            });
        }
        log::info!(
            "Sent {} {} into escrow {} ({})",
            crate::asset::format_amount(amount, token.decimals),
            token.symbol,
            escrow_address,
            transaction_id
        );

        Ok(CreatedEscrow {
            transaction_id,
            escrow_address,
            expires_at,
            link,
            url,
        })
    }

    /// Parse a shared link and redeem it for the signer.
    ///
    /// A malformed link or unknown symbol fails before any ledger call.
    pub async fn receive(&self, signer: &KeyPair, link: &str) -> Result<TransactionId, EscrowError> {
        let link = RedeemLink::parse(link)?;
        let asset = self.registry.by_symbol(link.asset_symbol())?.asset_class;
        self.redeem_escrow(signer, &asset, &link.sender(), link.secret())
            .await
    }

    /// Resolve a `SubmissionStatusUnknown` without resubmitting
    pub async fn transaction_status(&self, id: &TransactionId) -> Result<TransactionStatus, EscrowError> {
        self.ledger
            .get_transaction_status(id)
            .await
            .map_err(EscrowError::Ledger)
    }

    pub async fn balance(&self, address: &Address, asset: &AssetClass) -> Result<u64, EscrowError> {
        self.ledger
            .get_balance(address, asset)
            .await
            .map_err(EscrowError::Ledger)
    }

    async fn check_funds(&self, sender: &Address, asset: &AssetClass, amount: u64) -> Result<(), EscrowError> {
        let fee = self.config.ledger_fee;
        let native = self
            .ledger
            .get_balance(sender, &AssetClass::Native)
            .await
            .map_err(EscrowError::Ledger)?;

        if asset.is_native() {
            let required = amount
                .checked_add(fee)
                .ok_or_else(|| EscrowError::InvalidAmount(amount.to_string()))?;
            if native < required {
                return Err(EscrowError::InsufficientFunds {
                    required,
                    available: native,
                });
            }
            return Ok(());
        }

        if native < fee {
            return Err(EscrowError::InsufficientFunds {
                required: fee,
                available: native,
            });
        }
        let token = self
            .ledger
            .get_balance(sender, asset)
            .await
            .map_err(EscrowError::Ledger)?;
        if token < amount {
            return Err(EscrowError::InsufficientFunds {
                required: amount,
                available: token,
            });
        }
        Ok(())
    }

    async fn submit(&self, signer: &KeyPair, instruction: Instruction) -> Result<TransactionId, Submission> {
        let signed = Transaction::new(signer.public_key(), self.config.program_id, instruction)
            .and_then(|tx| tx.sign(signer))
            .map_err(Submission::Local)?;
        let tx_id = signed.id();
        let bytes = signed.to_bytes().map_err(Submission::Local)?;

        match self.ledger.submit_transaction(&bytes).await {
            Ok(id) => {
                log::info!("Ledger accepted {}", id);
                Ok(id)
            }
            Err(LedgerError::Rejected(reason)) => {
                log::warn!("Ledger rejected {}: {}", tx_id, reason);
                Err(Submission::Rejected(reason))
            }
            Err(LedgerError::Unavailable(msg)) => {
                log::warn!("Ledger unavailable, {} not delivered: {}", tx_id, msg);
                Err(Submission::Undelivered(msg))
            }
            Err(LedgerError::Timeout(msg)) | Err(LedgerError::InvalidResponse(msg)) => {
                log::error!("Outcome of {} unknown: {}", tx_id, msg);
                Err(Submission::Unknown(tx_id))
            }
        }
    }
}

/// How a submission ended when it did not succeed
enum Submission {
    Local(EscrowError),
    Rejected(RejectReason),
    Undelivered(String),
    Unknown(TransactionId),
}

impl Submission {
    fn into_error(self) -> EscrowError {
        match self {
            Self::Local(err) => err,
            Self::Rejected(reason) => EscrowError::LedgerSubmission(reason.to_string()),
            Self::Undelivered(msg) => EscrowError::LedgerSubmission(msg),
            Self::Unknown(tx_id) => EscrowError::SubmissionStatusUnknown { tx_id },
        }
    }
}
