use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use wallet::{Address, Clock, SystemClock};

use super::{EscrowAccount, LedgerClient, TransactionStatus};
use crate::asset::AssetClass;
use crate::commitment::derive_escrow_address;
use crate::error::{LedgerError, RejectReason};
use crate::transaction::{Instruction, SignedTransaction, TransactionId};

/// Failure injected into the next `submit_transaction`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// Refuse before the ledger sees the transaction
    Unavailable,
    /// Drop the request on the way in
    TimeoutBeforeCommit,
    /// Apply the transaction, then lose the answer
    TimeoutAfterCommit,
}

struct LedgerState {
    balances: HashMap<(Address, AssetClass), u64>,
    escrows: HashMap<Address, EscrowAccount>,
    transactions: HashMap<TransactionId, TransactionStatus>,
    faults: VecDeque<Fault>,
    time_offset: Duration,
    slot: u64,
}

impl LedgerState {
    fn new() -> Self {
        Self {
            balances: HashMap::new(),
            escrows: HashMap::new(),
            transactions: HashMap::new(),
            faults: VecDeque::new(),
            time_offset: Duration::zero(),
            slot: 0,
        }
    }

    fn balance(&self, address: &Address, asset: &AssetClass) -> u64 {
        self.balances.get(&(*address, *asset)).copied().unwrap_or(0)
    }

    fn debit(&mut self, address: &Address, asset: &AssetClass, amount: u64) -> Result<(), RejectReason> {
        let available = self.balance(address, asset);
        let remaining = available
            .checked_sub(amount)
            .ok_or(RejectReason::InsufficientFunds {
                required: amount,
                available,
            })?;
        self.balances.insert((*address, *asset), remaining);
        Ok(())
    }

    fn credit(&mut self, address: &Address, asset: &AssetClass, amount: u64) -> Result<(), RejectReason> {
        let entry = self.balances.entry((*address, *asset)).or_insert(0);
        *entry = entry.checked_add(amount).ok_or(RejectReason::InvalidAmount)?;
        Ok(())
    }
}

/// Process-local devnet running the escrow program.
///
/// Every transaction is checked and applied under one lock, so concurrent
/// redeems of the same escrow are ordered and exactly one wins. Fees are paid
/// in the native asset and burned.
pub struct InMemoryLedger {
    state: Mutex<LedgerState>,
    clock: Arc<dyn Clock>,
    fee: u64,
    program_id: Address,
}

impl InMemoryLedger {
    pub fn new(fee: u64, program_id: Address) -> Self {
        Self::with_clock(fee, program_id, Arc::new(SystemClock))
    }

    pub fn with_clock(fee: u64, program_id: Address, clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Mutex::new(LedgerState::new()),
            clock,
            fee,
            program_id,
        }
    }

    pub fn fee(&self) -> u64 {
        self.fee
    }

    pub fn program_id(&self) -> Address {
        self.program_id
    }

    fn lock(&self) -> Result<MutexGuard<'_, LedgerState>, LedgerError> {
        self.state
            .lock()
            .map_err(|_| LedgerError::Unavailable("ledger state poisoned".to_string()))
    }

    fn now(&self, state: &LedgerState) -> DateTime<Utc> {
        self.clock.now() + state.time_offset
    }

    /// Devnet faucet; returns the new balance
    pub fn airdrop(&self, address: &Address, asset: &AssetClass, amount: u64) -> Result<u64, LedgerError> {
        let mut state = self.lock()?;
        state.credit(address, asset, amount).map_err(LedgerError::Rejected)?;
        log::info!("Airdropped {} {} to {}", amount, asset, address);
        Ok(state.balance(address, asset))
    }

    /// Move ledger time forward (or back, for a negative duration)
    pub fn advance_time(&self, by: Duration) -> Result<DateTime<Utc>, LedgerError> {
        let mut state = self.lock()?;
        state.time_offset += by;
        let now = self.now(&state);
        log::debug!("Ledger time advanced by {}s to {}", by.num_seconds(), now);
        Ok(now)
    }

    pub fn inject_fault(&self, fault: Fault) -> Result<(), LedgerError> {
        self.lock()?.faults.push_back(fault);
        Ok(())
    }

    /// Decode, check and apply one transaction
    pub fn process(&self, signed_bytes: &[u8]) -> Result<TransactionId, LedgerError> {
        let signed = SignedTransaction::from_bytes(signed_bytes).map_err(LedgerError::Rejected)?;
        let id = signed.id();

        let mut state = self.lock()?;
        // checks run before any write, the snapshot only guards arithmetic overflow
        let snapshot = (state.balances.clone(), state.escrows.clone());
        match self.execute(&mut state, &signed) {
            Ok(()) => {
                state.slot += 1;
                let slot = state.slot;
                state
                    .transactions
                    .insert(id.clone(), TransactionStatus::Committed { slot });
                log::info!(
                    "Committed {} on {} at slot {}: {}",
                    signed.transaction.instruction.name(),
                    signed.transaction.instruction.escrow(),
                    slot,
                    id
                );
                Ok(id)
            }
            Err(reason) => {
                state.balances = snapshot.0;
                state.escrows = snapshot.1;
                log::debug!("Rejected {}: {}", id, reason);
                if reason != RejectReason::Duplicate {
                    state.transactions.insert(
                        id,
                        TransactionStatus::Rejected {
                            reason: reason.clone(),
                        },
                    );
                }
                Err(LedgerError::Rejected(reason))
            }
        }
    }

    fn execute(&self, state: &mut LedgerState, signed: &SignedTransaction) -> Result<(), RejectReason> {
        if !signed.verify() {
            return Err(RejectReason::InvalidSignature);
        }
        let tx = &signed.transaction;
        if tx.program_id != self.program_id {
            return Err(RejectReason::WrongProgram);
        }
        if matches!(
            state.transactions.get(&signed.id()),
            Some(TransactionStatus::Committed { .. })
        ) {
            return Err(RejectReason::Duplicate);
        }

        let now = self.now(state);
        let payer = tx.payer;
        let fee_available = state.balance(&payer, &AssetClass::Native);
        if fee_available < self.fee {
            return Err(RejectReason::InsufficientFunds {
                required: self.fee,
                available: fee_available,
            });
        }

        match &tx.instruction {
            Instruction::Initialize {
                escrow,
                asset,
                amount,
                expires_at,
                commitment,
            } => {
                if *amount == 0 {
                    return Err(RejectReason::InvalidAmount);
                }
                if *expires_at <= now {
                    return Err(RejectReason::InvalidExpiry);
                }
                if *escrow != derive_escrow_address(&self.program_id, &payer, commitment, asset) {
                    return Err(RejectReason::AddressMismatch);
                }
                if state.escrows.contains_key(escrow) {
                    return Err(RejectReason::EscrowExists);
                }

                let required = if asset.is_native() {
                    amount.checked_add(self.fee).ok_or(RejectReason::InvalidAmount)?
                } else {
                    *amount
                };
                let available = state.balance(&payer, asset);
                if available < required {
                    return Err(RejectReason::InsufficientFunds { required, available });
                }

                state.debit(&payer, &AssetClass::Native, self.fee)?;
                state.debit(&payer, asset, *amount)?;
                state.credit(escrow, asset, *amount)?;
                state.escrows.insert(
                    *escrow,
                    EscrowAccount {
                        address: *escrow,
                        sender: payer,
                        asset: *asset,
                        amount: *amount,
                        commitment: *commitment,
                        expires_at: *expires_at,
                        redeemed: false,
                        reclaimed: false,
                    },
                );
            }
            Instruction::Redeem {
                escrow,
                sender,
                asset,
                secret,
            } => {
                let commitment = secret.commitment();
                if *escrow != derive_escrow_address(&self.program_id, sender, &commitment, asset) {
                    return Err(RejectReason::CommitmentMismatch);
                }
                let account = state
                    .escrows
                    .get(escrow)
                    .cloned()
                    .ok_or(RejectReason::EscrowNotFound)?;
                if account.commitment != commitment {
                    return Err(RejectReason::CommitmentMismatch);
                }
                if account.is_consumed() {
                    return Err(RejectReason::AlreadyConsumed);
                }
                if account.is_expired(now) {
                    return Err(RejectReason::Expired);
                }

                state.debit(&payer, &AssetClass::Native, self.fee)?;
                state.debit(escrow, &account.asset, account.amount)?;
                state.credit(&payer, &account.asset, account.amount)?;
                if let Some(record) = state.escrows.get_mut(escrow) {
                    record.redeemed = true;
                }
            }
            Instruction::Reclaim { escrow } => {
                let account = state
                    .escrows
                    .get(escrow)
                    .cloned()
                    .ok_or(RejectReason::EscrowNotFound)?;
                if account.is_consumed() {
                    return Err(RejectReason::AlreadyConsumed);
                }
                if account.sender != payer {
                    return Err(RejectReason::NotSender);
                }
                if !account.is_expired(now) {
                    return Err(RejectReason::NotYetExpired);
                }

                state.debit(&payer, &AssetClass::Native, self.fee)?;
                state.debit(escrow, &account.asset, account.amount)?;
                state.credit(&account.sender, &account.asset, account.amount)?;
                if let Some(record) = state.escrows.get_mut(escrow) {
                    record.reclaimed = true;
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
impl LedgerClient for InMemoryLedger {
    async fn get_balance(&self, address: &Address, asset: &AssetClass) -> Result<u64, LedgerError> {
        Ok(self.lock()?.balance(address, asset))
    }

    async fn get_escrow(&self, address: &Address) -> Result<Option<EscrowAccount>, LedgerError> {
        Ok(self.lock()?.escrows.get(address).cloned())
    }

    async fn submit_transaction(&self, signed_bytes: &[u8]) -> Result<TransactionId, LedgerError> {
        let fault = self.lock()?.faults.pop_front();
        match fault {
            Some(Fault::Unavailable) => Err(LedgerError::Unavailable("injected".to_string())),
            Some(Fault::TimeoutBeforeCommit) => Err(LedgerError::Timeout("injected".to_string())),
            Some(Fault::TimeoutAfterCommit) => {
                // outcome is recorded, the caller just never hears about it
                let _ = self.process(signed_bytes);
                Err(LedgerError::Timeout("injected".to_string()))
            }
            None => self.process(signed_bytes),
        }
    }

    async fn get_transaction_status(
        &self,
        id: &TransactionId,
    ) -> Result<TransactionStatus, LedgerError> {
        Ok(self
            .lock()?
            .transactions
            .get(id)
            .cloned()
            .unwrap_or(TransactionStatus::NotFound))
    }

    async fn current_time(&self) -> Result<DateTime<Utc>, LedgerError> {
        let state = self.lock()?;
        Ok(self.now(&state))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commitment::{default_program_id, EscrowSecret};
    use crate::transaction::Transaction;
    use wallet::{KeyManager, KeyPair, ManualClock};

    const PHRASE: &str =
        "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";

    fn key_pair(account: u32) -> KeyPair {
        KeyManager::key_pair_from_phrase(501, PHRASE, account).unwrap()
    }

    fn ledger() -> InMemoryLedger {
        InMemoryLedger::with_clock(
            10,
            default_program_id(),
            Arc::new(ManualClock::new(Utc::now())),
        )
    }

    fn submit(ledger: &InMemoryLedger, signer: &KeyPair, instruction: Instruction) -> Result<TransactionId, LedgerError> {
        let signed = Transaction::new(signer.public_key(), ledger.program_id(), instruction)
            .unwrap()
            .sign(signer)
            .unwrap();
        ledger.process(&signed.to_bytes().unwrap())
    }

    fn initialize(ledger: &InMemoryLedger, sender: &KeyPair, secret: &str, amount: u64) -> (Address, Result<TransactionId, LedgerError>) {
        let commitment = EscrowSecret::new(secret).unwrap().commitment();
        let escrow = derive_escrow_address(
            &ledger.program_id(),
            &sender.public_key(),
            &commitment,
            &AssetClass::Native,
        );
        let expires_at = Utc::now() + Duration::hours(1);
        let result = submit(
            ledger,
            sender,
            Instruction::Initialize {
                escrow,
                asset: AssetClass::Native,
                amount,
                expires_at,
                commitment,
            },
        );
        (escrow, result)
    }

    #[test]
    fn test_initialize_moves_funds() {
        let ledger = ledger();
        let sender = key_pair(0);
        ledger.airdrop(&sender.public_key(), &AssetClass::Native, 1_000).unwrap();

        let (escrow, result) = initialize(&ledger, &sender, "abc", 500);
        result.unwrap();

        let state = ledger.state.lock().unwrap();
        assert_eq!(state.balance(&sender.public_key(), &AssetClass::Native), 490);
        assert_eq!(state.balance(&escrow, &AssetClass::Native), 500);
    }

    #[test]
    fn test_initialize_needs_amount_plus_fee() {
        let ledger = ledger();
        let sender = key_pair(0);
        ledger.airdrop(&sender.public_key(), &AssetClass::Native, 505).unwrap();

        let (_, result) = initialize(&ledger, &sender, "abc", 500);
        assert!(matches!(
            result,
            Err(LedgerError::Rejected(RejectReason::InsufficientFunds {
                required: 510,
                available: 505
            }))
        ));
    }

    #[test]
    fn test_forged_signature_is_rejected() {
        let ledger = ledger();
        let sender = key_pair(0);
        let thief = key_pair(1);
        ledger.airdrop(&sender.public_key(), &AssetClass::Native, 1_000).unwrap();

        let mut signed = Transaction::new(
            thief.public_key(),
            ledger.program_id(),
            Instruction::Reclaim {
                escrow: Address::new([3u8; 32]),
            },
        )
        .unwrap()
        .sign(&thief)
        .unwrap();
        signed.transaction.payer = sender.public_key();

        assert!(matches!(
            ledger.process(&signed.to_bytes().unwrap()),
            Err(LedgerError::Rejected(RejectReason::InvalidSignature))
        ));
    }

    #[test]
    fn test_replay_is_rejected() {
        let ledger = ledger();
        let sender = key_pair(0);
        ledger.airdrop(&sender.public_key(), &AssetClass::Native, 1_000).unwrap();

        let commitment = EscrowSecret::new("abc").unwrap().commitment();
        let escrow = derive_escrow_address(
            &ledger.program_id(),
            &sender.public_key(),
            &commitment,
            &AssetClass::Native,
        );
        let signed = Transaction::new(
            sender.public_key(),
            ledger.program_id(),
            Instruction::Initialize {
                escrow,
                asset: AssetClass::Native,
                amount: 100,
                expires_at: Utc::now() + Duration::hours(1),
                commitment,
            },
        )
        .unwrap()
        .sign(&sender)
        .unwrap();
        let bytes = signed.to_bytes().unwrap();

        let id = ledger.process(&bytes).unwrap();
        assert!(matches!(
            ledger.process(&bytes),
            Err(LedgerError::Rejected(RejectReason::Duplicate))
        ));
        assert!(matches!(
            ledger.state.lock().unwrap().transactions.get(&id),
            Some(TransactionStatus::Committed { .. })
        ));
    }

    #[test]
    fn test_reclaim_only_by_sender_after_expiry() {
        let ledger = ledger();
        let sender = key_pair(0);
        let stranger = key_pair(1);
        ledger.airdrop(&sender.public_key(), &AssetClass::Native, 1_000).unwrap();
        ledger.airdrop(&stranger.public_key(), &AssetClass::Native, 1_000).unwrap();

        let (escrow, result) = initialize(&ledger, &sender, "abc", 500);
        result.unwrap();

        assert!(matches!(
            submit(&ledger, &sender, Instruction::Reclaim { escrow }),
            Err(LedgerError::Rejected(RejectReason::NotYetExpired))
        ));

        ledger.advance_time(Duration::hours(2)).unwrap();
        assert!(matches!(
            submit(&ledger, &stranger, Instruction::Reclaim { escrow }),
            Err(LedgerError::Rejected(RejectReason::NotSender))
        ));
        submit(&ledger, &sender, Instruction::Reclaim { escrow }).unwrap();
        assert!(matches!(
            submit(&ledger, &sender, Instruction::Reclaim { escrow }),
            Err(LedgerError::Rejected(RejectReason::AlreadyConsumed))
        ));

        let state = ledger.state.lock().unwrap();
        assert_eq!(state.balance(&escrow, &AssetClass::Native), 0);
        // airdrop - amount - 2 fees + amount
        assert_eq!(state.balance(&sender.public_key(), &AssetClass::Native), 980);
    }

    #[tokio::test]
    async fn test_timeout_after_commit_still_applies() {
        let ledger = ledger();
        let sender = key_pair(0);
        ledger.airdrop(&sender.public_key(), &AssetClass::Native, 1_000).unwrap();
        ledger.inject_fault(Fault::TimeoutAfterCommit).unwrap();

        let commitment = EscrowSecret::new("abc").unwrap().commitment();
        let escrow = derive_escrow_address(
            &ledger.program_id(),
            &sender.public_key(),
            &commitment,
            &AssetClass::Native,
        );
        let signed = Transaction::new(
            sender.public_key(),
            ledger.program_id(),
            Instruction::Initialize {
                escrow,
                asset: AssetClass::Native,
                amount: 100,
                expires_at: Utc::now() + Duration::hours(1),
                commitment,
            },
        )
        .unwrap()
        .sign(&sender)
        .unwrap();

        let result = ledger.submit_transaction(&signed.to_bytes().unwrap()).await;
        assert!(matches!(result, Err(LedgerError::Timeout(_))));
        assert!(matches!(
            ledger.get_transaction_status(&signed.id()).await.unwrap(),
            TransactionStatus::Committed { .. }
        ));
        assert!(ledger.get_escrow(&escrow).await.unwrap().is_some());
    }
}
