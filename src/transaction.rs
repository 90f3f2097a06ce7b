//! Escrow program instructions and their signed envelope
//!
//! The signature covers the JSON encoding of [`Transaction`]; its base58 form
//! is the transaction id, so the id is known before anything is sent.

use chrono::{DateTime, Utc};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::fmt;
use wallet::{verify_signature, Address, KeyPair, WalletError};

use crate::asset::AssetClass;
use crate::commitment::{EscrowSecret, SecretCommitment};
use crate::error::{EscrowError, RejectReason};

#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionId(String);

impl TransactionId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for TransactionId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TransactionId({})", self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Instruction {
    /// Move `amount` from the payer into `escrow` and record the commitment
    Initialize {
        escrow: Address,
        asset: AssetClass,
        amount: u64,
        expires_at: DateTime<Utc>,
        commitment: SecretCommitment,
    },
    /// Present the secret; the program recomputes the commitment
    Redeem {
        escrow: Address,
        sender: Address,
        asset: AssetClass,
        secret: EscrowSecret,
    },
    /// Sender takes back an unconsumed, expired escrow
    Reclaim { escrow: Address },
}

impl Instruction {
    pub fn escrow(&self) -> &Address {
        match self {
            Self::Initialize { escrow, .. }
            | Self::Redeem { escrow, .. }
            | Self::Reclaim { escrow } => escrow,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Initialize { .. } => "initialize",
            Self::Redeem { .. } => "redeem",
            Self::Reclaim { .. } => "reclaim",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub payer: Address,
    pub program_id: Address,
    /// Random per transaction so identical instructions get distinct ids
    pub nonce: u64,
    pub instruction: Instruction,
}

impl Transaction {
    pub fn new(payer: Address, program_id: Address, instruction: Instruction) -> Result<Self, EscrowError> {
        let mut nonce = [0u8; 8];
        OsRng
            .try_fill_bytes(&mut nonce)
            .map_err(|e| WalletError::Entropy(e.to_string()))?;
        Ok(Self {
            payer,
            program_id,
            nonce: u64::from_le_bytes(nonce),
            instruction,
        })
    }

    pub fn message_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    /// Sign as `key_pair`, which must be the payer
    pub fn sign(self, key_pair: &KeyPair) -> Result<SignedTransaction, EscrowError> {
        if key_pair.public_key() != self.payer {
            return Err(EscrowError::Wallet(WalletError::InvalidKey(format!(
                "signer {} is not payer {}",
                key_pair.public_key(),
                self.payer
            ))));
        }
        let message = self
            .message_bytes()
            .map_err(|e| EscrowError::LedgerSubmission(format!("encode transaction: {}", e)))?;
        let signature = bs58::encode(key_pair.sign(&message)).into_string();
        Ok(SignedTransaction {
            transaction: self,
            signature,
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedTransaction {
    pub transaction: Transaction,
    /// base58 Ed25519 signature over [`Transaction::message_bytes`]
    pub signature: String,
}

impl SignedTransaction {
    pub fn id(&self) -> TransactionId {
        TransactionId(self.signature.clone())
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, EscrowError> {
        serde_json::to_vec(self)
            .map_err(|e| EscrowError::LedgerSubmission(format!("encode transaction: {}", e)))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, RejectReason> {
        serde_json::from_slice(bytes).map_err(|e| RejectReason::Malformed {
            detail: e.to_string(),
        })
    }

    pub fn verify(&self) -> bool {
        let signature: [u8; 64] = match bs58::decode(&self.signature).into_vec() {
            Ok(bytes) => match bytes.try_into() {
                Ok(signature) => signature,
                Err(_) => return false,
            },
            Err(_) => return false,
        };
        match self.transaction.message_bytes() {
            Ok(message) => verify_signature(&self.transaction.payer, &message, &signature),
            Err(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wallet::KeyManager;

    const PHRASE: &str =
        "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";

    fn key_pair(account: u32) -> KeyPair {
        KeyManager::key_pair_from_phrase(501, PHRASE, account).unwrap()
    }

    fn reclaim(payer: Address) -> Transaction {
        Transaction::new(
            payer,
            Address::new([9u8; 32]),
            Instruction::Reclaim {
                escrow: Address::new([7u8; 32]),
            },
        )
        .unwrap()
    }

    #[test]
    fn test_signed_transaction_verifies() {
        let signer = key_pair(0);
        let signed = reclaim(signer.public_key()).sign(&signer).unwrap();
        assert!(signed.verify());
        assert_eq!(signed.id().as_str(), signed.signature);

        let decoded = SignedTransaction::from_bytes(&signed.to_bytes().unwrap()).unwrap();
        assert_eq!(decoded, signed);
        assert!(decoded.verify());
    }

    #[test]
    fn test_tampering_breaks_signature() {
        let signer = key_pair(0);
        let mut signed = reclaim(signer.public_key()).sign(&signer).unwrap();
        signed.transaction.nonce = signed.transaction.nonce.wrapping_add(1);
        assert!(!signed.verify());
    }

    #[test]
    fn test_only_payer_can_sign() {
        let payer = key_pair(0);
        let other = key_pair(1);
        assert!(reclaim(payer.public_key()).sign(&other).is_err());
    }

    #[test]
    fn test_garbage_is_malformed() {
        assert!(matches!(
            SignedTransaction::from_bytes(b"not json"),
            Err(RejectReason::Malformed { .. })
        ));
    }

    #[test]
    fn test_redeem_debug_hides_secret() {
        let instruction = Instruction::Redeem {
            escrow: Address::new([1u8; 32]),
            sender: Address::new([2u8; 32]),
            asset: AssetClass::Native,
            secret: EscrowSecret::new("hunter2").unwrap(),
        };
        assert!(!format!("{:?}", instruction).contains("hunter2"));
    }
}
