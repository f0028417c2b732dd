//! Legacy (EIP-155) transactions and execution receipts.
//!
//! The engine only reads the sender, recipient, value, nonce, gas price and
//! payload of a transaction, plus the status and gas used of its receipt. A
//! side-chain sealer also builds and signs main-chain transactions with this
//! type.

use crate::{uint, Address, Error, Result, H256, U256};
use bytes::Bytes;
use rlp::{Decodable, DecoderError, Encodable, Rlp, RlpStream};
use serde::{Deserialize, Serialize};

/// A signed or unsigned legacy transaction.
///
/// An unsigned transaction has `v == 0`, `r == 0` and `s == 0`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    /// Sender nonce
    pub nonce: u64,
    /// Price per unit of gas
    pub gas_price: U256,
    /// Gas limit
    #[serde(rename = "gas")]
    pub gas_limit: u64,
    /// Recipient (`None` for contract creation)
    pub to: Option<Address>,
    /// Transferred value in wei
    pub value: U256,
    /// Call data; governance commands live here
    #[serde(rename = "input", with = "crate::hex_serde")]
    pub data: Bytes,
    /// Recovery value, `recid + 35 + 2 * chain_id` under EIP-155
    pub v: u64,
    /// Signature r
    pub r: U256,
    /// Signature s
    pub s: U256,
}

impl Transaction {
    /// Creates an unsigned call transaction.
    pub fn new(
        nonce: u64,
        gas_price: U256,
        gas_limit: u64,
        to: Address,
        value: U256,
        data: impl Into<Bytes>,
    ) -> Self {
        Self {
            nonce,
            gas_price,
            gas_limit,
            to: Some(to),
            value,
            data: data.into(),
            ..Default::default()
        }
    }

    /// Hash signed over by the sender (EIP-155 with `chain_id`).
    pub fn signing_hash(&self, chain_id: u64) -> H256 {
        let mut s = RlpStream::new_list(9);
        self.append_payload(&mut s);
        s.append(&chain_id);
        s.append(&0u8);
        s.append(&0u8);
        H256::keccak256(&s.out())
    }

    /// Attaches a 65-byte `r || s || recid` signature.
    pub fn with_signature(mut self, signature: &[u8; 65], chain_id: u64) -> Self {
        self.r = U256::from_be_slice(&signature[..32]);
        self.s = U256::from_be_slice(&signature[32..64]);
        self.v = u64::from(signature[64]) + 35 + 2 * chain_id;
        self
    }

    /// Returns true when a signature is attached.
    pub fn is_signed(&self) -> bool {
        !(self.r.is_zero() && self.s.is_zero())
    }

    /// Chain id the signature commits to, if any.
    pub fn chain_id(&self) -> Option<u64> {
        if self.v >= 35 {
            Some((self.v - 35) / 2)
        } else {
            None
        }
    }

    /// Returns the prehash and `r || s || recid` signature needed for sender recovery.
    pub fn recovery_parts(&self) -> Result<(H256, [u8; 65])> {
        if !self.is_signed() {
            return Err(Error::InvalidTransaction("transaction is not signed".into()));
        }
        let (prehash, recid) = match self.chain_id() {
            Some(chain_id) => (self.signing_hash(chain_id), (self.v - 35) % 2),
            None if self.v == 27 || self.v == 28 => (self.unprotected_signing_hash(), self.v - 27),
            None => {
                return Err(Error::InvalidTransaction(format!(
                    "invalid recovery value {}",
                    self.v
                )))
            }
        };
        let mut sig = [0u8; 65];
        sig[..32].copy_from_slice(&self.r.to_be_bytes::<32>());
        sig[32..64].copy_from_slice(&self.s.to_be_bytes::<32>());
        sig[64] = recid as u8;
        Ok((prehash, sig))
    }

    fn unprotected_signing_hash(&self) -> H256 {
        let mut s = RlpStream::new_list(6);
        self.append_payload(&mut s);
        H256::keccak256(&s.out())
    }

    fn append_payload(&self, s: &mut RlpStream) {
        s.append(&self.nonce);
        uint::append_u256(s, &self.gas_price);
        s.append(&self.gas_limit);
        match &self.to {
            Some(to) => s.append(to),
            None => s.append(&""),
        };
        uint::append_u256(s, &self.value);
        s.append(&self.data.to_vec());
    }

    /// RLP encoding of the signed transaction, as submitted over RPC.
    pub fn rlp_encode(&self) -> Vec<u8> {
        rlp::encode(self).to_vec()
    }

    /// Decodes a signed transaction.
    pub fn rlp_decode(data: &[u8]) -> Result<Self> {
        rlp::decode(data).map_err(Error::RlpDecode)
    }

    /// Transaction hash: Keccak256 of the signed encoding.
    pub fn hash(&self) -> H256 {
        H256::keccak256(&self.rlp_encode())
    }
}

impl Encodable for Transaction {
    fn rlp_append(&self, s: &mut RlpStream) {
        s.begin_list(9);
        self.append_payload(s);
        s.append(&self.v);
        uint::append_u256(s, &self.r);
        uint::append_u256(s, &self.s);
    }
}

impl Decodable for Transaction {
    fn decode(rlp: &Rlp<'_>) -> std::result::Result<Self, DecoderError> {
        if rlp.item_count()? != 9 {
            return Err(DecoderError::RlpIncorrectListLen);
        }
        let to_bytes: Vec<u8> = rlp.val_at(3)?;
        let to = if to_bytes.is_empty() {
            None
        } else {
            Some(Address::from_slice(&to_bytes).map_err(|_| DecoderError::RlpInvalidLength)?)
        };
        let data: Vec<u8> = rlp.val_at(5)?;
        Ok(Self {
            nonce: rlp.val_at(0)?,
            gas_price: uint::u256_at(rlp, 1)?,
            gas_limit: rlp.val_at(2)?,
            to,
            value: uint::u256_at(rlp, 4)?,
            data: Bytes::from(data),
            v: rlp.val_at(6)?,
            r: uint::u256_at(rlp, 7)?,
            s: uint::u256_at(rlp, 8)?,
        })
    }
}

/// Outcome of executing a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReceiptStatus {
    /// Execution reverted or failed
    Failed,
    /// Execution succeeded
    Success,
}

/// The receipt facts the engine consults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Receipt {
    /// Hash of the transaction this receipt belongs to
    pub tx_hash: H256,
    /// Execution status
    pub status: ReceiptStatus,
    /// Gas used by this transaction alone
    pub gas_used: u64,
}

impl Receipt {
    /// Creates a receipt.
    pub fn new(tx_hash: H256, status: ReceiptStatus, gas_used: u64) -> Self {
        Self {
            tx_hash,
            status,
            gas_used,
        }
    }

    /// Returns true when execution succeeded.
    pub fn is_success(&self) -> bool {
        self.status == ReceiptStatus::Success
    }
}
