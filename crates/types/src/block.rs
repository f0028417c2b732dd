//! Header and Block types.
//!
//! The header follows the Ethereum layout. The consensus engine owns two of its
//! fields: `extra` carries `vanity || HeaderExtra || seal`, and `coinbase` names
//! the signer that sealed the block.

use crate::{uint, Address, Bloom, Error, Result, Transaction, H256, U256};
use rlp::{Decodable, DecoderError, Encodable, Rlp, RlpStream};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Keccak256 of the RLP encoding of an empty list.
///
/// Every Alien header carries this as its uncle hash.
pub const EMPTY_UNCLE_HASH: H256 = H256::new([
    0x1d, 0xcc, 0x4d, 0xe8, 0xde, 0xc7, 0x5d, 0x7a, 0xab, 0x85, 0xb5, 0x67, 0xb6, 0xcc, 0xd4, 0x1a,
    0xd3, 0x12, 0x45, 0x1b, 0x94, 0x8a, 0x74, 0x13, 0xf0, 0xa1, 0x42, 0xfd, 0x40, 0xd4, 0x93, 0x47,
]);

/// A block header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Header {
    /// Hash of the parent header
    pub parent_hash: H256,
    /// Always [`EMPTY_UNCLE_HASH`]
    #[serde(rename = "sha3Uncles")]
    pub uncle_hash: H256,
    /// Sealer of the block
    #[serde(rename = "miner")]
    pub coinbase: Address,
    /// State root after execution
    #[serde(rename = "stateRoot")]
    pub root: H256,
    /// Transactions trie root
    #[serde(rename = "transactionsRoot")]
    pub tx_hash: H256,
    /// Receipts trie root
    #[serde(rename = "receiptsRoot")]
    pub receipt_hash: H256,
    /// Log bloom
    #[serde(rename = "logsBloom")]
    pub bloom: Bloom,
    /// Constant 1 under DPoS
    pub difficulty: U256,
    /// Block number
    pub number: u64,
    /// Gas limit
    pub gas_limit: u64,
    /// Gas used by all transactions
    pub gas_used: u64,
    /// Unix timestamp in seconds
    #[serde(rename = "timestamp")]
    pub time: u64,
    /// `vanity[32] || HeaderExtra || seal[65]`
    #[serde(rename = "extraData", with = "crate::hex_serde")]
    pub extra: Vec<u8>,
    /// Must be zero
    pub mix_digest: H256,
    /// Unused, zero
    #[serde(with = "crate::hex_serde")]
    pub nonce: [u8; 8],
}

impl Default for Header {
    fn default() -> Self {
        Self {
            parent_hash: H256::ZERO,
            uncle_hash: EMPTY_UNCLE_HASH,
            coinbase: Address::ZERO,
            root: H256::ZERO,
            tx_hash: H256::ZERO,
            receipt_hash: H256::ZERO,
            bloom: Bloom::default(),
            difficulty: U256::from(1u64),
            number: 0,
            gas_limit: 30_000_000,
            gas_used: 0,
            time: 0,
            extra: Vec::new(),
            mix_digest: H256::ZERO,
            nonce: [0u8; 8],
        }
    }
}

impl Header {
    /// Computes the hash of this header: Keccak256 of the RLP of all 15 fields.
    pub fn hash(&self) -> H256 {
        H256::keccak256(&self.rlp_encode())
    }

    /// RLP encodes the header.
    pub fn rlp_encode(&self) -> Vec<u8> {
        self.rlp_encode_with_extra(&self.extra)
    }

    /// RLP encodes the header with `extra` substituted for the extra-data field.
    ///
    /// The seal hash is computed over this encoding with the seal bytes removed.
    pub fn rlp_encode_with_extra(&self, extra: &[u8]) -> Vec<u8> {
        let mut stream = RlpStream::new_list(15);
        self.append_fields(&mut stream, extra);
        stream.out().to_vec()
    }

    fn append_fields(&self, s: &mut RlpStream, extra: &[u8]) {
        s.append(&self.parent_hash);
        s.append(&self.uncle_hash);
        s.append(&self.coinbase);
        s.append(&self.root);
        s.append(&self.tx_hash);
        s.append(&self.receipt_hash);
        s.append(&self.bloom);
        uint::append_u256(s, &self.difficulty);
        s.append(&self.number);
        s.append(&self.gas_limit);
        s.append(&self.gas_used);
        s.append(&self.time);
        s.append(&extra.to_vec());
        s.append(&self.mix_digest);
        s.append(&self.nonce.to_vec());
    }

    /// Decodes a header from RLP bytes.
    pub fn rlp_decode(data: &[u8]) -> Result<Self> {
        let rlp = Rlp::new(data);
        Self::decode(&rlp).map_err(Error::RlpDecode)
    }
}

impl Encodable for Header {
    fn rlp_append(&self, s: &mut RlpStream) {
        s.begin_list(15);
        self.append_fields(s, &self.extra);
    }
}

impl Decodable for Header {
    fn decode(rlp: &Rlp<'_>) -> std::result::Result<Self, DecoderError> {
        if rlp.item_count()? != 15 {
            return Err(DecoderError::RlpIncorrectListLen);
        }
        let nonce: [u8; 8] = rlp
            .val_at::<Vec<u8>>(14)?
            .try_into()
            .map_err(|_| DecoderError::RlpInvalidLength)?;

        Ok(Self {
            parent_hash: rlp.val_at(0)?,
            uncle_hash: rlp.val_at(1)?,
            coinbase: rlp.val_at(2)?,
            root: rlp.val_at(3)?,
            tx_hash: rlp.val_at(4)?,
            receipt_hash: rlp.val_at(5)?,
            bloom: rlp.val_at(6)?,
            difficulty: uint::u256_at(rlp, 7)?,
            number: rlp.val_at(8)?,
            gas_limit: rlp.val_at(9)?,
            gas_used: rlp.val_at(10)?,
            time: rlp.val_at(11)?,
            extra: rlp.val_at(12)?,
            mix_digest: rlp.val_at(13)?,
            nonce,
        })
    }
}

impl fmt::Display for Header {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Header(#{}, hash={}, coinbase={}, time={})",
            self.number,
            self.hash(),
            self.coinbase,
            self.time
        )
    }
}

/// A complete block: header plus transactions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    /// Block header
    pub header: Header,
    /// Transactions in execution order
    pub transactions: Vec<Transaction>,
}

impl Block {
    /// Creates a block from a header and its transactions.
    pub fn new(header: Header, transactions: Vec<Transaction>) -> Self {
        Self {
            header,
            transactions,
        }
    }

    /// Returns the header hash.
    pub fn hash(&self) -> H256 {
        self.header.hash()
    }

    /// Returns the block number.
    pub fn number(&self) -> u64 {
        self.header.number
    }

    /// Replaces the header, keeping the body.
    pub fn with_seal(self, header: Header) -> Self {
        Self {
            header,
            transactions: self.transactions,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_uncle_hash_matches_empty_list() {
        assert_eq!(H256::keccak256(&[0xc0]), EMPTY_UNCLE_HASH);
    }

    #[test]
    fn default_header_encodes_fifteen_items() {
        let header = Header {
            nonce: [0xab; 8],
            ..Default::default()
        };
        let encoded = header.rlp_encode();
        let rlp = Rlp::new(&encoded);
        assert_eq!(rlp.item_count().unwrap(), 15);
        assert_eq!(rlp.at(14).unwrap().as_raw(), &[0x88, 0xab, 0xab, 0xab, 0xab, 0xab, 0xab, 0xab, 0xab]);
        assert_eq!(header.hash(), H256::keccak256(&encoded));
        assert_ne!(Header::default().hash(), header.hash());
    }

    #[test]
    fn header_rlp_roundtrip() {
        let header = Header {
            number: 42,
            time: 1_600_000_000,
            coinbase: Address::new([7u8; 20]),
            extra: vec![1, 2, 3],
            ..Default::default()
        };
        let encoded = header.rlp_encode();
        let decoded = Header::rlp_decode(&encoded).unwrap();
        assert_eq!(decoded, header);
        assert_eq!(decoded.hash(), header.hash());
    }

    #[test]
    fn substituted_extra_changes_encoding() {
        let header = Header {
            extra: vec![0u8; 97],
            ..Default::default()
        };
        let full = header.rlp_encode();
        let trimmed = header.rlp_encode_with_extra(&header.extra[..32]);
        assert_ne!(full, trimmed);
    }

    #[test]
    fn header_json_roundtrip() {
        let header = Header {
            number: 9,
            extra: vec![0xab; 4],
            ..Default::default()
        };
        let json = serde_json::to_string(&header).unwrap();
        assert!(json.contains("\"extraData\":\"0xabababab\""));
        let decoded: Header = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, header);
    }
}
