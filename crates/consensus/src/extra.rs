//! Header extra-data codec.
//!
//! The extra field of every Alien header is `vanity[32] || payload || seal[65]`,
//! where the payload is the RLP list of a [`HeaderExtra`]. The only
//! fork-dependent part of the payload is the [`Proposal`] layout, so both
//! directions take the header number and the engine config.

use alien_config::AlienConfig;
use alien_types::{Address, Header};
use rlp::{Decodable, Rlp, RlpStream};
use serde::{Deserialize, Serialize};

use crate::constants::{EXTRA_SEAL, EXTRA_VANITY};
use crate::error::{AlienError, Result};
use crate::types::{
    Confirmation, Declare, GasCharging, Proposal, SCConfirmation, SCSetCoinbase, Vote,
};

const HEADER_EXTRA_ITEMS: usize = 13;

/// Everything a block announces to the consensus layer.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeaderExtra {
    /// Confirmations of earlier blocks
    pub current_block_confirmations: Vec<Confirmation>,
    /// Votes accepted in this block
    pub current_block_votes: Vec<Vote>,
    /// Proposals submitted in this block
    pub current_block_proposals: Vec<Proposal>,
    /// Declares submitted in this block
    pub current_block_declares: Vec<Declare>,
    /// Voters whose stake changed in this block
    pub modify_predecessor_votes: Vec<Vote>,
    /// Start time of the loop this block belongs to
    pub loop_start_time: u64,
    /// Rotation of this loop
    pub signer_queue: Vec<Address>,
    /// Signers that skipped their slot since the parent
    pub signer_missing: Vec<Address>,
    /// Highest block confirmed by a super-majority
    pub confirmed_block_number: u64,
    /// Side-chain loops reported in this block
    pub side_chain_confirmations: Vec<SCConfirmation>,
    /// Side-chain coinbase registrations
    pub side_chain_set_coinbases: Vec<SCSetCoinbase>,
    /// Gas chargings credited on this side chain
    pub side_chain_charging: Vec<GasCharging>,
    /// Side-chain receipts of gas chargings
    pub side_chain_notice_confirmed: Vec<SCConfirmation>,
}

fn append_all<T: rlp::Encodable>(s: &mut RlpStream, items: &[T]) {
    s.begin_list(items.len());
    for item in items {
        s.append(item);
    }
}

impl HeaderExtra {
    /// Encodes the payload.
    pub fn encode(&self, post_trantor: bool) -> Vec<u8> {
        let mut s = RlpStream::new();
        s.begin_list(HEADER_EXTRA_ITEMS);
        append_all(&mut s, &self.current_block_confirmations);
        append_all(&mut s, &self.current_block_votes);
        s.begin_list(self.current_block_proposals.len());
        for proposal in &self.current_block_proposals {
            proposal.rlp_append(&mut s, post_trantor);
        }
        append_all(&mut s, &self.current_block_declares);
        append_all(&mut s, &self.modify_predecessor_votes);
        s.append(&self.loop_start_time);
        append_all(&mut s, &self.signer_queue);
        append_all(&mut s, &self.signer_missing);
        s.append(&self.confirmed_block_number);
        append_all(&mut s, &self.side_chain_confirmations);
        append_all(&mut s, &self.side_chain_set_coinbases);
        append_all(&mut s, &self.side_chain_charging);
        append_all(&mut s, &self.side_chain_notice_confirmed);
        s.out().to_vec()
    }

    /// Decodes a payload, rejecting trailing bytes.
    pub fn decode(payload: &[u8], post_trantor: bool) -> Result<Self> {
        let rlp = Rlp::new(payload);
        let info = rlp.payload_info()?;
        if info.header_len + info.value_len != payload.len() {
            return Err(AlienError::MalformedExtra(format!(
                "{} trailing bytes",
                payload.len().saturating_sub(info.header_len + info.value_len)
            )));
        }
        if !rlp.is_list() || rlp.item_count()? != HEADER_EXTRA_ITEMS {
            return Err(AlienError::MalformedExtra(
                "header extra must be a 13 item list".to_string(),
            ));
        }

        let proposal_list = rlp.at(2)?;
        if !proposal_list.is_list() {
            return Err(AlienError::MalformedExtra("item 2 is not a list".to_string()));
        }
        let proposals = proposal_list
            .iter()
            .map(|item| Proposal::decode(&item, post_trantor))
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(Self {
            current_block_confirmations: list_at(&rlp, 0)?,
            current_block_votes: list_at(&rlp, 1)?,
            current_block_proposals: proposals,
            current_block_declares: list_at(&rlp, 3)?,
            modify_predecessor_votes: list_at(&rlp, 4)?,
            loop_start_time: rlp.val_at(5)?,
            signer_queue: list_at(&rlp, 6)?,
            signer_missing: list_at(&rlp, 7)?,
            confirmed_block_number: rlp.val_at(8)?,
            side_chain_confirmations: list_at(&rlp, 9)?,
            side_chain_set_coinbases: list_at(&rlp, 10)?,
            side_chain_charging: list_at(&rlp, 11)?,
            side_chain_notice_confirmed: list_at(&rlp, 12)?,
        })
    }

    /// Decodes the extra of `header`.
    pub fn from_header(header: &Header, config: &AlienConfig) -> Result<Self> {
        Self::decode(payload(header)?, config.is_trantor(header.number))
    }

    /// Writes `self` into `header.extra`, keeping the header's vanity and
    /// leaving a zeroed seal.
    pub fn write_to(&self, header: &mut Header, config: &AlienConfig) {
        let mut extra = Vec::with_capacity(EXTRA_VANITY + EXTRA_SEAL + 256);
        let vanity_len = header.extra.len().min(EXTRA_VANITY);
        extra.extend_from_slice(&header.extra[..vanity_len]);
        extra.resize(EXTRA_VANITY, 0);
        extra.extend_from_slice(&self.encode(config.is_trantor(header.number)));
        extra.extend_from_slice(&[0u8; EXTRA_SEAL]);
        header.extra = extra;
    }
}

fn list_at<T: Decodable>(rlp: &Rlp<'_>, index: usize) -> Result<Vec<T>> {
    let item = rlp.at(index)?;
    if !item.is_list() {
        return Err(AlienError::MalformedExtra(format!(
            "item {index} is not a list"
        )));
    }
    Ok(item.as_list()?)
}

/// The payload between vanity and seal.
pub fn payload(header: &Header) -> Result<&[u8]> {
    if header.extra.len() < EXTRA_VANITY + EXTRA_SEAL {
        return Err(AlienError::MalformedExtra(format!(
            "extra is {} bytes, need at least {}",
            header.extra.len(),
            EXTRA_VANITY + EXTRA_SEAL
        )));
    }
    Ok(&header.extra[EXTRA_VANITY..header.extra.len() - EXTRA_SEAL])
}
