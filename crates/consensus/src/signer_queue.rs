//! Signer rotation for the next loop.
//!
//! At the last block of a loop the snapshot computes the next rotation. Every
//! `loop_count_recalculate_signers` loops the rotation is re-elected from the
//! tally; otherwise the current signers are reshuffled. Either way each
//! chosen signer is paired with a recent block hash and the pairs are ordered
//! by hash, so the order is unpredictable before those blocks exist.

use alien_types::{Address, H256, U256};
use std::cmp::Ordering;
use tracing::debug;

use crate::constants::{
    DEFAULT_FULL_CREDIT, MIN_CAL_SIGNER_QUEUE_CREDIT, OFFICIAL_FIRST_LEVEL_COUNT,
    OFFICIAL_LAST_LEVEL_SLOTS, OFFICIAL_MAX_SIGNER_COUNT, OFFICIAL_MAX_VALID_COUNT,
    OFFICIAL_SECOND_LEVEL_COUNT, OFFICIAL_SECOND_LEVEL_SLOTS, OFFICIAL_THIRD_LEVEL_COUNT,
    OFFICIAL_THIRD_LEVEL_SLOTS,
};
use crate::error::{AlienError, Result};
use crate::snapshot::Snapshot;

type Pair = (Address, H256);

/// Hash descending, then address descending.
fn by_hash_desc(a: &Pair, b: &Pair) -> Ordering {
    b.1.cmp(&a.1).then_with(|| b.0.cmp(&a.0))
}

impl Snapshot {
    /// Candidates ordered by weighted stake, highest first.
    ///
    /// The weight of a candidate is its tally times its remaining credit, so
    /// a punished signer ranks below an equally backed clean one.
    pub fn tally_ranking(&self) -> Vec<(Address, U256)> {
        let gated = self.config().candidates_gated();
        let mut ranking: Vec<(Address, U256)> = self
            .tally
            .iter()
            .filter(|(candidate, _)| !gated || self.candidates.contains(candidate))
            .map(|(candidate, stake)| {
                let credit = match self.punished.get(candidate) {
                    Some(debt) => DEFAULT_FULL_CREDIT
                        .saturating_sub(*debt)
                        .max(MIN_CAL_SIGNER_QUEUE_CREDIT),
                    None => DEFAULT_FULL_CREDIT,
                };
                (*candidate, *stake * U256::from(credit))
            })
            .collect();
        ranking.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| b.0.cmp(&a.0)));
        ranking
    }

    /// The `back`-th most recent history hash.
    fn history_back(&self, back: usize) -> Result<H256> {
        self.history_hash
            .len()
            .checked_sub(back + 1)
            .and_then(|idx| self.history_hash.get(idx).copied())
            .ok_or(AlienError::QueueNotAllowed(self.number))
    }

    fn pair_with_history(&self, signers: &[Address]) -> Result<Vec<Pair>> {
        signers
            .iter()
            .enumerate()
            .map(|(i, signer)| Ok((*signer, self.history_back(i)?)))
            .collect()
    }

    /// Rotation for the loop after this snapshot's block.
    pub fn create_signer_queue(&self) -> Result<Vec<Address>> {
        let msc = self.config().max_signer_count;
        if msc == 0
            || (self.number + 1) % msc != 0
            || self.history_hash.last() != Some(&self.hash)
        {
            return Err(AlienError::QueueNotAllowed(self.number));
        }

        let election = (self.number + 1) % (msc * self.loop_count_recalculate_signers.max(1)) == 0;
        let mut pairs = if election {
            let ranking: Vec<Address> = self.tally_ranking().into_iter().map(|(a, _)| a).collect();
            if msc == OFFICIAL_MAX_SIGNER_COUNT && ranking.len() > OFFICIAL_THIRD_LEVEL_COUNT {
                self.official_pairs(&ranking)?
            } else {
                let top = ranking.len().min(msc as usize);
                self.pair_with_history(&ranking[..top])?
            }
        } else {
            self.pair_with_history(&self.signers)?
        };
        pairs.sort_by(by_hash_desc);

        if pairs.is_empty() {
            return Err(AlienError::EmptySignerQueue);
        }
        let queue: Vec<Address> = (0..msc as usize).map(|i| pairs[i % pairs.len()].0).collect();
        debug!(number = self.number, election, signers = pairs.len(), "Created signer queue");
        Ok(queue)
    }

    /// Level-based draw used by the official 21-signer network: the top ten
    /// are always in, the rest of the slots are drawn from lower ranks.
    fn official_pairs(&self, ranking: &[Address]) -> Result<Vec<Pair>> {
        let mut pairs = self.pair_with_history(&ranking[..OFFICIAL_FIRST_LEVEL_COUNT])?;
        let levels = [
            (OFFICIAL_FIRST_LEVEL_COUNT, OFFICIAL_SECOND_LEVEL_COUNT, OFFICIAL_SECOND_LEVEL_SLOTS),
            (OFFICIAL_SECOND_LEVEL_COUNT, OFFICIAL_THIRD_LEVEL_COUNT, OFFICIAL_THIRD_LEVEL_SLOTS),
            (
                OFFICIAL_THIRD_LEVEL_COUNT,
                ranking.len().min(OFFICIAL_MAX_VALID_COUNT),
                OFFICIAL_LAST_LEVEL_SLOTS,
            ),
        ];
        for (start, end, slots) in levels {
            let mut level = self.pair_with_history(&ranking[start..end])?;
            level.sort_by(by_hash_desc);
            pairs.extend(level.into_iter().take(slots));
        }
        Ok(pairs)
    }

    /// Returns true if `queue` is the rotation this snapshot would create.
    pub fn verify_signer_queue(&self, queue: &[Address]) -> Result<bool> {
        Ok(self.create_signer_queue()? == queue)
    }
}
