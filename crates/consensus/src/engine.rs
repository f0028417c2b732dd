//! The Alien consensus engine.
//!
//! ## Block Flow
//!
//! 1. **Prepare**: the local signer fills the consensus fields of a new header
//! 2. **Finalize**: governance transactions become header-extra records and
//!    rewards are credited to the state
//! 3. **Seal**: the signer waits for its slot and signs the header
//! 4. **Verify**: every node checks the header, its extra and its seal
//!    against the parent snapshot
//!
//! ## Main Chain and Side Chains
//!
//! A main chain elects its rotation from its own snapshot. A side chain takes
//! its rotation from the main chain, queried through a [`MainChainClient`],
//! and reports its loops back to the main chain after sealing.

use std::collections::{BTreeMap, BTreeSet};
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use alien_config::AlienConfig;
use alien_storage::KeyValueStore;
use alien_types::{Address, Block, Header, Receipt, Transaction, EMPTY_UNCLE_HASH, H256, U256};
use lru::LruCache;
use parking_lot::{Mutex, RwLock};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, trace, warn};

use crate::chain::{ChainReader, StateDb};
use crate::command::COMMAND_PREFIX;
use crate::constants::{
    CHECKPOINT_INTERVAL, EXTRA_SEAL, EXTRA_VANITY, IN_MEMORY_SNAPSHOTS, MAIN_CHAIN_TIMEOUT,
    SC_CONFIRM_GAS_LIMIT, SC_UNCONFIRM_LOOP,
};
use crate::cross_chain::{MainChainClient, MainChainSnapshot, MainChainView};
use crate::error::{AlienError, Result};
use crate::extra::HeaderExtra;
use crate::processor::Processor;
use crate::rewards::{accumulate_rewards, credit_chargings, side_chain_gas};
use crate::seal::{seal_hash, write_seal, SignatureCache, SignerFn};
use crate::side_chain::NoticeRecord;
use crate::snapshot::{in_turn_signer, signer_missing_trantor, Snapshot};
use crate::types::Vote;

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

/// The local signing identity.
#[derive(Default)]
struct SignerState {
    signer: Address,
    sign_fn: Option<SignerFn>,
    view: MainChainView,
}

/// The Alien delegated proof-of-stake engine.
pub struct Alien {
    config: Arc<AlienConfig>,
    genesis_alloc: Option<BTreeMap<Address, U256>>,
    db: Arc<dyn KeyValueStore>,
    recents: Mutex<LruCache<H256, Snapshot>>,
    signatures: SignatureCache,
    signer: RwLock<SignerState>,
    main_chain: Option<Arc<dyn MainChainClient>>,
    min_voter_balance: U256,
    main_chain_gas_price: U256,
}

impl Alien {
    /// Creates an engine.
    ///
    /// `genesis_alloc` holds the genesis balances the self-vote signers are
    /// staked with. It may be `None` when the genesis snapshot is already
    /// checkpointed in `db`.
    pub fn new(
        config: Arc<AlienConfig>,
        genesis_alloc: Option<BTreeMap<Address, U256>>,
        db: Arc<dyn KeyValueStore>,
    ) -> Result<Self> {
        config.validate()?;
        let min_voter_balance = config.min_voter_balance_wei()?;
        let main_chain_gas_price = config.main_chain_gas_price_wei()?;
        let capacity = NonZeroUsize::new(IN_MEMORY_SNAPSHOTS).unwrap_or(NonZeroUsize::MIN);
        info!(
            period = config.period,
            max_signer_count = config.max_signer_count,
            side_chain = config.side_chain,
            "Created Alien engine"
        );
        Ok(Self {
            config,
            genesis_alloc,
            db,
            recents: Mutex::new(LruCache::new(capacity)),
            signatures: SignatureCache::default(),
            signer: RwLock::new(SignerState::default()),
            main_chain: None,
            min_voter_balance,
            main_chain_gas_price,
        })
    }

    /// Attaches the client a side chain uses to reach its main chain.
    pub fn with_main_chain(mut self, client: Arc<dyn MainChainClient>) -> Self {
        self.main_chain = Some(client);
        self
    }

    /// Engine parameters.
    pub fn config(&self) -> &Arc<AlienConfig> {
        &self.config
    }

    /// Sets the local signer and its signing function.
    pub fn authorize(&self, signer: Address, sign_fn: SignerFn) {
        let mut state = self.signer.write();
        state.signer = signer;
        state.sign_fn = Some(sign_fn);
        info!(signer = %signer, "Authorized local signer");
    }

    /// The local signer.
    pub fn signer(&self) -> Address {
        self.signer.read().signer
    }

    /// What the local signer last learned from the main chain.
    pub fn main_chain_view(&self) -> MainChainView {
        self.signer.read().view.clone()
    }

    /// The account that sealed `header`.
    pub fn author(&self, header: &Header) -> Result<Address> {
        self.signatures.recover(header)
    }

    /// Difficulty of every Alien block.
    pub fn calc_difficulty(&self) -> U256 {
        U256::from(1u64)
    }

    // =========================================================================
    // Snapshots
    // =========================================================================

    fn genesis_snapshot(&self, genesis: &Header) -> Result<Snapshot> {
        let alloc = self
            .genesis_alloc
            .as_ref()
            .ok_or(AlienError::GenesisLightConfigMissing)?;
        let mut seen = BTreeSet::new();
        let votes: Vec<Vote> = self
            .config
            .self_vote_signers
            .iter()
            .filter(|signer| seen.insert(**signer))
            .map(|signer| Vote {
                voter: *signer,
                candidate: *signer,
                stake: alloc.get(signer).copied().unwrap_or_default(),
            })
            .collect();
        Ok(Snapshot::genesis(
            self.config.clone(),
            genesis,
            &votes,
            self.min_voter_balance,
        ))
    }

    /// Snapshot after block `hash` at `number`.
    ///
    /// `parents` are headers not yet in `chain`, oldest first, ending with
    /// the block itself when it is one of them.
    pub fn snapshot(
        &self,
        chain: &dyn ChainReader,
        number: u64,
        hash: H256,
        parents: &[Header],
    ) -> Result<Snapshot> {
        let mut number = number;
        let mut hash = hash;
        let mut parents = parents;
        let mut headers: Vec<Header> = Vec::new();

        let base = loop {
            if let Some(snap) = self.recents.lock().get(&hash) {
                break snap.clone();
            }
            if number % CHECKPOINT_INTERVAL == 0 {
                if let Some(snap) = Snapshot::load(self.config.clone(), self.db.as_ref(), &hash)? {
                    trace!(number, hash = %hash, "Loaded snapshot from disk");
                    break snap;
                }
            }
            if number == 0 {
                if let Some(genesis) = chain.genesis().filter(|g| g.hash() == hash) {
                    let snap = self.genesis_snapshot(&genesis)?;
                    snap.store(self.db.as_ref())?;
                    info!(hash = %hash, signers = snap.signers.len(), "Stored genesis snapshot");
                    break snap;
                }
                return Err(AlienError::UnknownAncestor);
            }

            let header = match parents.split_last() {
                Some((last, rest)) => {
                    if last.hash() != hash || last.number != number {
                        return Err(AlienError::UnknownAncestor);
                    }
                    parents = rest;
                    last.clone()
                }
                None => chain
                    .header(&hash, number)
                    .ok_or(AlienError::UnknownAncestor)?,
            };
            hash = header.parent_hash;
            number -= 1;
            headers.push(header);
        };

        headers.reverse();
        let snap = base.apply(&headers, &self.signatures)?;
        self.recents.lock().put(snap.hash, snap.clone());
        if snap.number % CHECKPOINT_INTERVAL == 0 && !headers.is_empty() {
            snap.store(self.db.as_ref())?;
        }
        Ok(snap)
    }

    // =========================================================================
    // Verification
    // =========================================================================

    fn ancestor(
        chain: &dyn ChainReader,
        parents: &[Header],
        hash: &H256,
        number: u64,
    ) -> Option<Header> {
        parents
            .iter()
            .rev()
            .find(|h| h.hash() == *hash && h.number == number)
            .cloned()
            .or_else(|| chain.header(hash, number))
    }

    fn parent_of(
        chain: &dyn ChainReader,
        header: &Header,
        parents: &[Header],
    ) -> Result<Header> {
        let number = header.number.checked_sub(1).ok_or(AlienError::UnknownAncestor)?;
        let parent = match parents.last() {
            Some(parent) => parent.clone(),
            None => chain
                .header(&header.parent_hash, number)
                .ok_or(AlienError::UnknownAncestor)?,
        };
        if parent.number != number || parent.hash() != header.parent_hash {
            return Err(AlienError::UnknownAncestor);
        }
        Ok(parent)
    }

    /// Rotation of the first loop: the genesis self-voters, cycled.
    fn first_loop_queue(&self) -> Vec<Address> {
        let signers = &self.config.self_vote_signers;
        if signers.is_empty() {
            return Vec::new();
        }
        (0..self.config.max_signer_count as usize)
            .map(|i| signers[i % signers.len()])
            .collect()
    }

    fn queue_of(&self, header: &Header) -> Result<Vec<Address>> {
        if header.number == 0 {
            return Ok(Vec::new());
        }
        Ok(HeaderExtra::from_header(header, &self.config)?.signer_queue)
    }

    /// Signers that skipped their slot between `parent` and `header`.
    fn expected_signer_missing(
        &self,
        chain: &dyn ChainReader,
        parent_snap: &Snapshot,
        header: &Header,
        parent: &Header,
        parents: &[Header],
    ) -> Result<Vec<Address>> {
        if parent.number == 0 {
            return Ok(Vec::new());
        }
        if !self.config.is_trantor(header.number) {
            let new_loop = header.number % self.config.max_signer_count == 0;
            return Ok(parent_snap.signer_missing(&parent.coinbase, &header.coinbase, new_loop));
        }
        let parent_queue = self.queue_of(parent)?;
        let grandparent_queue = match parent.number.checked_sub(1) {
            Some(n) if n > 0 => Self::ancestor(chain, parents, &parent.parent_hash, n)
                .map(|gp| self.queue_of(&gp))
                .transpose()?,
            _ => None,
        };
        Ok(signer_missing_trantor(
            &parent.coinbase,
            &header.coinbase,
            &parent_queue,
            grandparent_queue.as_deref(),
        ))
    }

    /// Checks a header and its seal. `parents` are the unverified headers
    /// before it, oldest first.
    pub async fn verify_header(
        &self,
        chain: &dyn ChainReader,
        header: &Header,
        parents: &[Header],
    ) -> Result<()> {
        let now = unix_now();
        if header.time > now {
            return Err(AlienError::FutureBlock {
                time: header.time,
                now,
            });
        }
        if header.extra.len() < EXTRA_VANITY {
            return Err(AlienError::MissingVanity);
        }
        if header.extra.len() < EXTRA_VANITY + EXTRA_SEAL {
            return Err(AlienError::MissingSignature);
        }
        if !header.mix_digest.is_zero() {
            return Err(AlienError::InvalidMixDigest);
        }
        if header.uncle_hash != EMPTY_UNCLE_HASH {
            return Err(AlienError::InvalidUncleHash);
        }
        if header.number == 0 {
            return Ok(());
        }

        let parent = Self::parent_of(chain, header, parents)?;
        if parent.time > header.time {
            return Err(AlienError::InvalidTimestamp);
        }
        self.verify_seal(chain, header, parents).await
    }

    /// Verifies `headers` in order on a background task.
    ///
    /// Results arrive on the returned receiver, one per header. Sending on
    /// the returned sender stops the task before the next header.
    pub fn verify_headers(
        self: &Arc<Self>,
        chain: Arc<dyn ChainReader>,
        headers: Vec<Header>,
    ) -> (mpsc::Sender<()>, mpsc::Receiver<Result<()>>) {
        let (abort_tx, mut abort_rx) = mpsc::channel(1);
        let (results_tx, results_rx) = mpsc::channel(headers.len().max(1));
        let engine = Arc::clone(self);
        tokio::spawn(async move {
            for (i, header) in headers.iter().enumerate() {
                if abort_rx.try_recv() == Ok(()) {
                    debug!(verified = i, "Header verification aborted");
                    return;
                }
                let result = engine.verify_header(chain.as_ref(), header, &headers[..i]).await;
                if results_tx.send(result).await.is_err() {
                    return;
                }
            }
        });
        (abort_tx, results_rx)
    }

    /// Checks the signer of `header` against the parent snapshot.
    pub async fn verify_seal(
        &self,
        chain: &dyn ChainReader,
        header: &Header,
        parents: &[Header],
    ) -> Result<()> {
        let number = header.number;
        if number == 0 {
            return Err(AlienError::UnknownBlock);
        }
        let signer = self.signatures.recover(header)?;
        if signer != header.coinbase && !self.config.tolerates_coinbase_mismatch(number) {
            return Err(AlienError::Unauthorized(signer));
        }
        let extra = HeaderExtra::from_header(header, &self.config)?;

        if self.config.side_chain {
            return self.verify_side_chain_seal(chain, header, &extra, signer).await;
        }

        let parent = Self::parent_of(chain, header, parents)?;
        let snap = self.snapshot(chain, number - 1, header.parent_hash, parents)?;
        let msc = self.config.max_signer_count;
        let period = self.config.period;

        let expected_queue = if number % msc == 0 {
            snap.create_signer_queue()?
        } else if number == 1 {
            self.first_loop_queue()
        } else {
            self.queue_of(&parent)?
        };
        if expected_queue != extra.signer_queue {
            return Err(AlienError::InvalidSignerQueue);
        }

        let mut expected_loop_start = if number == 1 {
            self.config.genesis_timestamp
        } else {
            HeaderExtra::from_header(&parent, &self.config)?.loop_start_time
        };
        if number % msc == 0 {
            expected_loop_start += period * msc;
        }
        if extra.loop_start_time != expected_loop_start {
            return Err(AlienError::InvalidTimestamp);
        }

        if in_turn_signer(&extra.signer_queue, extra.loop_start_time, period, header.time)
            != Some(signer)
        {
            return Err(AlienError::Unauthorized(signer));
        }
        if parent.coinbase == header.coinbase && header.time.saturating_sub(parent.time) < period {
            return Err(AlienError::InvalidNeighborSigner(signer));
        }
        let missing = self.expected_signer_missing(chain, &snap, header, &parent, parents)?;
        if missing != extra.signer_missing {
            return Err(AlienError::PunishedMissing);
        }
        Ok(())
    }

    async fn verify_side_chain_seal(
        &self,
        chain: &dyn ChainReader,
        header: &Header,
        extra: &HeaderExtra,
        signer: Address,
    ) -> Result<()> {
        let ms = self.main_chain_snapshot(chain, header.time).await?;
        if ms.period == 0 {
            return Err(AlienError::MCPeriodMissing);
        }
        if ms.signers.is_empty() {
            return Err(AlienError::EmptySignerQueue);
        }
        if in_turn_signer(&ms.signers, ms.loop_start_time, ms.period, header.time) != Some(signer) {
            return Err(AlienError::Unauthorized(signer));
        }
        for charging in &extra.side_chain_charging {
            if !ms.sc_notices.contains_key(&charging.hash) {
                return Err(AlienError::MCGasChargingInvalid(charging.hash));
            }
        }
        Ok(())
    }

    // =========================================================================
    // Main chain queries
    // =========================================================================

    fn side_chain_hash(chain: &dyn ChainReader) -> Result<H256> {
        chain
            .genesis()
            .map(|g| g.hash())
            .ok_or(AlienError::UnknownAncestor)
    }

    fn main_chain_client(&self) -> Result<&Arc<dyn MainChainClient>> {
        if !self.config.side_chain {
            return Err(AlienError::NotSideChain);
        }
        self.main_chain
            .as_ref()
            .ok_or(AlienError::MainChainClientMissing)
    }

    async fn main_chain_snapshot(
        &self,
        chain: &dyn ChainReader,
        time: u64,
    ) -> Result<MainChainSnapshot> {
        let client = self.main_chain_client()?;
        let sc_hash = Self::side_chain_hash(chain)?;
        let snap = tokio::time::timeout(
            MAIN_CHAIN_TIMEOUT,
            client.snapshot_by_header_time(time, sc_hash),
        )
        .await
        .map_err(|_| AlienError::MainChainTimeout)??;
        self.signer.write().view.observe(&snap);
        Ok(snap)
    }

    // =========================================================================
    // Block production
    // =========================================================================

    /// Fills the consensus fields of a header about to be built.
    pub async fn prepare(&self, chain: &dyn ChainReader, header: &mut Header) -> Result<()> {
        let number = header.number;
        header.coinbase = self.signer();
        header.nonce = [0u8; 8];
        header.mix_digest = H256::ZERO;
        header.difficulty = self.calc_difficulty();

        let vanity_len = header.extra.len().min(EXTRA_VANITY);
        let mut extra = header.extra[..vanity_len].to_vec();
        extra.resize(EXTRA_VANITY, 0);
        extra.extend_from_slice(&[0u8; EXTRA_SEAL]);
        header.extra = extra;

        let parent_number = number.checked_sub(1).ok_or(AlienError::UnknownBlock)?;
        let parent = chain
            .header(&header.parent_hash, parent_number)
            .ok_or(AlienError::UnknownAncestor)?;

        if number == 1 {
            let start = self.config.genesis_timestamp.saturating_sub(2);
            let now = unix_now();
            if start > now {
                info!(wait_secs = start - now, "Waiting for genesis time");
                tokio::time::sleep(Duration::from_secs(start - now)).await;
            }
        }

        let mut time = (parent.time + self.config.period).max(unix_now());
        if number == 1 {
            time = time.max(self.config.genesis_timestamp);
        }
        header.time = time;
        Ok(())
    }

    /// Runs the consensus part of block assembly and returns the block,
    /// ready to be sealed.
    pub async fn finalize(
        &self,
        chain: &dyn ChainReader,
        mut header: Header,
        state: &mut dyn StateDb,
        txs: Vec<Transaction>,
        receipts: Vec<Receipt>,
    ) -> Result<Block> {
        let number = header.number;
        let parent_number = number.checked_sub(1).ok_or(AlienError::UnknownBlock)?;
        let parent = chain
            .header(&header.parent_hash, parent_number)
            .ok_or(AlienError::UnknownAncestor)?;

        let mut extra = HeaderExtra::default();
        if self.config.side_chain {
            self.finalize_side_chain(chain, &header, &parent, state, &txs, &receipts, &mut extra)
                .await?;
        } else {
            self.finalize_main_chain(chain, &header, &parent, state, &txs, &receipts, &mut extra)?;
        }

        extra.write_to(&mut header, &self.config);
        header.root = state.root();
        header.uncle_hash = EMPTY_UNCLE_HASH;
        debug!(
            number,
            votes = extra.current_block_votes.len(),
            proposals = extra.current_block_proposals.len(),
            confirmed = extra.confirmed_block_number,
            "Finalized block"
        );
        Ok(Block::new(header, txs))
    }

    #[allow(clippy::too_many_arguments)]
    fn finalize_main_chain(
        &self,
        chain: &dyn ChainReader,
        header: &Header,
        parent: &Header,
        state: &mut dyn StateDb,
        txs: &[Transaction],
        receipts: &[Receipt],
        extra: &mut HeaderExtra,
    ) -> Result<()> {
        let number = header.number;
        let msc = self.config.max_signer_count;
        let snap = self.snapshot(chain, parent.number, header.parent_hash, &[])?;

        if number == 1 {
            let mut seen = BTreeSet::new();
            for signer in &self.config.self_vote_signers {
                if seen.insert(*signer) {
                    extra.current_block_votes.push(Vote {
                        voter: *signer,
                        candidate: *signer,
                        stake: state.balance(signer),
                    });
                }
            }
            extra.loop_start_time = self.config.genesis_timestamp;
            extra.signer_queue = self.first_loop_queue();
        } else {
            let parent_extra = HeaderExtra::from_header(parent, &self.config)?;
            extra.confirmed_block_number = parent_extra.confirmed_block_number;
            extra.signer_queue = parent_extra.signer_queue;
            extra.loop_start_time = parent_extra.loop_start_time;
            extra.signer_missing = self.expected_signer_missing(chain, &snap, header, parent, &[])?;
        }

        let events = Processor::new(&snap, chain, number).process(state, txs, receipts);
        events.fill(extra);

        if let Some(confirmed) = snap.last_confirmed_block_number(&extra.current_block_confirmations) {
            extra.confirmed_block_number = extra.confirmed_block_number.max(confirmed);
        }

        if number % msc == 0 {
            extra.loop_start_time += self.config.period * msc;
            extra.signer_queue = snap.create_signer_queue()?;
        }

        accumulate_rewards(&snap, state, header, &events.refund_gas)?;
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    async fn finalize_side_chain(
        &self,
        chain: &dyn ChainReader,
        header: &Header,
        parent: &Header,
        state: &mut dyn StateDb,
        txs: &[Transaction],
        receipts: &[Receipt],
        extra: &mut HeaderExtra,
    ) -> Result<()> {
        let msc = self.config.max_signer_count as usize;
        let parent_extra = if parent.number == 0 {
            HeaderExtra::default()
        } else {
            HeaderExtra::from_header(parent, &self.config)?
        };
        extra.confirmed_block_number = parent_extra.confirmed_block_number;
        extra.loop_start_time = parent_extra.loop_start_time;
        extra.signer_queue = std::iter::once(header.coinbase)
            .chain(parent_extra.signer_queue)
            .take(msc)
            .collect();

        let snap = self.snapshot(chain, parent.number, header.parent_hash, &[])?;
        let ms = self.main_chain_snapshot(chain, header.time).await?;
        for (hash, notice) in &ms.sc_notices {
            if !snap.local_notice.contains_key(hash) {
                extra.side_chain_charging.push(notice.charging.clone());
            }
        }
        credit_chargings(state, &extra.side_chain_charging);
        state.sub_balance(&header.coinbase, side_chain_gas(txs, receipts));
        Ok(())
    }

    /// Signs `block` once its slot arrives.
    ///
    /// Returns `Ok(None)` if `stop` fires first.
    pub async fn seal(
        &self,
        chain: &dyn ChainReader,
        block: Block,
        mut stop: oneshot::Receiver<()>,
    ) -> Result<Option<Block>> {
        let mut header = block.header.clone();
        let number = header.number;
        if number == 0 {
            return Err(AlienError::UnknownBlock);
        }
        if self.config.period == 0 && block.transactions.is_empty() {
            return Err(AlienError::WaitTransactions);
        }
        let (signer, sign_fn) = {
            let state = self.signer.read();
            let sign_fn = state.sign_fn.clone().ok_or(AlienError::SignerMissing)?;
            (state.signer, sign_fn)
        };

        let slot_owner = if self.config.side_chain {
            let ms = self.main_chain_snapshot(chain, header.time).await?;
            in_turn_signer(&ms.signers, ms.loop_start_time, ms.period, header.time)
        } else {
            let extra = HeaderExtra::from_header(&header, &self.config)?;
            in_turn_signer(&extra.signer_queue, extra.loop_start_time, self.config.period, header.time)
        };
        if slot_owner != Some(signer) {
            return Err(AlienError::Unauthorized(signer));
        }

        let delay = Duration::from_secs(header.time.saturating_sub(unix_now()));
        trace!(number, delay_secs = delay.as_secs(), "Waiting for slot");
        let sleep = tokio::time::sleep(delay);
        tokio::pin!(sleep);
        tokio::select! {
            biased;
            Ok(()) = &mut stop => {
                debug!(number, "Sealing aborted");
                return Ok(None);
            }
            _ = &mut sleep => {}
        }

        let hash = seal_hash(&header)?;
        let signature = sign_fn(signer, hash.as_fixed_bytes())?;
        write_seal(&mut header, &signature)?;
        info!(number, hash = %header.hash(), "Sealed block");

        if self.config.side_chain {
            if let Err(e) = self.confirm_to_main_chain(chain, number, signer, &sign_fn).await {
                warn!(number, error = %e, "Failed to report side-chain loop");
            }
        }
        Ok(Some(block.with_seal(header)))
    }

    /// Reports the side-chain loop that ended `SC_UNCONFIRM_LOOP` loops
    /// before `number` to the main chain.
    async fn confirm_to_main_chain(
        &self,
        chain: &dyn ChainReader,
        number: u64,
        signer: Address,
        sign_fn: &SignerFn,
    ) -> Result<()> {
        let msc = self.config.max_signer_count;
        if number <= msc * SC_UNCONFIRM_LOOP || number % msc != 0 {
            return Ok(());
        }
        let client = self.main_chain_client()?.clone();
        let sc_hash = Self::side_chain_hash(chain)?;
        let confirm_number = number - msc * SC_UNCONFIRM_LOOP;
        let confirmed = chain
            .header_by_number(confirm_number)
            .ok_or(AlienError::UnknownAncestor)?;
        let extra = HeaderExtra::from_header(&confirmed, &self.config)?;
        let snap = self.snapshot(chain, confirmed.number, confirmed.hash(), &[])?;
        let ms = self.main_chain_snapshot(chain, unix_now()).await?;

        let mut loop_info: Vec<String> = extra.signer_queue.iter().map(Address::to_hex).collect();
        loop_info.extend(
            snap.local_notice
                .keys()
                .filter(|hash| ms.sc_notices.get(hash).map_or(false, NoticeRecord::is_pending))
                .map(H256::to_hex),
        );
        let payload = format!(
            "{COMMAND_PREFIX}sc:confirm:{}:{}:{}",
            sc_hash.to_hex(),
            confirm_number,
            loop_info.join(":")
        );

        let remote_nonce = tokio::time::timeout(MAIN_CHAIN_TIMEOUT, client.transaction_count(signer))
            .await
            .map_err(|_| AlienError::MainChainTimeout)??;
        let nonce = self
            .signer
            .read()
            .view
            .nonce
            .map_or(remote_nonce, |cached| cached.max(remote_nonce));

        let tx = Transaction::new(
            nonce,
            self.main_chain_gas_price,
            SC_CONFIRM_GAS_LIMIT,
            signer,
            U256::ZERO,
            payload.into_bytes(),
        );
        let chain_id = self.config.main_chain_id;
        let signature = sign_fn(signer, tx.signing_hash(chain_id).as_fixed_bytes())?;
        let tx = tx.with_signature(&signature, chain_id);
        let tx_hash = tokio::time::timeout(
            MAIN_CHAIN_TIMEOUT,
            client.send_raw_transaction(tx.rlp_encode()),
        )
        .await
        .map_err(|_| AlienError::MainChainTimeout)??;

        {
            let mut state = self.signer.write();
            state.view.nonce = Some(nonce + 1);
            state.view.last_confirmed_loop = confirm_number;
        }
        info!(
            confirm_number,
            tx = %tx_hash,
            nonce,
            "Reported side-chain loop to main chain"
        );
        Ok(())
    }
}
