//! Shared harness: an in-memory chain driven through the engine.

#![allow(dead_code)]

use alien_config::AlienConfig;
use alien_consensus::{
    in_turn_signer, seal_hash, write_seal, Alien, ChainReader, HeaderExtra, MainChainClient,
    MainChainSnapshot, MemoryChain, MemoryState, Result, SignerFn, Snapshot, StateDb,
};
use alien_crypto::{recover_sender, CryptoError, PrivateKey};
use alien_storage::{KeyValueStore, MemoryDatabase};
use alien_types::{Address, Header, Receipt, ReceiptStatus, Transaction, H256, U256};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

pub const PERIOD: u64 = 3;

pub fn key(n: u8) -> PrivateKey {
    PrivateKey::from_bytes(&[n; 32]).unwrap()
}

pub fn ether(n: u64) -> U256 {
    U256::from(n) * U256::from(10u64).pow(U256::from(18u64))
}

/// A genesis time far enough in the past for a few thousand blocks.
pub fn past_genesis_time() -> u64 {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs();
    now - 20_000
}

pub fn test_config(max_signer_count: u64, signers: &[Address]) -> AlienConfig {
    AlienConfig {
        period: PERIOD,
        epoch: 100_000,
        max_signer_count,
        min_voter_balance: "50".to_string(),
        genesis_timestamp: past_genesis_time(),
        self_vote_signers: signers.to_vec(),
        chain_id: 7,
        ..Default::default()
    }
}

pub fn genesis_header(config: &AlienConfig) -> Header {
    Header {
        number: 0,
        time: config.genesis_timestamp,
        extra: vec![0u8; 32 + 65],
        ..Default::default()
    }
}

pub struct TestNet {
    pub config: Arc<AlienConfig>,
    pub engine: Arc<Alien>,
    pub chain: Arc<MemoryChain>,
    pub db: Arc<MemoryDatabase>,
    pub state: MemoryState,
    pub alloc: BTreeMap<Address, U256>,
    pub main_chain: Option<Arc<MockMainChain>>,
    keys: HashMap<Address, PrivateKey>,
    nonces: HashMap<Address, u64>,
}

impl TestNet {
    pub fn new(config: AlienConfig, keys: Vec<PrivateKey>, alloc: BTreeMap<Address, U256>) -> Self {
        let config = Arc::new(config);
        let db = Arc::new(MemoryDatabase::new());
        let engine = Arc::new(
            Alien::new(config.clone(), Some(alloc.clone()), db.clone() as Arc<dyn KeyValueStore>)
                .unwrap(),
        );
        let chain = Arc::new(MemoryChain::new(genesis_header(&config)));
        Self {
            config,
            engine,
            chain,
            db,
            state: MemoryState::new(alloc.clone()),
            alloc,
            main_chain: None,
            keys: keys.into_iter().map(|k| (k.address(), k)).collect(),
            nonces: HashMap::new(),
        }
    }

    /// A side chain following the rotation served by `main_chain`.
    pub fn side_chain(
        config: AlienConfig,
        keys: Vec<PrivateKey>,
        main_chain: Arc<MockMainChain>,
    ) -> Self {
        let mut net = Self::new(config, keys, BTreeMap::new());
        let engine = Alien::new(
            net.config.clone(),
            Some(BTreeMap::new()),
            net.db.clone() as Arc<dyn KeyValueStore>,
        )
        .unwrap()
        .with_main_chain(main_chain.clone() as Arc<dyn MainChainClient>);
        net.engine = Arc::new(engine);
        net.main_chain = Some(main_chain);
        net
    }

    pub fn sign_fn(&self, address: &Address) -> SignerFn {
        let secret = self.keys[address].to_bytes();
        Arc::new(
            move |_signer: Address, hash: &[u8; 32]| -> std::result::Result<[u8; 65], CryptoError> {
                let key = PrivateKey::from_bytes(&secret)?;
                Ok(key.sign_prehash(&H256::new(*hash))?.to_bytes())
            },
        )
    }

    pub fn private_key(&self, address: &Address) -> PrivateKey {
        self.keys[address].clone()
    }

    /// A second engine over a fresh database, for independent verification.
    pub fn verifier(&self) -> Alien {
        Alien::new(
            self.config.clone(),
            Some(self.alloc.clone()),
            Arc::new(MemoryDatabase::new()),
        )
        .unwrap()
    }

    pub fn head(&self) -> Header {
        self.chain.current_header().unwrap()
    }

    pub fn snapshot_at(&self, number: u64) -> Snapshot {
        let header = self.chain.header_by_number(number).unwrap();
        self.engine
            .snapshot(self.chain.as_ref(), number, header.hash(), &[])
            .unwrap()
    }

    pub fn tx(&mut self, from: &Address, to: Address, value: U256, data: &str) -> Transaction {
        let nonce = self.nonces.entry(*from).or_default();
        let tx = Transaction::new(*nonce, U256::ZERO, 100_000, to, value, data.as_bytes().to_vec());
        *nonce += 1;
        self.keys[from].sign_transaction(tx, self.config.chain_id).unwrap()
    }

    /// Rotation and loop start the next block will carry.
    pub fn next_queue(&self) -> (Vec<Address>, u64) {
        let parent = self.head();
        let number = parent.number + 1;
        let msc = self.config.max_signer_count;
        if number == 1 {
            let signers = &self.config.self_vote_signers;
            let queue = (0..msc as usize).map(|i| signers[i % signers.len()]).collect();
            return (queue, self.config.genesis_timestamp);
        }
        let parent_extra = HeaderExtra::from_header(&parent, &self.config).unwrap();
        if number % msc == 0 {
            let snap = self.snapshot_at(parent.number);
            (
                snap.create_signer_queue().unwrap(),
                parent_extra.loop_start_time + self.config.period * msc,
            )
        } else {
            (parent_extra.signer_queue, parent_extra.loop_start_time)
        }
    }

    /// The unsealed block the in-turn signer would produce next.
    pub async fn build(&mut self, txs: Vec<Transaction>) -> Result<Header> {
        let parent = self.head();
        let number = parent.number + 1;
        let time = self.config.genesis_timestamp + number * self.config.period;
        let coinbase = match &self.main_chain {
            Some(main_chain) => {
                let ms = main_chain.snapshot.lock().clone();
                in_turn_signer(&ms.signers, ms.loop_start_time, ms.period, time).unwrap()
            }
            None => {
                let (queue, loop_start) = self.next_queue();
                in_turn_signer(&queue, loop_start, self.config.period, time).unwrap()
            }
        };

        for tx in &txs {
            if !tx.value.is_zero() {
                let from = recover_sender(tx).unwrap();
                let to = tx.to.unwrap();
                self.state.sub_balance(&from, tx.value);
                self.state.add_balance(&to, tx.value);
            }
        }
        let receipts: Vec<Receipt> = txs
            .iter()
            .map(|tx| Receipt::new(tx.hash(), ReceiptStatus::Success, 21_000))
            .collect();

        let header = Header {
            parent_hash: parent.hash(),
            number,
            time,
            coinbase,
            extra: vec![0u8; 32 + 65],
            ..Default::default()
        };
        let block = self
            .engine
            .finalize(self.chain.as_ref(), header, &mut self.state, txs, receipts)
            .await?;
        Ok(block.header)
    }

    pub fn sign(&self, header: &mut Header) {
        let key = &self.keys[&header.coinbase];
        let hash = seal_hash(header).unwrap();
        let signature = key.sign_prehash(&hash).unwrap().to_bytes();
        write_seal(header, &signature).unwrap();
    }

    /// Builds, seals and inserts the next block.
    pub async fn advance(&mut self, txs: Vec<Transaction>) -> Header {
        let mut header = self.build(txs).await.unwrap();
        self.sign(&mut header);
        self.chain.insert(header.clone());
        header
    }

    pub async fn advance_to(&mut self, number: u64) {
        while self.head().number < number {
            self.advance(Vec::new()).await;
        }
    }

    pub fn headers(&self, from: u64, to: u64) -> Vec<Header> {
        (from..=to)
            .map(|n| self.chain.header_by_number(n).unwrap())
            .collect()
    }
}

/// Main chain stub handing out a fixed snapshot.
#[derive(Default)]
pub struct MockMainChain {
    pub snapshot: Mutex<MainChainSnapshot>,
    pub sent: Mutex<Vec<Vec<u8>>>,
    pub nonce: u64,
}

#[async_trait]
impl MainChainClient for MockMainChain {
    async fn snapshot_by_header_time(&self, _time: u64, _sc_hash: H256) -> Result<MainChainSnapshot> {
        Ok(self.snapshot.lock().clone())
    }

    async fn send_raw_transaction(&self, raw: Vec<u8>) -> Result<H256> {
        let hash = H256::keccak256(&raw);
        self.sent.lock().push(raw);
        Ok(hash)
    }

    async fn transaction_count(&self, _address: Address) -> Result<u64> {
        Ok(self.nonce)
    }
}

pub fn tally_sum(snap: &Snapshot) -> BTreeMap<Address, U256> {
    let mut sums: BTreeMap<Address, U256> = BTreeMap::new();
    for vote in snap.votes.values() {
        *sums.entry(vote.candidate).or_default() += vote.stake;
    }
    sums.retain(|_, s| !s.is_zero());
    sums
}
