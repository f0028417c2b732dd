//! Integration tests for block production and verification.

mod common;

use alien_consensus::{
    seal_hash, write_seal, Alien, AlienError, ChainReader, HeaderExtra, SignatureCache, Snapshot,
    SnapshotApi,
};
use alien_storage::KeyValueStore;
use alien_types::{Address, Block, Header, H256, U256};
use common::{ether, key, tally_sum, test_config, TestNet, PERIOD};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::oneshot;

const MSC: u64 = 3;

fn two_signer_net() -> (TestNet, Address, Address) {
    let (a, b) = (key(1).address(), key(2).address());
    let alloc = BTreeMap::from([(a, ether(100)), (b, ether(200))]);
    let net = TestNet::new(
        test_config(MSC, &[a, b]),
        vec![key(1), key(2), key(3)],
        alloc,
    );
    (net, a, b)
}

fn resign(header: &mut Header, signer: u8) {
    let hash = seal_hash(header).unwrap();
    let signature = key(signer).sign_prehash(&hash).unwrap().to_bytes();
    write_seal(header, &signature).unwrap();
}

// =============================================================================
// Chain building and verification
// =============================================================================

#[tokio::test]
async fn test_chain_verifies_on_fresh_engine() {
    let (mut net, _, _) = two_signer_net();
    net.advance_to(12).await;

    let verifier = Arc::new(net.verifier());
    let chain: Arc<dyn ChainReader> = net.chain.clone();
    let (_abort, mut results) = verifier.verify_headers(chain, net.headers(1, 12));
    for number in 1..=12u64 {
        let result = results.recv().await.expect("one result per header");
        assert!(result.is_ok(), "block {number}: {result:?}");
    }
    assert!(results.recv().await.is_none());
}

#[tokio::test]
async fn test_verify_headers_abort() {
    let (mut net, _, _) = two_signer_net();
    net.advance_to(4).await;

    let verifier = Arc::new(net.verifier());
    let chain: Arc<dyn ChainReader> = net.chain.clone();
    let (abort, mut results) = verifier.verify_headers(chain, net.headers(1, 4));
    abort.send(()).await.unwrap();
    assert!(results.recv().await.is_none());
}

#[tokio::test]
async fn test_history_ring_and_tally_hold_per_block() {
    let (mut net, _, _) = two_signer_net();
    for number in 1..=10u64 {
        net.advance(Vec::new()).await;
        let snap = net.snapshot_at(number);
        assert_eq!(snap.number, number);
        assert_eq!(
            snap.history_hash.len() as u64,
            (number + 1).min(2 * MSC),
            "block {number}"
        );
        assert_eq!(snap.history_hash.last(), Some(&snap.hash));
        assert_eq!(snap.tally, tally_sum(&snap));
    }
}

#[tokio::test]
async fn test_block_one_carries_genesis_votes() {
    let (mut net, a, b) = two_signer_net();
    let header = net.advance(Vec::new()).await;
    let extra = HeaderExtra::from_header(&header, &net.config).unwrap();

    assert_eq!(extra.loop_start_time, net.config.genesis_timestamp);
    assert_eq!(extra.signer_queue, vec![a, b, a]);
    let voters: Vec<Address> = extra.current_block_votes.iter().map(|v| v.voter).collect();
    assert_eq!(voters, vec![a, b]);

    let snap = net.snapshot_at(1);
    assert_eq!(snap.tally.get(&a), Some(&ether(100)));
    assert_eq!(snap.tally.get(&b), Some(&ether(200)));
    assert_eq!(snap.voters.get(&a), Some(&1));
}

#[tokio::test]
async fn test_rewards_credit_sealer() {
    let (mut net, _, _) = two_signer_net();
    let header = net.advance(Vec::new()).await;
    let before = net.alloc[&header.coinbase];
    assert!(net.state.balances()[&header.coinbase] > before);
}

// =============================================================================
// Header checks
// =============================================================================

#[tokio::test]
async fn test_structural_errors() {
    let (mut net, _, _) = two_signer_net();
    net.advance_to(3).await;
    let engine = net.verifier();
    let chain = net.chain.as_ref();
    let good = net.chain.header_by_number(3).unwrap();
    engine.verify_header(chain, &good, &[]).await.unwrap();

    let mut header = good.clone();
    header.mix_digest = H256::keccak256(b"mix");
    assert!(matches!(
        engine.verify_header(chain, &header, &[]).await,
        Err(AlienError::InvalidMixDigest)
    ));

    let mut header = good.clone();
    header.uncle_hash = H256::ZERO;
    assert!(matches!(
        engine.verify_header(chain, &header, &[]).await,
        Err(AlienError::InvalidUncleHash)
    ));

    let mut header = good.clone();
    header.time += 100_000;
    assert!(matches!(
        engine.verify_header(chain, &header, &[]).await,
        Err(AlienError::FutureBlock { .. })
    ));

    // less than a period ahead is still ahead
    let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_secs();
    let mut header = good.clone();
    header.time = now + 2;
    assert!(matches!(
        engine.verify_header(chain, &header, &[]).await,
        Err(AlienError::FutureBlock { time, .. }) if time == now + 2
    ));

    let mut header = good.clone();
    header.extra = vec![0u8; 10];
    assert!(matches!(
        engine.verify_header(chain, &header, &[]).await,
        Err(AlienError::MissingVanity)
    ));
    header.extra = vec![0u8; 40];
    assert!(matches!(
        engine.verify_header(chain, &header, &[]).await,
        Err(AlienError::MissingSignature)
    ));

    let mut header = good.clone();
    header.parent_hash = H256::keccak256(b"nowhere");
    assert!(matches!(
        engine.verify_header(chain, &header, &[]).await,
        Err(AlienError::UnknownAncestor)
    ));

    let mut header = good;
    header.time = net.chain.header_by_number(2).unwrap().time - 1;
    assert!(matches!(
        engine.verify_header(chain, &header, &[]).await,
        Err(AlienError::InvalidTimestamp)
    ));
}

#[tokio::test]
async fn test_seal_by_other_key_is_unauthorized() {
    let (mut net, _, _) = two_signer_net();
    net.advance_to(4).await;
    let mut header = net.chain.header_by_number(4).unwrap();
    resign(&mut header, 3);

    let engine = net.verifier();
    let err = engine
        .verify_header(net.chain.as_ref(), &header, &[])
        .await
        .unwrap_err();
    assert!(matches!(err, AlienError::Unauthorized(s) if s == key(3).address()));
}

#[tokio::test]
async fn test_out_of_turn_signer_rejected() {
    let (mut net, a, b) = two_signer_net();
    net.advance_to(1).await;

    // slot 2 of [A, B, A] belongs to A
    let mut header = net.build(Vec::new()).await.unwrap();
    assert_eq!(header.coinbase, a);
    header.coinbase = b;
    net.sign(&mut header);

    let engine = net.verifier();
    let err = engine
        .verify_header(net.chain.as_ref(), &header, &[])
        .await
        .unwrap_err();
    assert!(matches!(err, AlienError::Unauthorized(s) if s == b));
}

#[tokio::test]
async fn test_tampered_queue_rejected() {
    let (mut net, _, _) = two_signer_net();
    net.advance_to(6).await;
    let engine = net.verifier();
    let chain = net.chain.as_ref();
    let mut header = chain.header_by_number(6).unwrap();
    engine.verify_header(chain, &header, &[]).await.unwrap();

    let mut extra = HeaderExtra::from_header(&header, &net.config).unwrap();
    extra.signer_queue = vec![header.coinbase; MSC as usize];
    extra.write_to(&mut header, &net.config);
    net.sign(&mut header);
    assert!(matches!(
        engine.verify_header(chain, &header, &[]).await,
        Err(AlienError::InvalidSignerQueue)
    ));
}

#[tokio::test]
async fn test_outsider_cannot_rewrite_first_queue() {
    let (mut net, _, _) = two_signer_net();
    let outsider = key(3).address();
    let engine = net.verifier();

    let mut header = net.build(Vec::new()).await.unwrap();
    assert_eq!(header.number, 1);
    let mut honest = header.clone();
    net.sign(&mut honest);
    engine
        .verify_header(net.chain.as_ref(), &honest, &[])
        .await
        .unwrap();

    let mut extra = HeaderExtra::from_header(&header, &net.config).unwrap();
    extra.signer_queue = vec![outsider; MSC as usize];
    extra.write_to(&mut header, &net.config);
    header.coinbase = outsider;
    resign(&mut header, 3);
    assert!(matches!(
        engine.verify_header(net.chain.as_ref(), &header, &[]).await,
        Err(AlienError::InvalidSignerQueue)
    ));
}

#[tokio::test]
async fn test_first_loop_queues_checked() {
    let (mut net, _, _) = two_signer_net();
    net.advance_to(MSC).await;
    let engine = net.verifier();
    let chain = net.chain.as_ref();

    // blocks inside the first loop and the boundary block at MSC
    for number in 1..=MSC {
        let mut header = chain.header_by_number(number).unwrap();
        engine.verify_header(chain, &header, &[]).await.unwrap();

        let mut extra = HeaderExtra::from_header(&header, &net.config).unwrap();
        extra.signer_queue = vec![header.coinbase; MSC as usize];
        extra.write_to(&mut header, &net.config);
        net.sign(&mut header);
        assert!(
            matches!(
                engine.verify_header(chain, &header, &[]).await,
                Err(AlienError::InvalidSignerQueue)
            ),
            "block {number}"
        );
    }
}

#[tokio::test]
async fn test_wrong_loop_start_rejected() {
    let (mut net, _, _) = two_signer_net();
    net.advance_to(2).await;
    let engine = net.verifier();
    let chain = net.chain.as_ref();
    let mut header = chain.header_by_number(2).unwrap();

    let mut extra = HeaderExtra::from_header(&header, &net.config).unwrap();
    extra.loop_start_time -= PERIOD;
    extra.write_to(&mut header, &net.config);
    net.sign(&mut header);
    assert!(matches!(
        engine.verify_header(chain, &header, &[]).await,
        Err(AlienError::InvalidTimestamp)
    ));
}

#[tokio::test]
async fn test_verify_with_unstored_parents() {
    let (mut net, _, _) = two_signer_net();
    net.advance_to(7).await;
    let headers = net.headers(1, 7);

    // a chain that only knows genesis
    let bare = alien_consensus::MemoryChain::new(net.chain.header_by_number(0).unwrap());
    let engine = net.verifier();
    for i in 0..headers.len() {
        engine
            .verify_header(&bare, &headers[i], &headers[..i])
            .await
            .unwrap();
    }
}

// =============================================================================
// Snapshots
// =============================================================================

#[tokio::test]
async fn test_checkpoint_replay_matches_live_snapshot() {
    let (mut net, _, _) = two_signer_net();
    net.advance_to(365).await;

    let hash = net.chain.header_by_number(360).unwrap().hash();
    let stored = Snapshot::load(net.config.clone(), net.db.as_ref(), &hash)
        .unwrap()
        .expect("checkpoint at 360");
    assert_eq!(stored.number, 360);

    let replayed = stored
        .apply(&net.headers(361, 365), &SignatureCache::default())
        .unwrap();
    let live = net.snapshot_at(365);
    assert_eq!(
        serde_json::to_vec(&replayed).unwrap(),
        serde_json::to_vec(&live).unwrap()
    );

    // a node without genesis balances starts from the checkpoint
    let light = Alien::new(
        net.config.clone(),
        None,
        net.db.clone() as Arc<dyn KeyValueStore>,
    )
    .unwrap();
    let head = net.head();
    let from_disk = light
        .snapshot(net.chain.as_ref(), head.number, head.hash(), &[])
        .unwrap();
    assert_eq!(
        serde_json::to_vec(&from_disk).unwrap(),
        serde_json::to_vec(&live).unwrap()
    );
}

#[tokio::test]
async fn test_light_engine_needs_genesis_balances() {
    let (mut net, _, _) = two_signer_net();
    net.advance_to(2).await;
    let light = Alien::new(
        net.config.clone(),
        None,
        Arc::new(alien_storage::MemoryDatabase::new()),
    )
    .unwrap();
    let head = net.head();
    assert!(matches!(
        light.snapshot(net.chain.as_ref(), head.number, head.hash(), &[]),
        Err(AlienError::GenesisLightConfigMissing)
    ));
}

#[tokio::test]
async fn test_apply_is_associative() {
    let (mut net, _, _) = two_signer_net();
    net.advance_to(12).await;
    let genesis = net.snapshot_at(0);
    let cache = SignatureCache::default();

    let whole = genesis.apply(&net.headers(1, 12), &cache).unwrap();
    let split = genesis
        .apply(&net.headers(1, 5), &cache)
        .unwrap()
        .apply(&net.headers(6, 12), &cache)
        .unwrap();
    assert_eq!(
        serde_json::to_vec(&whole).unwrap(),
        serde_json::to_vec(&split).unwrap()
    );
    // the source snapshot is untouched
    assert_eq!(genesis.number, 0);
    assert_eq!(genesis.history_hash.len(), 1);
}

#[tokio::test]
async fn test_apply_rejects_bad_batches() {
    let (mut net, _, _) = two_signer_net();
    net.advance_to(3).await;
    let genesis = net.snapshot_at(0);
    let cache = SignatureCache::default();

    assert!(matches!(
        genesis.apply(&net.headers(2, 3), &cache),
        Err(AlienError::WrongAncestor {
            snapshot: 0,
            header: 2
        })
    ));
    let gapped = vec![
        net.chain.header_by_number(1).unwrap(),
        net.chain.header_by_number(3).unwrap(),
    ];
    assert!(matches!(
        genesis.apply(&gapped, &cache),
        Err(AlienError::NonContiguousBatch {
            expected: 2,
            actual: 3
        })
    ));
    assert_eq!(genesis.apply(&[], &cache).unwrap().number, 0);
}

// =============================================================================
// Prepare and seal
// =============================================================================

#[tokio::test]
async fn test_prepare_fills_consensus_fields() {
    let (mut net, a, _) = two_signer_net();
    net.advance_to(2).await;
    net.engine.authorize(a, net.sign_fn(&a));

    let parent = net.head();
    let mut header = Header {
        parent_hash: parent.hash(),
        number: parent.number + 1,
        extra: b"vanity".to_vec(),
        ..Default::default()
    };
    net.engine
        .prepare(net.chain.as_ref(), &mut header)
        .await
        .unwrap();
    assert_eq!(header.coinbase, a);
    assert!(header.time >= parent.time + PERIOD);
    assert_eq!(header.difficulty, U256::from(1u64));
    assert_eq!(header.extra.len(), 32 + 65);
    assert_eq!(&header.extra[..6], b"vanity");

    let mut orphan = Header {
        parent_hash: H256::keccak256(b"orphan"),
        number: 3,
        ..Default::default()
    };
    assert!(matches!(
        net.engine.prepare(net.chain.as_ref(), &mut orphan).await,
        Err(AlienError::UnknownAncestor)
    ));
    let mut genesis = Header::default();
    assert!(matches!(
        net.engine.prepare(net.chain.as_ref(), &mut genesis).await,
        Err(AlienError::UnknownBlock)
    ));
}

#[tokio::test]
async fn test_seal_in_turn_block() {
    let (mut net, _, _) = two_signer_net();
    net.advance_to(4).await;
    let header = net.build(Vec::new()).await.unwrap();
    let block = Block::new(header.clone(), Vec::new());

    let (_stop, stop_rx) = oneshot::channel();
    assert!(matches!(
        net.engine.seal(net.chain.as_ref(), block.clone(), stop_rx).await,
        Err(AlienError::SignerMissing)
    ));

    let other = if header.coinbase == key(1).address() {
        key(2).address()
    } else {
        key(1).address()
    };
    net.engine.authorize(other, net.sign_fn(&other));
    let (_stop, stop_rx) = oneshot::channel();
    assert!(matches!(
        net.engine.seal(net.chain.as_ref(), block.clone(), stop_rx).await,
        Err(AlienError::Unauthorized(s)) if s == other
    ));

    net.engine
        .authorize(header.coinbase, net.sign_fn(&header.coinbase));
    let (_stop, stop_rx) = oneshot::channel();
    let sealed = net
        .engine
        .seal(net.chain.as_ref(), block, stop_rx)
        .await
        .unwrap()
        .expect("sealed block");
    assert_eq!(net.engine.author(&sealed.header).unwrap(), header.coinbase);
    net.verifier()
        .verify_header(net.chain.as_ref(), &sealed.header, &[])
        .await
        .unwrap();
}

#[tokio::test]
async fn test_seal_stops_on_signal() {
    let (mut net, _, _) = two_signer_net();
    net.advance_to(1).await;
    let header = net.build(Vec::new()).await.unwrap();
    net.engine
        .authorize(header.coinbase, net.sign_fn(&header.coinbase));

    let (stop, stop_rx) = oneshot::channel();
    stop.send(()).unwrap();
    let result = net
        .engine
        .seal(net.chain.as_ref(), Block::new(header, Vec::new()), stop_rx)
        .await
        .unwrap();
    assert!(result.is_none());

    let (_stop, stop_rx) = oneshot::channel();
    assert!(matches!(
        net.engine
            .seal(net.chain.as_ref(), Block::new(Header::default(), Vec::new()), stop_rx)
            .await,
        Err(AlienError::UnknownBlock)
    ));
}

// =============================================================================
// Snapshot API
// =============================================================================

#[tokio::test]
async fn test_snapshot_api_queries() {
    let (mut net, a, b) = two_signer_net();
    net.advance_to(9).await;
    let api = SnapshotApi::new(net.engine.clone(), net.chain.clone());

    assert_eq!(api.get_snapshot(None).unwrap().number, 9);
    assert_eq!(api.get_snapshot_at_number(4).unwrap().number, 4);
    let five = net.chain.header_by_number(5).unwrap();
    assert_eq!(api.get_snapshot_at_hash(five.hash()).unwrap().hash, five.hash());
    assert!(matches!(
        api.get_snapshot_at_number(50),
        Err(AlienError::UnknownBlock)
    ));
    assert!(matches!(
        api.get_snapshot_at_hash(H256::keccak256(b"missing")),
        Err(AlienError::UnknownBlock)
    ));

    let sc_hash = H256::keccak256(b"side chain");
    let view = api.get_snapshot_by_header_time(five.time + 1, sc_hash).unwrap();
    assert_eq!(view.number, 5);
    assert_eq!(view.period, PERIOD);
    assert!(view.signers.iter().all(|s| *s == a || *s == b));
    assert!(view.sc_notices.is_empty());

    let view = api.get_snapshot_by_header_time(five.time, sc_hash).unwrap();
    assert_eq!(view.number, 5);
    let view = api
        .get_snapshot_by_header_time(net.head().time + 1_000, sc_hash)
        .unwrap();
    assert_eq!(view.number, 9);
    let view = api
        .get_snapshot_by_header_time(net.config.genesis_timestamp - 1, sc_hash)
        .unwrap();
    assert_eq!(view.number, 0);
}
