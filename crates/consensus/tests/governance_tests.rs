//! Votes, proposals and side-chain registration driven through real blocks.

mod common;

use alien_config::{AlienConfig, CandidateMode};
use alien_consensus::{ChainReader, HeaderExtra, SnapshotApi};
use alien_crypto::PrivateKey;
use alien_types::{Address, H256, U256};
use common::{ether, key, tally_sum, test_config, TestNet};
use std::collections::BTreeMap;
use std::sync::Arc;

const MSC: u64 = 3;

struct Parties {
    a: Address,
    b: Address,
    c: Address,
    d: Address,
}

fn parties() -> Parties {
    Parties {
        a: key(1).address(),
        b: key(2).address(),
        c: key(3).address(),
        d: key(4).address(),
    }
}

fn keys() -> Vec<PrivateKey> {
    (1..=4).map(key).collect()
}

fn open_net(c_balance: u64) -> (TestNet, Parties) {
    let p = parties();
    let alloc = BTreeMap::from([
        (p.a, U256::from(100u64)),
        (p.b, U256::from(200u64)),
        (p.c, U256::from(c_balance)),
    ]);
    (TestNet::new(test_config(MSC, &[p.a, p.b]), keys(), alloc), p)
}

fn gated_config(signers: &[Address]) -> AlienConfig {
    AlienConfig {
        candidate_mode: CandidateMode::Gated,
        ..test_config(MSC, signers)
    }
}

fn gated_net() -> (TestNet, Parties) {
    let p = parties();
    let alloc = BTreeMap::from([
        (p.a, ether(20_000)),
        (p.b, ether(40_000)),
        (p.c, ether(50_000)),
    ]);
    (TestNet::new(gated_config(&[p.a, p.b]), keys(), alloc), p)
}

const VOTE: &str = "ufo:1:event:vote";

fn declare(hash: H256, yes: bool) -> String {
    format!(
        "ufo:1:event:declare:hash:{}:decision:{}",
        hash.to_hex(),
        if yes { "yes" } else { "no" }
    )
}

// =============================================================================
// Voting
// =============================================================================

#[tokio::test]
async fn test_vote_moves_stake_to_candidate() {
    let (mut net, p) = open_net(200);
    net.advance_to(2).await;
    let vote = net.tx(&p.c, p.d, U256::ZERO, VOTE);
    net.advance(vec![vote]).await;

    let snap = net.snapshot_at(3);
    let expected = BTreeMap::from([
        (p.a, U256::from(100u64)),
        (p.b, U256::from(200u64)),
        (p.d, U256::from(200u64)),
    ]);
    assert_eq!(snap.tally, expected);
    assert_eq!(snap.tally, tally_sum(&snap));
    assert_eq!(snap.voters.get(&p.c), Some(&3));
    assert!(snap.is_candidate(&p.d));

    net.advance_to(5).await;
    let queue = net.snapshot_at(5).create_signer_queue().unwrap();
    assert_eq!(queue.len(), MSC as usize);
    assert!(queue.contains(&p.d));
}

#[tokio::test]
async fn test_vote_below_minimum_balance_ignored() {
    let (mut net, p) = open_net(20);
    net.advance_to(2).await;
    let before = net.snapshot_at(2).tally;
    let vote = net.tx(&p.c, p.d, U256::ZERO, VOTE);
    let header = net.advance(vec![vote]).await;

    let extra = HeaderExtra::from_header(&header, &net.config).unwrap();
    assert!(extra.current_block_votes.is_empty());
    let snap = net.snapshot_at(3);
    assert_eq!(snap.tally, before);
    assert!(!snap.tally.contains_key(&p.d));
    assert!(!snap.is_voter(&p.c));

    net.advance_to(5).await;
    let queue = net.snapshot_at(5).create_signer_queue().unwrap();
    assert!(!queue.contains(&p.d));
}

#[tokio::test]
async fn test_revote_replaces_previous_vote() {
    let (mut net, p) = open_net(200);
    net.advance_to(1).await;
    let first = net.tx(&p.c, p.d, U256::ZERO, VOTE);
    net.advance(vec![first]).await;
    let second = net.tx(&p.c, p.a, U256::ZERO, VOTE);
    net.advance(vec![second]).await;

    let snap = net.snapshot_at(3);
    assert!(!snap.tally.contains_key(&p.d));
    assert_eq!(snap.tally.get(&p.a), Some(&U256::from(300u64)));
    assert_eq!(snap.votes[&p.c].candidate, p.a);
    assert_eq!(snap.voters.get(&p.c), Some(&3));
}

#[tokio::test]
async fn test_transfer_updates_voter_stake() {
    let (mut net, p) = open_net(200);
    net.advance_to(1).await;
    let vote = net.tx(&p.c, p.d, U256::ZERO, VOTE);
    net.advance(vec![vote]).await;

    let transfer = net.tx(&p.c, Address::new([9; 20]), U256::from(50u64), "");
    let header = net.advance(vec![transfer]).await;
    let extra = HeaderExtra::from_header(&header, &net.config).unwrap();
    let update = extra
        .modify_predecessor_votes
        .iter()
        .find(|v| v.voter == p.c)
        .expect("stake update for the sender");
    assert_eq!(update.stake, U256::from(150u64));

    let snap = net.snapshot_at(3);
    assert_eq!(snap.tally.get(&p.d), Some(&U256::from(150u64)));
    assert_eq!(snap.votes[&p.c].candidate, p.d);
    assert_eq!(snap.tally, tally_sum(&snap));
}

#[tokio::test]
async fn test_confirmations_raise_confirmed_number() {
    let p = parties();
    let alloc = BTreeMap::from([
        (p.a, U256::from(100u64)),
        (p.b, U256::from(100u64)),
        (p.c, U256::from(100u64)),
    ]);
    let mut net = TestNet::new(test_config(MSC, &[p.a, p.b, p.c]), keys(), alloc);
    net.advance_to(3).await;

    // two of three is not more than two thirds
    let confirm = "ufo:1:event:confirm:3";
    let txs = vec![
        net.tx(&p.a, p.a, U256::ZERO, confirm),
        net.tx(&p.b, p.b, U256::ZERO, confirm),
    ];
    let header = net.advance(txs).await;
    let extra = HeaderExtra::from_header(&header, &net.config).unwrap();
    assert_eq!(extra.current_block_confirmations.len(), 2);
    assert_eq!(extra.confirmed_block_number, 0);

    let txs = vec![
        net.tx(&p.c, p.c, U256::ZERO, "ufo:1:event:confirm:4"),
        net.tx(&p.a, p.a, U256::ZERO, "ufo:1:event:confirm:4"),
        net.tx(&p.b, p.b, U256::ZERO, "ufo:1:event:confirm:4"),
    ];
    let header = net.advance(txs).await;
    let extra = HeaderExtra::from_header(&header, &net.config).unwrap();
    assert_eq!(extra.confirmed_block_number, 4);
    let snap = net.snapshot_at(5);
    assert_eq!(snap.confirmed_number, 4);
    assert_eq!(snap.confirmations[&4].len(), 3);

    // a signer outside the queue cannot confirm
    let stranger = net.tx(&p.d, p.d, U256::ZERO, "ufo:1:event:confirm:5");
    let header = net.advance(vec![stranger]).await;
    let extra = HeaderExtra::from_header(&header, &net.config).unwrap();
    assert!(extra.current_block_confirmations.is_empty());
    assert_eq!(extra.confirmed_block_number, 4);
}

// =============================================================================
// Proposals
// =============================================================================

async fn propose_candidate(net: &mut TestNet, p: &Parties) -> H256 {
    net.advance_to(3).await;
    let payload = format!(
        "ufo:1:event:proposal:proposal_type:1:candidate:{}:vlcnt:12",
        p.d.to_hex()
    );
    let tx = net.tx(&p.a, p.a, U256::ZERO, &payload);
    let hash = tx.hash();
    let balance = net.state.balances()[&p.a];
    let header = net.advance(vec![tx]).await;

    let extra = HeaderExtra::from_header(&header, &net.config).unwrap();
    assert_eq!(extra.current_block_proposals.len(), 1);
    let proposal = &extra.current_block_proposals[0];
    assert_eq!(proposal.hash, hash);
    assert_eq!(proposal.target_address, p.d);
    assert_eq!(proposal.current_deposit, ether(10_000));
    assert!(net.state.balances()[&p.a] < balance);
    hash
}

#[tokio::test]
async fn test_proposal_passes_with_super_majority() {
    let (mut net, p) = gated_net();
    let hash = propose_candidate(&mut net, &p).await;

    let txs = vec![
        net.tx(&p.a, p.a, U256::ZERO, &declare(hash, true)),
        net.tx(&p.b, p.b, U256::ZERO, &declare(hash, true)),
    ];
    net.advance(txs).await;
    assert_eq!(net.snapshot_at(5).proposals[&hash].declares.len(), 2);

    // open until 4 + 12 * 3
    net.advance_to(41).await;
    assert!(net.snapshot_at(40).proposals.contains_key(&hash));
    assert!(!net.snapshot_at(40).is_candidate(&p.d));
    let snap = net.snapshot_at(41);
    assert!(!snap.proposals.contains_key(&hash));
    assert!(snap.is_candidate(&p.d));
    assert_eq!(snap.proposal_refund[&47][&p.a], ether(10_000));

    let vote = net.tx(&p.c, p.d, U256::ZERO, VOTE);
    net.advance(vec![vote]).await;
    assert_eq!(net.snapshot_at(42).tally.get(&p.d), Some(&ether(50_000)));

    net.advance_to(44).await;
    let queue = net.snapshot_at(44).create_signer_queue().unwrap();
    assert!(queue.contains(&p.d));
}

#[tokio::test]
async fn test_proposal_fails_without_super_majority() {
    let (mut net, p) = gated_net();
    let hash = propose_candidate(&mut net, &p).await;

    let txs = vec![
        net.tx(&p.a, p.a, U256::ZERO, &declare(hash, true)),
        net.tx(&p.b, p.b, U256::ZERO, &declare(hash, false)),
    ];
    net.advance(txs).await;

    net.advance_to(41).await;
    let snap = net.snapshot_at(41);
    assert!(!snap.proposals.contains_key(&hash));
    assert!(!snap.is_candidate(&p.d));
    // the deposit comes back either way
    assert_eq!(snap.proposal_refund[&47][&p.a], ether(10_000));

    let vote = net.tx(&p.c, p.d, U256::ZERO, VOTE);
    let header = net.advance(vec![vote]).await;
    let extra = HeaderExtra::from_header(&header, &net.config).unwrap();
    assert!(extra.current_block_votes.is_empty());
    assert!(!net.snapshot_at(42).tally.contains_key(&p.d));
}

#[tokio::test]
async fn test_deposit_refunded_after_delay() {
    let (mut net, p) = gated_net();
    let hash = propose_candidate(&mut net, &p).await;
    net.advance_to(46).await;
    let before = net.state.balances()[&p.a];
    let header = net.advance(Vec::new()).await;
    assert_eq!(header.number, 47);

    // the refund lands on top of whatever A earned as sealer or voter
    assert!(net.state.balances()[&p.a] >= before + ether(10_000));
    assert!(!net.snapshot_at(47).proposal_refund.contains_key(&47));
    assert!(!net.snapshot_at(47).proposals.contains_key(&hash));
}

#[tokio::test]
async fn test_non_candidate_cannot_propose_or_declare() {
    let (mut net, p) = gated_net();
    net.advance_to(3).await;
    let payload = format!(
        "ufo:1:event:proposal:proposal_type:1:candidate:{}",
        p.d.to_hex()
    );
    let tx = net.tx(&p.c, p.c, U256::ZERO, &payload);
    let header = net.advance(vec![tx]).await;
    let extra = HeaderExtra::from_header(&header, &net.config).unwrap();
    assert!(extra.current_block_proposals.is_empty());

    let hash = propose_candidate(&mut net, &p).await;
    let tx = net.tx(&p.c, p.c, U256::ZERO, &declare(hash, true));
    let header = net.advance(vec![tx]).await;
    let extra = HeaderExtra::from_header(&header, &net.config).unwrap();
    assert!(extra.current_block_declares.is_empty());
}

// =============================================================================
// Side chains on the main chain
// =============================================================================

#[tokio::test]
async fn test_side_chain_registration_and_rewards() {
    let (mut net, p) = gated_net();
    let sc_coinbase = key(4).address();
    let sc_hash = H256::keccak256(b"side chain genesis");

    net.advance_to(3).await;
    let payload = format!(
        "ufo:1:event:proposal:proposal_type:4:schash:{}:vlcnt:12:sccount:1:screward:100",
        sc_hash.to_hex()
    );
    let tx = net.tx(&p.a, p.a, U256::ZERO, &payload);
    let hash = tx.hash();
    net.advance(vec![tx]).await;
    let txs = vec![
        net.tx(&p.a, p.a, U256::ZERO, &declare(hash, true)),
        net.tx(&p.b, p.b, U256::ZERO, &declare(hash, true)),
    ];
    net.advance(txs).await;
    net.advance_to(41).await;
    let snap = net.snapshot_at(41);
    assert!(snap.is_side_chain(&sc_hash));
    assert_eq!(snap.sc_records[&sc_hash].reward_per_period, 100);

    // the fee must cover a block reward
    let setcb = format!("ufo:1:sc:setcb:{}", sc_hash.to_hex());
    let cheap = net.tx(&p.b, sc_coinbase, ether(1), &setcb);
    let paid = net.tx(&p.a, sc_coinbase, ether(12), &setcb);
    net.advance(vec![cheap, paid]).await;
    let snap = net.snapshot_at(42);
    assert!(snap.is_side_chain_coinbase(&sc_hash, &sc_coinbase));
    assert_eq!(snap.sc_coinbase[&p.a][&sc_hash], sc_coinbase);
    assert!(!snap.sc_coinbase.contains_key(&p.b));

    let api = SnapshotApi::new(net.engine.clone(), net.chain.clone());
    let view = api
        .get_snapshot_by_header_time(net.head().time, sc_hash)
        .unwrap();
    assert!(view.signers.contains(&sc_coinbase));
    assert!(!view.signers.contains(&p.a));

    let report = format!(
        "ufo:1:sc:confirm:{}:30:{}",
        sc_hash.to_hex(),
        sc_coinbase.to_hex()
    );
    let tx = net.tx(&sc_coinbase, sc_coinbase, U256::ZERO, &report);
    net.advance(vec![tx]).await;
    let record = &net.snapshot_at(43).sc_records[&sc_hash];
    assert_eq!(record.record[&30].len(), 1);
    assert_eq!(record.max_header_number, 30);

    // settled at the loop end
    net.advance_to(44).await;
    let record = &net.snapshot_at(44).sc_records[&sc_hash];
    assert_eq!(record.last_confirmed_number, 30);
    assert_eq!(record.scores[&44][&sc_coinbase], 100);

    let before = net.state.balances()[&sc_coinbase];
    net.advance(Vec::new()).await;
    assert!(net.state.balances()[&sc_coinbase] > before);

    // the whole history replays on a fresh node
    let verifier = Arc::new(net.verifier());
    let chain: Arc<dyn ChainReader> = net.chain.clone();
    let (_abort, mut results) = verifier.verify_headers(chain, net.headers(1, 45));
    while let Some(result) = results.recv().await {
        result.unwrap();
    }
}
