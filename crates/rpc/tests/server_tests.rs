//! The `alien` namespace over HTTP, and the main-chain client talking to it.

use alien_config::AlienConfig;
use alien_consensus::{
    Alien, AlienError, ChainReader, MainChainClient, MemoryChain, SnapshotApi,
};
use alien_rpc::{start_server, AlienApiClient, HttpMainChainClient};
use alien_storage::MemoryDatabase;
use alien_types::{Address, Header, H256, U256};
use async_trait::async_trait;
use jsonrpsee::core::RpcResult;
use jsonrpsee::http_client::HttpClientBuilder;
use jsonrpsee::proc_macros::rpc;
use jsonrpsee::server::ServerBuilder;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

const GENESIS_TIME: u64 = 1_600_000_000;

fn signer(n: u8) -> Address {
    Address::new([n; 20])
}

fn snapshot_api() -> (SnapshotApi, Header) {
    let config = Arc::new(AlienConfig {
        period: 3,
        max_signer_count: 3,
        min_voter_balance: "50".to_string(),
        genesis_timestamp: GENESIS_TIME,
        self_vote_signers: vec![signer(1), signer(2)],
        chain_id: 7,
        ..Default::default()
    });
    let alloc = BTreeMap::from([
        (signer(1), U256::from(100u64)),
        (signer(2), U256::from(200u64)),
    ]);
    let engine = Alien::new(config, Some(alloc), Arc::new(MemoryDatabase::new())).unwrap();
    let genesis = Header {
        number: 0,
        time: GENESIS_TIME,
        extra: vec![0u8; 32 + 65],
        ..Default::default()
    };
    let chain = Arc::new(MemoryChain::new(genesis.clone()));
    (
        SnapshotApi::new(Arc::new(engine), chain as Arc<dyn ChainReader>),
        genesis,
    )
}

fn any_port() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 0))
}

#[tokio::test]
async fn test_snapshot_queries() {
    let (api, genesis) = snapshot_api();
    let server = start_server(any_port(), api).await.unwrap();
    let addr = server.local_addr().unwrap();
    let client = HttpClientBuilder::default()
        .build(format!("http://{addr}"))
        .unwrap();

    let head = client.get_snapshot(None).await.unwrap();
    assert_eq!(head.number, 0);
    assert_eq!(head.hash, genesis.hash());
    assert_eq!(head.signers, vec![signer(1), signer(2), signer(1)]);
    assert_eq!(head.tally[&signer(2)], U256::from(200u64));

    let by_hash = client.get_snapshot_at_hash(genesis.hash()).await.unwrap();
    assert_eq!(by_hash.tally, head.tally);

    let by_number = client.get_snapshot_at_number(0).await.unwrap();
    assert_eq!(by_number.signers, head.signers);
}

#[tokio::test]
async fn test_missing_block_is_not_found() {
    let (api, _) = snapshot_api();
    let server = start_server(any_port(), api).await.unwrap();
    let addr = server.local_addr().unwrap();
    let client = HttpClientBuilder::default()
        .build(format!("http://{addr}"))
        .unwrap();

    let err = client.get_snapshot_at_number(5).await.unwrap_err();
    match err {
        jsonrpsee::core::ClientError::Call(obj) => {
            assert_eq!(obj.code(), -32001);
            assert_eq!(obj.message(), "Block not found");
        }
        other => panic!("unexpected error {other:?}"),
    }

    let err = client
        .get_snapshot_at_hash(H256::keccak256(b"nowhere"))
        .await
        .unwrap_err();
    assert!(matches!(err, jsonrpsee::core::ClientError::Call(obj) if obj.code() == -32001));
}

#[tokio::test]
async fn test_server_stop() {
    let (api, _) = snapshot_api();
    let mut server = start_server(any_port(), api).await.unwrap();
    assert!(server.is_running());
    server.stop().unwrap();
    assert!(!server.is_running());
    assert!(server.stop().is_err());
}

#[tokio::test]
async fn test_main_chain_client_reads_rotation() {
    let (api, _) = snapshot_api();
    let server = start_server(any_port(), api).await.unwrap();
    let addr = server.local_addr().unwrap();

    let client =
        HttpMainChainClient::connect(&format!("http://{addr}"), Duration::from_millis(300)).unwrap();
    let sc_hash = H256::keccak256(b"side chain");
    let snap = client
        .snapshot_by_header_time(GENESIS_TIME + 100, sc_hash)
        .await
        .unwrap();
    assert_eq!(snap.number, 0);
    assert_eq!(snap.period, 3);
    assert_eq!(snap.loop_start_time, GENESIS_TIME);
    // no coinbase registered, so the main-chain signers are reported as is
    assert_eq!(snap.signers, vec![signer(1), signer(2), signer(1)]);
    assert!(snap.sc_notices.is_empty());
}

// =============================================================================
// Main-chain transaction methods
// =============================================================================

#[rpc(server, namespace = "eth")]
trait EthStub {
    #[method(name = "getTransactionCount")]
    async fn get_transaction_count(&self, address: Address, block: String) -> RpcResult<String>;

    #[method(name = "sendRawTransaction")]
    async fn send_raw_transaction(&self, data: String) -> RpcResult<H256>;
}

#[derive(Default)]
struct EthStubImpl {
    queried: Mutex<Vec<(Address, String)>>,
    sent: Mutex<Vec<String>>,
}

#[async_trait]
impl EthStubServer for Arc<EthStubImpl> {
    async fn get_transaction_count(&self, address: Address, block: String) -> RpcResult<String> {
        self.queried.lock().push((address, block));
        Ok("0x2a".to_string())
    }

    async fn send_raw_transaction(&self, data: String) -> RpcResult<H256> {
        self.sent.lock().push(data.clone());
        Ok(H256::keccak256(data.as_bytes()))
    }
}

#[tokio::test]
async fn test_main_chain_client_transactions() {
    let stub = Arc::new(EthStubImpl::default());
    let server = ServerBuilder::default().build(any_port()).await.unwrap();
    let addr = server.local_addr().unwrap();
    let _handle = server.start(stub.clone().into_rpc());

    let client =
        HttpMainChainClient::connect(&format!("http://{addr}"), Duration::from_millis(300)).unwrap();
    assert_eq!(client.transaction_count(signer(9)).await.unwrap(), 42);
    assert_eq!(
        stub.queried.lock().clone(),
        vec![(signer(9), "latest".to_string())]
    );

    let hash = client
        .send_raw_transaction(vec![0xde, 0xad, 0xbe, 0xef])
        .await
        .unwrap();
    assert_eq!(stub.sent.lock().clone(), vec!["0xdeadbeef".to_string()]);
    assert_eq!(hash, H256::keccak256(b"0xdeadbeef"));
}

// =============================================================================
// Failures
// =============================================================================

#[tokio::test]
async fn test_main_chain_timeout() {
    // accepts connections and never answers
    let listener = tokio::net::TcpListener::bind(any_port()).await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });

    let client =
        HttpMainChainClient::connect(&format!("http://{addr}"), Duration::from_millis(300)).unwrap();
    assert!(matches!(
        client.transaction_count(signer(1)).await,
        Err(AlienError::MainChainTimeout)
    ));
}

#[tokio::test]
async fn test_main_chain_unreachable() {
    let listener = tokio::net::TcpListener::bind(any_port()).await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client =
        HttpMainChainClient::connect(&format!("http://{addr}"), Duration::from_millis(300)).unwrap();
    assert!(matches!(
        client
            .snapshot_by_header_time(GENESIS_TIME, H256::keccak256(b"sc"))
            .await,
        Err(AlienError::MainChainUnavailable(_))
    ));
}
