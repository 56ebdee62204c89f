//! End-to-end tests: RocksDB store, tokio timer and JSON-RPC over a real node.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use jsonrpsee::core::client::{ClientT, Error as ClientError};
use jsonrpsee::http_client::{HttpClient, HttpClientBuilder};
use jsonrpsee::rpc_params;

use airdrop_campaign::campaign::{CampaignInfo, Withdrawal};
use airdrop_core::merkle::MerkleTree;
use airdrop_core::params::CampaignParams;
use airdrop_core::state::CampaignState;
use airdrop_core::tier::TierTable;
use airdrop_core::types::{ClaimReceipt, ClaimRecord, Identity, Tier};
use airdrop_node_lib::rpc::{ClaimRequest, StatusJson, ALREADY_CLAIMED, INELIGIBLE_CLAIM};
use airdrop_node_lib::{start_rpc_server, Node, NodeConfig, NodeError};

fn id(b: u8) -> Identity {
    Identity([b; 32])
}

fn allowlist() -> MerkleTree {
    let entries: Vec<(Identity, Tier)> = vec![(id(1), 0), (id(2), 1), (id(3), 2)];
    MerkleTree::from_allowlist(&entries)
}

fn write_params(dir: &Path, tree: &MerkleTree) -> std::path::PathBuf {
    let params = CampaignParams {
        tier_table: TierTable::new(vec![vec![1000, 800, 650], vec![600, 480, 390]]).unwrap(),
        total_epochs: 2,
        epoch_length_secs: 3_600,
        start_delay_secs: 0,
        root_hash: tree.root(),
        initial_escrow: 10_000,
        token_name: "DROP".into(),
    };
    let path = dir.join("params.json");
    std::fs::write(&path, serde_json::to_string_pretty(&params).unwrap()).unwrap();
    path
}

fn config(dir: &Path, params_file: Option<std::path::PathBuf>, admin: bool) -> NodeConfig {
    NodeConfig {
        data_dir: dir.join("data"),
        rpc_port: 0,
        params_file,
        admin_rpc: admin,
        ..NodeConfig::default()
    }
}

async fn wait_open(node: &Node) {
    for _ in 0..200 {
        if node.campaign().status() == CampaignState::Open {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("claim window never opened");
}

async fn serve(node: Arc<Node>) -> (HttpClient, jsonrpsee::server::ServerHandle) {
    let addr = node.config().rpc_addr();
    let (local, handle) = start_rpc_server(&addr, node).await.unwrap();
    let client = HttpClientBuilder::default()
        .build(format!("http://{local}"))
        .unwrap();
    (client, handle)
}

fn claim_request(tree: &MerkleTree, who: Identity, tier: Tier) -> ClaimRequest {
    ClaimRequest {
        identity: who.to_string(),
        tier,
        proof: tree.proof_for(&who, tier).unwrap(),
    }
}

fn call_code(err: ClientError) -> i32 {
    match err {
        ClientError::Call(obj) => obj.code(),
        other => panic!("expected call error, got {other:?}"),
    }
}

// --- Start-up ---

#[tokio::test(flavor = "multi_thread")]
async fn start_without_params_or_store_fails() {
    let dir = tempfile::tempdir().unwrap();
    let result = Node::new(config(dir.path(), None, false));
    assert!(matches!(result, Err(NodeError::Config(_))));
}

#[tokio::test(flavor = "multi_thread")]
async fn window_opens_on_wall_clock() {
    let dir = tempfile::tempdir().unwrap();
    let tree = allowlist();
    let params = write_params(dir.path(), &tree);
    let node = Node::new(config(dir.path(), Some(params), false)).unwrap();
    wait_open(&node).await;
    assert_eq!(node.campaign().current_epoch(), 0);
    node.shutdown();
}

// --- RPC ---

#[tokio::test(flavor = "multi_thread")]
async fn claim_over_rpc() {
    let dir = tempfile::tempdir().unwrap();
    let tree = allowlist();
    let params = write_params(dir.path(), &tree);
    let node = Node::new(config(dir.path(), Some(params), false)).unwrap();
    wait_open(&node).await;
    let (client, handle) = serve(Arc::clone(&node)).await;

    let status: StatusJson = client.request("airdrop_getStatus", rpc_params![]).await.unwrap();
    assert!(status.claim_window_open);
    assert_eq!(status.total_epochs, 2);

    let receipt: ClaimReceipt = client
        .request("airdrop_claim", rpc_params![claim_request(&tree, id(2), 1)])
        .await
        .unwrap();
    assert_eq!(receipt.amount, 800);
    assert_eq!(node.seats().balance_of(&id(2)), 800);

    let err = client
        .request::<ClaimReceipt, _>("airdrop_claim", rpc_params![claim_request(&tree, id(2), 1)])
        .await
        .unwrap_err();
    assert_eq!(call_code(err), ALREADY_CLAIMED);

    // id(1) is tier 0; asserting tier 1 with its own proof fails.
    let mut forged = claim_request(&tree, id(1), 0);
    forged.tier = 1;
    let err = client
        .request::<ClaimReceipt, _>("airdrop_claim", rpc_params![forged])
        .await
        .unwrap_err();
    assert_eq!(call_code(err), INELIGIBLE_CLAIM);

    let record: Option<ClaimRecord> = client
        .request("airdrop_getClaim", rpc_params![id(2).to_string()])
        .await
        .unwrap();
    assert_eq!(record.unwrap().amount_paid, 800);

    let info: CampaignInfo = client.request("airdrop_getInfo", rpc_params![]).await.unwrap();
    assert_eq!(info.claim_count, 1);
    assert_eq!(info.escrow.balance, 9_200);

    handle.stop().unwrap();
    node.shutdown();
}

#[tokio::test(flavor = "multi_thread")]
async fn admin_methods_hidden_by_default() {
    let dir = tempfile::tempdir().unwrap();
    let tree = allowlist();
    let params = write_params(dir.path(), &tree);
    let node = Node::new(config(dir.path(), Some(params), false)).unwrap();
    let (client, handle) = serve(Arc::clone(&node)).await;

    let err = client
        .request::<u64, _>("airdrop_depositEscrow", rpc_params![500u64])
        .await
        .unwrap_err();
    assert_eq!(call_code(err), -32601);

    handle.stop().unwrap();
    node.shutdown();
}

#[tokio::test(flavor = "multi_thread")]
async fn admin_methods_manage_escrow() {
    let dir = tempfile::tempdir().unwrap();
    let tree = allowlist();
    let params = write_params(dir.path(), &tree);
    let node = Node::new(config(dir.path(), Some(params), true)).unwrap();
    let (client, handle) = serve(Arc::clone(&node)).await;

    let balance: u64 = client
        .request("airdrop_depositEscrow", rpc_params![500u64])
        .await
        .unwrap();
    assert_eq!(balance, 10_500);

    let withdrawal: Withdrawal = client
        .request("airdrop_createPayment", rpc_params![10_000u64])
        .await
        .unwrap();
    assert_eq!(withdrawal.escrow_remaining, 500);

    let err = client
        .request::<Withdrawal, _>("airdrop_createPayment", rpc_params![501u64])
        .await
        .unwrap_err();
    assert_eq!(call_code(err), airdrop_node_lib::rpc::INSUFFICIENT_ESCROW);

    handle.stop().unwrap();
    node.shutdown();
}

// --- Restart ---

#[tokio::test(flavor = "multi_thread")]
async fn restart_restores_claims_and_state() {
    let dir = tempfile::tempdir().unwrap();
    let tree = allowlist();
    let params = write_params(dir.path(), &tree);
    {
        let node = Node::new(config(dir.path(), Some(params), false)).unwrap();
        wait_open(&node).await;
        let proof = tree.proof_for(&id(3), 2).unwrap();
        node.campaign().make_claim(id(3), 2, &proof).await.unwrap();
        node.shutdown();
    }

    let node = Node::new(config(dir.path(), None, false)).unwrap();
    let info = node.campaign().info();
    assert_eq!(info.state, CampaignState::Open);
    assert_eq!(info.incarnation, 2);
    assert_eq!(info.claim_count, 1);
    assert_eq!(info.escrow.total_paid, 650);

    let proof = tree.proof_for(&id(3), 2).unwrap();
    assert!(node.campaign().make_claim(id(3), 2, &proof).await.is_err());
    node.shutdown();
}
