//! Test-chain controls against a local anvil.
//!
//! Requires `anvil` on PATH: `cargo test --test chain_fixture -- --ignored`

use alloy::node_bindings::{Anvil, AnvilInstance};
use alloy::providers::{Provider, ProviderBuilder};
use hyperdrive_bots::ChainClient;

fn connect(anvil: &AnvilInstance) -> ChainClient {
    ChainClient::from_provider(ProviderBuilder::new().connect_http(anvil.endpoint_url()).erased())
}

#[tokio::test]
#[ignore]
async fn test_mine_blocks_advances_number_and_time() {
    let anvil = Anvil::new().try_spawn().expect("anvil on PATH");
    let chain = connect(&anvil);

    for (count, interval) in [(1u64, 12u64), (5, 12), (3, 3600)] {
        let before = chain.current_block().await.unwrap();
        chain.mine_blocks(count, interval).await.unwrap();
        let after = chain.current_block().await.unwrap();

        assert_eq!(after.number, before.number + count);
        assert_eq!(after.timestamp, before.timestamp + count * interval);
    }
}

#[tokio::test]
#[ignore]
async fn test_snapshot_and_revert() {
    let anvil = Anvil::new().try_spawn().expect("anvil on PATH");
    let chain = connect(&anvil);

    let start = chain.block_number().await.unwrap();
    let snapshot = chain.snapshot().await.unwrap();
    chain.mine_blocks(10, 1).await.unwrap();
    assert_eq!(chain.block_number().await.unwrap(), start + 10);

    chain.revert_to(snapshot).await.unwrap();
    assert_eq!(chain.block_number().await.unwrap(), start);
}

#[tokio::test]
#[ignore]
async fn test_automine_detected() {
    let anvil = Anvil::new().try_spawn().expect("anvil on PATH");
    assert!(connect(&anvil).automine().await);

    let interval = Anvil::new().block_time(1).try_spawn().expect("anvil on PATH");
    assert!(!connect(&interval).automine().await);
}
