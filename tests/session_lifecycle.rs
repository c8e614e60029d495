mod common;

use agent_swap::chain::WalletContext;
use agent_swap::core::{AgentError, LiquidityParams, SwapParams, TxKind};
use agent_swap::orchestrator::{
    LiquidityOrchestrator, LiquidityStep, SwapOrchestrator, SwapSession, SwapStep,
};
use common::{token_a, token_b, Harness};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::timeout;

fn swap_params() -> SwapParams {
    SwapParams::new(token_a(), token_b(), "1")
}

/// Waits until the session has broadcast a transaction of `kind`.
async fn until_submitted(mut rx: watch::Receiver<SwapSession>, kind: TxKind) -> SwapSession {
    let session = timeout(
        Duration::from_secs(5),
        rx.wait_for(|s| s.transactions.iter().any(|tx| tx.kind == kind)),
    )
    .await
    .expect("transaction was never submitted")
    .expect("session channel closed")
    .clone();
    session
}

#[tokio::test]
async fn test_second_call_rejected_while_in_flight() {
    let harness = Harness::new();
    harness.chain.hold_next(TxKind::Approve);
    let swaps = Arc::new(harness.swaps());

    let first = {
        let swaps = swaps.clone();
        tokio::spawn(async move { swaps.call_swap(swap_params()).await })
    };
    let pending = until_submitted(swaps.subscribe(), TxKind::Approve).await;
    assert_eq!(pending.step, SwapStep::Approving);

    let second = swaps.call_swap(swap_params()).await;
    assert!(matches!(second, Err(AgentError::SessionInFlight(_))));

    harness.chain.release();
    let done = first.await.unwrap().unwrap();
    assert_eq!(done.step, SwapStep::Complete);
    assert_eq!(done.id, pending.id);
}

#[tokio::test]
async fn test_reset_abandons_held_transaction() {
    let harness = Harness::new();
    harness.chain.hold_next(TxKind::Approve);
    let swaps = Arc::new(harness.swaps());

    let flow = {
        let swaps = swaps.clone();
        tokio::spawn(async move { swaps.call_swap(swap_params()).await })
    };
    let pending = until_submitted(swaps.subscribe(), TxKind::Approve).await;

    let idle = swaps.reset_swap();
    assert_eq!(idle.step, SwapStep::Idle);
    assert_ne!(idle.id, pending.id);

    harness.chain.release();
    let returned = flow.await.unwrap().unwrap();
    assert_eq!(returned, idle);
    assert_eq!(swaps.session(), idle);
    assert!(harness.chain.submissions_of(TxKind::Swap).is_empty());

    // a fresh session starts cleanly and re-reads the allowance
    let reads = harness.chain.allowance_reads();
    let next = swaps.call_swap(swap_params()).await.unwrap();
    assert_eq!(next.step, SwapStep::Complete);
    assert!(next.id > idle.id);
    assert_eq!(harness.chain.allowance_reads(), reads + 1);
    assert!(next.approve_tx_hash().is_none());
}

#[tokio::test]
async fn test_reset_caller_never_sees_the_next_session() {
    let harness = Harness::new();
    harness.chain.hold_next(TxKind::Approve);
    let swaps = Arc::new(harness.swaps());

    let first = {
        let swaps = swaps.clone();
        tokio::spawn(async move { swaps.call_swap(swap_params()).await })
    };
    let abandoned = until_submitted(swaps.subscribe(), TxKind::Approve).await;
    let idle = swaps.reset_swap();

    harness.chain.hold_next(TxKind::Approve);
    let second = {
        let swaps = swaps.clone();
        tokio::spawn(async move { swaps.call_swap(swap_params()).await })
    };
    let running = until_submitted(swaps.subscribe(), TxKind::Approve).await;
    assert!(running.id > idle.id);

    let returned = first.await.unwrap().unwrap();
    assert_eq!(returned, idle);
    assert_ne!(returned.id, abandoned.id);

    harness.chain.release();
    let done = second.await.unwrap().unwrap();
    assert_eq!(done.id, running.id);
    assert_eq!(done.step, SwapStep::Complete);
}

#[tokio::test]
async fn test_disconnect_mid_flow_fails_session() {
    let harness = Harness::new();
    harness.chain.hold_next(TxKind::Approve);
    let swaps = Arc::new(harness.swaps());

    let flow = {
        let swaps = swaps.clone();
        tokio::spawn(async move { swaps.call_swap(swap_params()).await })
    };
    until_submitted(swaps.subscribe(), TxKind::Approve).await;

    harness.wallet.disconnect();
    harness.chain.release();

    let session = flow.await.unwrap().unwrap();
    assert_eq!(session.step, SwapStep::Error);
    assert!(matches!(
        session.last_error,
        Some(AgentError::ConnectionLost(_))
    ));
    assert!(harness.chain.submissions_of(TxKind::Swap).is_empty());
}

#[tokio::test]
async fn test_chain_switch_mid_flow_fails_liquidity_session() {
    let harness = Harness::new();
    harness.chain.hold_next(TxKind::Approve);
    let liquidity: Arc<LiquidityOrchestrator> = Arc::new(harness.liquidity());
    let mut rx = liquidity.subscribe();

    let flow = {
        let liquidity = liquidity.clone();
        tokio::spawn(async move {
            liquidity
                .call_add_liquidity(LiquidityParams::new(token_a(), "1", token_b(), "1"))
                .await
        })
    };
    timeout(
        Duration::from_secs(5),
        rx.wait_for(|s| !s.transactions.is_empty()),
    )
    .await
    .unwrap()
    .unwrap();

    harness.wallet.switch_chain(10);
    harness.chain.release();

    let session = flow.await.unwrap().unwrap();
    assert_eq!(session.step, LiquidityStep::Error);
    assert!(matches!(
        session.last_error,
        Some(AgentError::ConnectionLost(_))
    ));
    assert!(harness.chain.submissions_of(TxKind::AddLiquidity).is_empty());
    // a lost connection is not an on-chain revert
    assert!(harness.wallet.address().is_some());
}

#[tokio::test]
async fn test_finished_session_can_be_followed_by_another() {
    let harness = Harness::new();
    let swaps: SwapOrchestrator = harness.swaps();

    let first = swaps.call_swap(swap_params()).await.unwrap();
    let second = swaps.call_swap(swap_params()).await.unwrap();

    assert_eq!(first.step, SwapStep::Complete);
    assert_eq!(second.step, SwapStep::Complete);
    assert!(second.id > first.id);
    // the first approval covered exactly one swap's input
    assert_eq!(harness.chain.submissions_of(TxKind::Approve).len(), 2);
}
