mod common;

use agent_swap::chain::{ContractCall, WalletContext};
use agent_swap::core::{AgentError, ConfirmationState, SwapParams, TxKind};
use agent_swap::orchestrator::SwapStep;
use common::{agent, ether, token_a, token_b, Harness};
use ethers::types::U256;
use pretty_assertions::assert_eq;
use test_case::test_case;

fn params(amount: &str) -> SwapParams {
    SwapParams::new(token_a(), token_b(), amount)
}

#[tokio::test]
async fn test_swap_approves_then_swaps() {
    let harness = Harness::new();
    let session = harness.swaps().call_swap(params("1")).await.unwrap();

    assert_eq!(session.step, SwapStep::Complete);
    assert!(session.last_error.is_none());

    let quote = session.quote.clone().unwrap();
    assert_eq!(quote.input_amount, ether(1));
    assert!(quote.estimated_output > U256::zero());
    assert!(quote.estimated_output < ether(1));
    assert_eq!(
        quote.minimum_output,
        quote.estimated_output * U256::from(9950) / U256::from(10_000)
    );

    let calls = harness.chain.submissions();
    assert_eq!(calls.len(), 2);
    assert_eq!(
        calls[0].call,
        ContractCall::Approve {
            token: token_a(),
            spender: agent(),
            amount: ether(1),
        }
    );
    match &calls[1].call {
        ContractCall::ExactInputSwap {
            agent: target,
            token_in,
            token_out,
            fee,
            amount_in,
            amount_out_minimum,
            deadline,
        } => {
            assert_eq!(*target, agent());
            assert_eq!((*token_in, *token_out, *fee), (token_a(), token_b(), 100));
            assert_eq!(*amount_in, ether(1));
            assert_eq!(*amount_out_minimum, quote.minimum_output);
            let now = chrono::Utc::now().timestamp() as u64;
            assert!(deadline.as_u64() > now + 590 && deadline.as_u64() <= now + 600);
        }
        other => panic!("expected a swap, got {:?}", other),
    }

    assert_eq!(session.approve_tx_hash(), Some(calls[0].hash));
    assert_eq!(session.swap_tx_hash(), Some(calls[1].hash));
    assert!(session
        .transactions
        .iter()
        .all(|tx| tx.confirmation_state == ConfirmationState::Confirmed));
}

#[tokio::test]
async fn test_existing_allowance_skips_approval() {
    let harness = Harness::new();
    harness
        .chain
        .set_allowance(token_a(), harness.signer, agent(), ether(5));

    let session = harness.swaps().call_swap(params("2")).await.unwrap();

    assert_eq!(session.step, SwapStep::Complete);
    assert_eq!(session.allowance, Some(ether(5)));
    assert!(harness.chain.submissions_of(TxKind::Approve).is_empty());
    assert_eq!(harness.chain.submissions_of(TxKind::Swap).len(), 1);
    assert!(session.approve_tx_hash().is_none());
}

#[tokio::test]
async fn test_rejected_approval_stops_before_swap() {
    let harness = Harness::new();
    harness.chain.reject_next(
        TxKind::Approve,
        "MetaMask Tx Signature: User denied transaction signature.",
    );

    let session = harness.swaps().call_swap(params("1")).await.unwrap();

    assert_eq!(session.step, SwapStep::Error);
    let error = session.last_error.clone().unwrap();
    assert!(matches!(error, AgentError::UserRejected(_)));
    assert_eq!(error.to_string(), "Transaction rejected by user");
    assert!(harness.chain.submissions().is_empty());
}

#[tokio::test]
async fn test_reverted_swap_keeps_hash() {
    let harness = Harness::new();
    harness.chain.revert_next(TxKind::Swap);

    let session = harness.swaps().call_swap(params("1")).await.unwrap();

    assert_eq!(session.step, SwapStep::Error);
    let hash = session.swap_tx_hash().unwrap();
    assert_eq!(
        session.transactions.last().unwrap().confirmation_state,
        ConfirmationState::Failed
    );
    match session.last_error.clone().unwrap() {
        AgentError::ExecutionReverted {
            hash: reverted,
            message,
        } => {
            assert_eq!(reverted, Some(hash));
            assert!(message.contains("execution reverted"));
        }
        other => panic!("expected a revert, got {:?}", other),
    }
    // the disconnect policy belongs to the liquidity flow
    assert!(harness.wallet.address().is_some());
}

#[tokio::test]
async fn test_zero_balance_swap_reverts_on_chain() {
    let harness = Harness::new();
    harness
        .chain
        .set_balance(token_a(), harness.signer, U256::zero());

    let session = harness.swaps().call_swap(params("1")).await.unwrap();

    assert_eq!(session.step, SwapStep::Error);
    assert_eq!(harness.chain.submissions_of(TxKind::Approve).len(), 1);
    assert_eq!(harness.chain.submissions_of(TxKind::Swap).len(), 1);
    assert!(matches!(
        session.last_error,
        Some(AgentError::ExecutionReverted { hash: Some(_), .. })
    ));
}

#[test_case("0"; "zero")]
#[test_case("-1"; "negative")]
#[test_case("abc"; "letters")]
#[test_case(""; "empty")]
#[test_case("+1"; "plus sign")]
#[test_case("1_0"; "digit separator")]
#[test_case("1e3"; "exponent")]
#[tokio::test]
async fn test_invalid_input_fails_without_chain_calls(amount: &str) {
    let harness = Harness::new();
    let session = harness.swaps().call_swap(params(amount)).await.unwrap();

    assert_eq!(session.step, SwapStep::Error);
    assert!(matches!(session.last_error, Some(AgentError::InvalidInput(_))));
    assert_eq!(harness.chain.reads(), 0);
    assert!(harness.chain.submissions().is_empty());
}

#[tokio::test]
async fn test_same_token_swap_is_invalid() {
    let harness = Harness::new();
    let same = harness
        .swaps()
        .call_swap(SwapParams::new(token_a(), token_a(), "1"))
        .await
        .unwrap();

    assert!(matches!(same.last_error, Some(AgentError::InvalidInput(_))));
    assert_eq!(harness.chain.reads(), 0);
    assert!(harness.chain.submissions().is_empty());
}

#[tokio::test]
async fn test_swap_requires_connected_wallet() {
    let harness = Harness::new();
    harness.wallet.disconnect();

    let session = harness.swaps().call_swap(params("1")).await.unwrap();

    assert_eq!(session.step, SwapStep::Error);
    assert_eq!(session.last_error, Some(AgentError::WalletNotConnected));
    assert!(harness.chain.submissions().is_empty());
}

#[tokio::test]
async fn test_missing_pool_names_fee_tier() {
    let harness = Harness::new();
    let mut request = params("1");
    request.fee_tier = Some(500);

    let session = harness.swaps().call_swap(request).await.unwrap();

    assert_eq!(session.step, SwapStep::Error);
    match session.last_error.unwrap() {
        AgentError::PoolNotFound(message) => assert!(message.contains("0.05%")),
        other => panic!("expected PoolNotFound, got {:?}", other),
    }
    assert!(harness.chain.submissions().is_empty());
}
