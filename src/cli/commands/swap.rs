use crate::cli::display::{
    create_progress_bar, describe_swap_step, follow_session, PoolDisplay,
};
use crate::cli::{Runtime, SwapArgs};
use crate::core::{AgentError, AgentResult, SwapParams, SWAP_FEE_TIER, SWAP_SLIPPAGE_BPS};
use crate::quotes::QuoteCalculator;
use crate::utils::parse_units;
use colored::*;
use dialoguer::{theme::ColorfulTheme, Confirm};
use log::warn;

pub async fn execute(args: SwapArgs, runtime: &Runtime) -> AgentResult<()> {
    println!("{}", "🚀 Agent Swap".bold().cyan());
    if runtime.simulated {
        println!("{}", "(simulated chain)".dimmed());
    }

    // Preview at the current price; the session re-quotes when it runs.
    let pb = create_progress_bar("Fetching quote...");
    let preview = runtime
        .pools()
        .get_pool_snapshot(args.token_in, args.token_out, SWAP_FEE_TIER)
        .await;
    pb.finish_and_clear();

    match preview.and_then(|lookup| lookup.into_result()) {
        Ok(pool) => {
            let quote = pool
                .token(args.token_in)
                .and_then(|token| parse_units(&args.amount, token.decimals).ok())
                .and_then(|amount| {
                    QuoteCalculator::new(runtime.ctx.math.clone()).compute_quote(
                        Some(&pool),
                        args.token_in,
                        amount,
                        SWAP_SLIPPAGE_BPS,
                    )
                });
            if let Some(quote) = quote {
                PoolDisplay::display_quote(&quote, &pool);
            }
        }
        Err(e) => warn!("Quote preview unavailable: {}", e),
    }

    let proceed = if args.yes {
        true
    } else {
        Confirm::with_theme(&ColorfulTheme::default())
            .with_prompt("Do you want to proceed with this swap?")
            .default(false)
            .interact()
            .map_err(|e| AgentError::InvalidInput(e.to_string()))?
    };

    if !proceed {
        println!("{}", "❌ Swap cancelled".yellow());
        return Ok(());
    }

    let orchestrator = runtime.swaps();
    let pb = create_progress_bar("Starting swap...");
    let progress = follow_session(orchestrator.subscribe(), pb.clone(), describe_swap_step);

    let params = SwapParams::new(args.token_in, args.token_out, args.amount);
    let session = orchestrator.call_swap(params).await;
    progress.abort();
    pb.finish_and_clear();
    let session = session?;

    if args.json {
        let json = serde_json::to_string_pretty(&session)
            .map_err(|e| AgentError::InvalidInput(e.to_string()))?;
        println!("{}", json);
    } else {
        PoolDisplay::display_swap_session(&session);
    }

    Ok(())
}
