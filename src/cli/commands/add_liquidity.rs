use crate::cli::display::{
    create_progress_bar, describe_liquidity_step, follow_session, PoolDisplay,
};
use crate::cli::{AddLiquidityArgs, Runtime};
use crate::core::{AgentError, AgentResult, LiquidityParams, LIQUIDITY_FEE_TIER};
use crate::utils::fee_tier_percent;
use colored::*;
use dialoguer::{theme::ColorfulTheme, Confirm};

pub async fn execute(args: AddLiquidityArgs, runtime: &Runtime) -> AgentResult<()> {
    println!("{}", "🌊 Agent Add Liquidity".bold().cyan());
    if runtime.simulated {
        println!("{}", "(simulated chain)".dimmed());
    }

    println!(
        "  {} of {:?} + {} of {:?} into the {} pool, ±100 ticks around the current price",
        args.amount_a,
        args.token_a,
        args.amount_b,
        args.token_b,
        fee_tier_percent(LIQUIDITY_FEE_TIER)
    );

    let proceed = if args.yes {
        true
    } else {
        Confirm::with_theme(&ColorfulTheme::default())
            .with_prompt("Do you want to add this liquidity?")
            .default(false)
            .interact()
            .map_err(|e| AgentError::InvalidInput(e.to_string()))?
    };

    if !proceed {
        println!("{}", "❌ Add liquidity cancelled".yellow());
        return Ok(());
    }

    let orchestrator = runtime.liquidity();
    let pb = create_progress_bar("Starting...");
    let progress = follow_session(orchestrator.subscribe(), pb.clone(), describe_liquidity_step);

    let params = LiquidityParams::new(args.token_a, args.amount_a, args.token_b, args.amount_b);
    let session = orchestrator.call_add_liquidity(params).await;
    progress.abort();
    pb.finish_and_clear();
    let session = session?;

    if args.json {
        let json = serde_json::to_string_pretty(&session)
            .map_err(|e| AgentError::InvalidInput(e.to_string()))?;
        println!("{}", json);
    } else {
        PoolDisplay::display_liquidity_session(&session);
    }

    Ok(())
}
