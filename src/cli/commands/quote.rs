use crate::cli::{display::create_progress_bar, display::PoolDisplay, QuoteArgs, Runtime};
use crate::core::{AgentError, AgentResult};
use crate::quotes::QuoteCalculator;
use crate::utils::parse_units;
use colored::*;
use console::style;
use log::info;

pub async fn execute(args: QuoteArgs, runtime: &Runtime) -> AgentResult<()> {
    println!("{}", "💱 Uniswap V3 Quote".bold().cyan());
    let pb = create_progress_bar("Fetching pool state...");

    let pool = runtime
        .pools()
        .get_pool_snapshot(args.token_in, args.token_out, args.fee)
        .await
        .and_then(|lookup| lookup.into_result());
    pb.finish_and_clear();
    let pool = pool?;

    let token_in = pool
        .token(args.token_in)
        .ok_or_else(|| AgentError::InvalidInput("Input token is not in the pool".to_string()))?;
    let amount_in = parse_units(&args.amount, token_in.decimals)?;

    let calculator = QuoteCalculator::new(runtime.ctx.math.clone());
    match calculator.compute_quote(Some(&pool), args.token_in, amount_in, args.slippage) {
        Some(quote) => {
            info!(
                "Quoted {} -> {} (min {})",
                quote.input_amount, quote.estimated_output, quote.minimum_output
            );
            println!("\n{}", style("📊 Quote").bold().underlined());
            PoolDisplay::display_quote(&quote, &pool);
        }
        None => {
            println!("{}", "❌ No quote available for this amount".red().bold());
        }
    }

    Ok(())
}
