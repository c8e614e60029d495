use crate::cli::{display::create_progress_bar, display::PoolDisplay, PoolArgs, Runtime};
use crate::core::AgentResult;
use crate::discovery::PoolLookup;
use colored::*;

pub async fn execute(args: PoolArgs, runtime: &Runtime) -> AgentResult<()> {
    let pb = create_progress_bar("Looking up pool...");
    let lookup = runtime
        .pools()
        .get_pool_snapshot(args.token_a, args.token_b, args.fee)
        .await;
    pb.finish_and_clear();

    match lookup? {
        PoolLookup::Ready(pool) => PoolDisplay::display_pool(&pool),
        PoolLookup::Pending(token) => {
            println!(
                "{} {:?}",
                "⏳ Token metadata not yet available for".yellow(),
                token
            );
        }
        PoolLookup::NotFound(message) => {
            println!("{}", format!("❌ {}", message).red().bold());
        }
    }

    Ok(())
}
