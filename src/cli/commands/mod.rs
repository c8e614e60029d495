pub mod add_liquidity;
pub mod pool;
pub mod quote;
pub mod swap;
