pub mod cost_basis;
pub mod leg_profitability;
pub mod ledger_codec;
pub mod open_book;
pub mod portfolio_aggregator;
pub mod position_aggregator;

pub use cost_basis::*;
pub use leg_profitability::*;
pub use ledger_codec::*;
pub use open_book::*;
pub use portfolio_aggregator::*;
pub use position_aggregator::*;
