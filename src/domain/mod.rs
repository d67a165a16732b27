pub mod errors;
pub mod pnl;
pub mod portfolio;
pub mod position;

pub use errors::*;
pub use pnl::*;
pub use portfolio::*;
pub use position::*;
