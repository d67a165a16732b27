pub mod quote_client;
pub mod quote_provider;

pub use quote_client::*;
pub use quote_provider::*;
