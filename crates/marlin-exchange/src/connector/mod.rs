//! 거래소 커넥터.

pub mod coinbase;
pub mod kraken;

pub use coinbase::{CoinbaseClient, CoinbaseConfig};
pub use kraken::{KrakenClient, KrakenConfig};
