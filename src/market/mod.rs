pub mod binance;
pub mod buffer;
pub mod socket;
pub mod types;
