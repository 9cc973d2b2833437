pub mod config;
pub mod connection;
pub mod connection_tx_storage;
pub mod gateway;
pub mod relay;
pub mod session;
pub mod store;
