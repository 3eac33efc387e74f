pub mod account;
pub mod cli;
pub mod coin;
pub mod config;
pub mod error;
pub mod param;
pub mod storage;
