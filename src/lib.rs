pub mod alerts;
pub mod analyzers;
pub mod config;
pub mod dataset;
pub mod error;
pub mod fetch;
pub mod geo;
pub mod history;
pub mod output;
pub mod parser;
pub mod search;
pub mod session;
pub mod simulator;
