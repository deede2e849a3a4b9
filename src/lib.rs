pub mod arbitration;
pub mod cli;
pub mod config;
pub mod evaluator;
pub mod filters;
pub mod logging;
pub mod observability;
pub mod protocol;
pub mod server;
pub mod solver;
