// Library surface exists for integration tests; amped ships as a binary.
pub mod cli;
pub mod config;
pub mod context;
pub mod cookie;
pub mod decision_service;
pub mod error;
pub mod logging;
pub mod page;
pub mod router;
pub mod selector;
pub mod server;
pub mod variants;
