pub mod adapters;
pub mod error;
pub mod gateway;
pub mod types;

pub use gateway::{Session, SessionGateway};
