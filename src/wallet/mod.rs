pub mod manager;
pub mod persister;
pub mod types;
