pub mod kv;

pub use kv::{KvRow, NewKvRow};
