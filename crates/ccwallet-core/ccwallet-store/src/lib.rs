mod error;
mod models;
mod schema;
mod store;

pub use error::StoreError;
pub use models::KvRow;
pub use store::{MIGRATIONS, SqliteStore};

pub type Result<T> = std::result::Result<T, StoreError>;
