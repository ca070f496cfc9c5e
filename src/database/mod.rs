pub mod models;
pub mod pg;
pub mod pool;
pub mod store;

pub use pg::PgStore;
pub use store::{Store, StoreError};
