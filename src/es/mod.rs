pub mod client;
pub mod mapping;
pub mod memory;
pub mod store;

pub use client::{ElasticsearchStore, create_client};
pub use memory::{MemoryStore, StoreCall, StoreOperation};
pub use store::{IndexStatus, SchemaStore};
