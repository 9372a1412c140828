pub mod memory;
pub mod repo;

pub use memory::MemoryStore;
pub use repo::{ApiRepository, ConsumerRepository, CorsRepository, ServiceRepository, StoreResult, TokenRepository};
