use async_trait::async_trait;
use bifrost_core::{BifrostError, Consumer, CorsPolicy, Route, Service, Token};
use std::sync::Arc;

/// All repositories return `Ok(None)` for "not found" — never an error.
/// An error return means the store itself failed (I/O, serialization,
/// connectivity), not that the record is absent.
pub type StoreResult<T> = Result<T, BifrostError>;

#[async_trait]
pub trait ConsumerRepository: Send + Sync {
    async fn get(&self, id: &str) -> StoreResult<Option<Consumer>>;
    async fn get_by_username(&self, app: &str, username: &str) -> StoreResult<Option<Consumer>>;
    async fn insert(&self, consumer: Consumer) -> StoreResult<()>;
    async fn update(&self, consumer: Consumer) -> StoreResult<()>;
    async fn delete(&self, id: &str) -> StoreResult<()>;
    async fn count(&self, app: &str) -> StoreResult<u64>;
}

#[async_trait]
pub trait TokenRepository: Send + Sync {
    async fn get(&self, key: &str) -> StoreResult<Option<Token>>;
    async fn get_by_consumer_id(&self, consumer_id: &str) -> StoreResult<Option<Token>>;
    async fn insert(&self, token: Token) -> StoreResult<()>;
    async fn update(&self, token: Token) -> StoreResult<()>;
    async fn delete(&self, key: &str) -> StoreResult<()>;
    async fn delete_by_consumer_id(&self, consumer_id: &str) -> StoreResult<()>;
}

#[async_trait]
pub trait ApiRepository: Send + Sync {
    async fn get(&self, id: &str) -> StoreResult<Option<Route>>;
    async fn get_by_name(&self, name: &str) -> StoreResult<Option<Route>>;
    async fn get_all(&self) -> StoreResult<Vec<Route>>;
    async fn insert(&self, route: Route) -> StoreResult<()>;
    async fn update(&self, route: Route) -> StoreResult<()>;
    async fn delete(&self, id: &str) -> StoreResult<()>;
}

#[async_trait]
pub trait ServiceRepository: Send + Sync {
    async fn get(&self, id: &str) -> StoreResult<Option<Arc<Service>>>;
    async fn get_by_name(&self, name: &str) -> StoreResult<Option<Arc<Service>>>;
    async fn get_all(&self) -> StoreResult<Vec<Arc<Service>>>;
    async fn insert(&self, service: Service) -> StoreResult<()>;
    async fn delete(&self, id: &str) -> StoreResult<()>;
}

#[async_trait]
pub trait CorsRepository: Send + Sync {
    async fn get(&self) -> StoreResult<CorsPolicy>;
    async fn put(&self, policy: CorsPolicy) -> StoreResult<()>;
}
