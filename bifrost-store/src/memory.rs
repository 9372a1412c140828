use crate::repo::{ApiRepository, ConsumerRepository, CorsRepository, ServiceRepository, StoreResult, TokenRepository};
use async_trait::async_trait;
use bifrost_core::{BifrostError, Consumer, CorsPolicy, Route, Service, Token};
use dashmap::DashMap;
use std::sync::{Arc, RwLock};
use tracing::debug;

/// Default in-process store backend. Zero-latency, not persisted across
/// restarts — the `memory` variant of `data.type`.
#[derive(Default)]
pub struct MemoryStore {
    consumers: DashMap<String, Consumer>,
    tokens: DashMap<String, Token>,
    apis: DashMap<String, Route>,
    services: DashMap<String, Arc<Service>>,
    cors: RwLock<CorsPolicy>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ConsumerRepository for MemoryStore {
    async fn get(&self, id: &str) -> StoreResult<Option<Consumer>> {
        Ok(self.consumers.get(id).map(|e| e.clone()))
    }

    async fn get_by_username(&self, app: &str, username: &str) -> StoreResult<Option<Consumer>> {
        Ok(self
            .consumers
            .iter()
            .find(|e| e.app == app && e.username == username)
            .map(|e| e.clone()))
    }

    async fn insert(&self, consumer: Consumer) -> StoreResult<()> {
        debug!(id = %consumer.id, "inserting consumer");
        self.consumers.insert(consumer.id.clone(), consumer);
        Ok(())
    }

    async fn update(&self, consumer: Consumer) -> StoreResult<()> {
        self.consumers.insert(consumer.id.clone(), consumer);
        Ok(())
    }

    async fn delete(&self, id: &str) -> StoreResult<()> {
        self.consumers.remove(id);
        Ok(())
    }

    async fn count(&self, app: &str) -> StoreResult<u64> {
        Ok(self.consumers.iter().filter(|e| e.app == app).count() as u64)
    }
}

#[async_trait]
impl TokenRepository for MemoryStore {
    async fn get(&self, key: &str) -> StoreResult<Option<Token>> {
        Ok(self.tokens.get(key).map(|e| e.clone()))
    }

    async fn get_by_consumer_id(&self, consumer_id: &str) -> StoreResult<Option<Token>> {
        Ok(self
            .tokens
            .iter()
            .find(|e| e.consumer_id == consumer_id)
            .map(|e| e.clone()))
    }

    async fn insert(&self, token: Token) -> StoreResult<()> {
        self.tokens.insert(token.id.clone(), token);
        Ok(())
    }

    async fn update(&self, token: Token) -> StoreResult<()> {
        self.tokens.insert(token.id.clone(), token);
        Ok(())
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        self.tokens.remove(key);
        Ok(())
    }

    async fn delete_by_consumer_id(&self, consumer_id: &str) -> StoreResult<()> {
        self.tokens.retain(|_, t| t.consumer_id != consumer_id);
        Ok(())
    }
}

#[async_trait]
impl ApiRepository for MemoryStore {
    async fn get(&self, id: &str) -> StoreResult<Option<Route>> {
        Ok(self.apis.get(id).map(|e| e.clone()))
    }

    async fn get_by_name(&self, name: &str) -> StoreResult<Option<Route>> {
        Ok(self.apis.iter().find(|e| e.name == name).map(|e| e.clone()))
    }

    async fn get_all(&self) -> StoreResult<Vec<Route>> {
        Ok(self.apis.iter().map(|e| e.clone()).collect())
    }

    async fn insert(&self, route: Route) -> StoreResult<()> {
        self.apis.insert(route.id.clone(), route);
        Ok(())
    }

    async fn update(&self, route: Route) -> StoreResult<()> {
        self.apis.insert(route.id.clone(), route);
        Ok(())
    }

    async fn delete(&self, id: &str) -> StoreResult<()> {
        self.apis.remove(id);
        Ok(())
    }
}

#[async_trait]
impl ServiceRepository for MemoryStore {
    async fn get(&self, id: &str) -> StoreResult<Option<Arc<Service>>> {
        Ok(self.services.get(id).map(|e| e.clone()))
    }

    async fn get_by_name(&self, name: &str) -> StoreResult<Option<Arc<Service>>> {
        Ok(self.services.iter().find(|e| e.name == name).map(|e| e.clone()))
    }

    async fn get_all(&self) -> StoreResult<Vec<Arc<Service>>> {
        Ok(self.services.iter().map(|e| e.clone()).collect())
    }

    async fn insert(&self, service: Service) -> StoreResult<()> {
        self.services.insert(service.id.clone(), Arc::new(service));
        Ok(())
    }

    async fn delete(&self, id: &str) -> StoreResult<()> {
        self.services.remove(id);
        Ok(())
    }
}

#[async_trait]
impl CorsRepository for MemoryStore {
    async fn get(&self) -> StoreResult<CorsPolicy> {
        Ok(self
            .cors
            .read()
            .map_err(|_| BifrostError::Unknown("cors lock poisoned".into()))?
            .clone())
    }

    async fn put(&self, policy: CorsPolicy) -> StoreResult<()> {
        *self
            .cors
            .write()
            .map_err(|_| BifrostError::Unknown("cors lock poisoned".into()))? = policy;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bifrost_core::service::Upstream;
    use chrono::Duration;

    fn consumer(id: &str, app: &str, username: &str) -> Consumer {
        Consumer {
            id: id.to_string(),
            app: app.to_string(),
            username: username.to_string(),
            custom_id: String::new(),
            roles: Default::default(),
            custom_fields: Default::default(),
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        }
    }

    #[tokio::test]
    async fn consumer_roundtrip_by_id_and_username() {
        let store = MemoryStore::new();
        ConsumerRepository::insert(&store, consumer("c1", "acme", "alice")).await.unwrap();
        assert!(ConsumerRepository::get(&store, "c1").await.unwrap().is_some());
        assert!(ConsumerRepository::get_by_username(&store, "acme", "alice")
            .await
            .unwrap()
            .is_some());
        assert!(ConsumerRepository::get(&store, "missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn consumer_count_is_scoped_by_app() {
        let store = MemoryStore::new();
        ConsumerRepository::insert(&store, consumer("c1", "acme", "alice")).await.unwrap();
        ConsumerRepository::insert(&store, consumer("c2", "acme", "bob")).await.unwrap();
        ConsumerRepository::insert(&store, consumer("c3", "other", "carol")).await.unwrap();
        assert_eq!(ConsumerRepository::count(&store, "acme").await.unwrap(), 2);
        assert_eq!(ConsumerRepository::count(&store, "other").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn token_lookup_by_consumer_id_and_delete() {
        let store = MemoryStore::new();
        let token = Token::new("tok1", "c1", Duration::minutes(10));
        TokenRepository::insert(&store, token).await.unwrap();
        assert!(TokenRepository::get(&store, "tok1").await.unwrap().is_some());
        assert!(TokenRepository::get_by_consumer_id(&store, "c1").await.unwrap().is_some());
        TokenRepository::delete(&store, "tok1").await.unwrap();
        assert!(TokenRepository::get(&store, "tok1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn delete_by_consumer_id_removes_all_matching_tokens() {
        let store = MemoryStore::new();
        TokenRepository::insert(&store, Token::new("t1", "c1", Duration::minutes(10))).await.unwrap();
        TokenRepository::insert(&store, Token::new("t2", "c1", Duration::minutes(10))).await.unwrap();
        TokenRepository::insert(&store, Token::new("t3", "c2", Duration::minutes(10))).await.unwrap();
        TokenRepository::delete_by_consumer_id(&store, "c1").await.unwrap();
        assert!(TokenRepository::get(&store, "t1").await.unwrap().is_none());
        assert!(TokenRepository::get(&store, "t3").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn service_insert_preserves_upstream_state() {
        let store = MemoryStore::new();
        let service = Service::new("s1", "svc", vec![Upstream::new("u1", "http://u1.local")]);
        ServiceRepository::insert(&store, service).await.unwrap();
        let fetched = ServiceRepository::get(&store, "s1").await.unwrap().unwrap();
        assert_eq!(fetched.upstreams().len(), 1);
        fetched.pick_upstream();
        let fetched_again = ServiceRepository::get(&store, "s1").await.unwrap().unwrap();
        assert_eq!(fetched_again.upstreams()[0].total_requests, 1);
    }

    #[tokio::test]
    async fn cors_policy_defaults_empty_then_updatable() {
        let store = MemoryStore::new();
        let initial = CorsRepository::get(&store).await.unwrap();
        assert!(!initial.allows("https://a.example"));
        let mut policy = CorsPolicy::default();
        policy.allowed_origins.insert("*".to_string());
        CorsRepository::put(&store, policy).await.unwrap();
        assert!(CorsRepository::get(&store).await.unwrap().allows("anything"));
    }

    #[tokio::test]
    async fn not_found_lookups_return_ok_none_never_error() {
        let store = MemoryStore::new();
        assert!(ApiRepository::get(&store, "missing").await.unwrap().is_none());
        assert!(ServiceRepository::get(&store, "missing").await.unwrap().is_none());
    }
}
