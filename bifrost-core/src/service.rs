use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock};

/// A single backend endpoint within a service's upstream pool.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Upstream {
    pub name: String,
    pub target_url: String,
    #[serde(default)]
    pub count: u64,
    #[serde(default)]
    pub total_requests: u64,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub state: UpstreamState,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum UpstreamState {
    #[default]
    Healthy,
    Evicted,
}

impl Upstream {
    pub fn new(name: impl Into<String>, target_url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            target_url: target_url.into(),
            count: 0,
            total_requests: 0,
            updated_at: Utc::now(),
            state: UpstreamState::Healthy,
        }
    }
}

/// Wire shape for `Service` — the upstream list here is a plain, ordered
/// snapshot rather than the lock the live `Service` guards it with.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceDto {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub upstreams: Vec<Upstream>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

/// A named pool of upstreams sharing a round-robin load-balancing policy.
///
/// The upstream list is guarded by its own lock so that picking/registering
/// on one service never contends with another.
#[derive(Debug)]
pub struct Service {
    pub id: String,
    pub name: String,
    upstreams: RwLock<Vec<Upstream>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<ServiceDto> for Service {
    fn from(dto: ServiceDto) -> Self {
        Self {
            id: dto.id,
            name: dto.name,
            upstreams: RwLock::new(dto.upstreams),
            created_at: dto.created_at,
            updated_at: dto.updated_at,
        }
    }
}

impl From<&Service> for ServiceDto {
    fn from(svc: &Service) -> Self {
        Self {
            id: svc.id.clone(),
            name: svc.name.clone(),
            upstreams: svc.upstreams(),
            created_at: svc.created_at,
            updated_at: svc.updated_at,
        }
    }
}

impl Serialize for Service {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        ServiceDto::from(self).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Service {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        ServiceDto::deserialize(deserializer).map(Service::from)
    }
}

impl Clone for Service {
    fn clone(&self) -> Self {
        Self {
            id: self.id.clone(),
            name: self.name.clone(),
            upstreams: RwLock::new(self.upstreams.read().unwrap().clone()),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

impl Service {
    pub fn new(id: impl Into<String>, name: impl Into<String>, upstreams: Vec<Upstream>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            name: name.into(),
            upstreams: RwLock::new(upstreams),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn upstreams(&self) -> Vec<Upstream> {
        self.upstreams.read().unwrap().clone()
    }

    /// Update `target_url`/`updated_at` if `name` already exists, else append.
    pub fn register_upstream(&self, u: Upstream) {
        let mut list = self.upstreams.write().unwrap();
        if let Some(existing) = list.iter_mut().find(|e| e.name == u.name) {
            existing.target_url = u.target_url;
            existing.updated_at = Utc::now();
            existing.state = UpstreamState::Healthy;
        } else {
            list.push(u);
        }
    }

    /// Remove by `name`. Idempotent.
    pub fn unregister_upstream(&self, name: &str) {
        let mut list = self.upstreams.write().unwrap();
        list.retain(|u| u.name != name);
    }

    /// Round-robin selection with fairness-reset: scan for the first
    /// upstream with `count == 0`; if none, reset all counts and retry once.
    pub fn pick_upstream(&self) -> Option<Upstream> {
        let mut list = self.upstreams.write().unwrap();
        if list.is_empty() {
            return None;
        }
        if list.len() == 1 {
            list[0].count += 1;
            list[0].total_requests += 1;
            return Some(list[0].clone());
        }
        if let Some(picked) = pick_and_bump(&mut list) {
            return Some(picked);
        }
        for u in list.iter_mut() {
            u.count = 0;
        }
        pick_and_bump(&mut list)
    }
}

/// Atomically-swapped snapshot of the service list, read by every request
/// and replaced wholesale on admin reload (mirrors `RouteSet`).
pub struct ServiceSet {
    snapshot: ArcSwap<Vec<Arc<Service>>>,
}

impl ServiceSet {
    pub fn new(services: Vec<Arc<Service>>) -> Self {
        Self { snapshot: ArcSwap::new(Arc::new(services)) }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    pub fn reload(&self, services: Vec<Arc<Service>>) {
        self.snapshot.store(Arc::new(services));
    }

    pub fn snapshot(&self) -> Arc<Vec<Arc<Service>>> {
        self.snapshot.load_full()
    }

    pub fn get(&self, id: &str) -> Option<Arc<Service>> {
        self.snapshot.load().iter().find(|s| s.id == id).cloned()
    }

    pub fn get_by_name(&self, name: &str) -> Option<Arc<Service>> {
        self.snapshot.load().iter().find(|s| s.name == name).cloned()
    }
}

fn pick_and_bump(list: &mut [Upstream]) -> Option<Upstream> {
    for u in list.iter_mut() {
        if u.count == 0 {
            u.count += 1;
            u.total_requests += 1;
            return Some(u.clone());
        }
    }
    None
}
