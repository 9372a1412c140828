//! Admin REST control plane: static-token-authenticated CRUD over the
//! consumer/token/api/service/cors stores, plus reload endpoints that push
//! a fresh snapshot into the proxy's `RouteSet`/`ServiceSet`/CORS lock.

pub mod handlers;
pub mod middleware;
pub mod server;

pub use server::{AdminServer, AppState};
