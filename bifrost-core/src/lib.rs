pub mod config;
pub mod consumer;
pub mod cors;
pub mod error;
pub mod headers;
pub mod route;
pub mod service;
pub mod token;

pub use config::BifrostConfig;
pub use consumer::Consumer;
pub use cors::CorsPolicy;
pub use error::BifrostError;
pub use route::{MatchOutcome, Route, RouteSet};
pub use service::{Service, ServiceSet, Upstream};
pub use token::Token;
