//! Identity middleware: resolves a bearer token to a consumer without ever
//! rejecting the request — authorization is the route's job.

use bifrost_core::token::normalize_ip;
use bifrost_core::{BifrostConfig, Consumer};
use bifrost_store::{ConsumerRepository, TokenRepository};

/// Outcome of identity resolution: the consumer to attach to the request
/// context, and the raw token value if one was presented and accepted.
pub struct Identity {
    pub consumer: Consumer,
    pub token_value: Option<String>,
}

impl Identity {
    fn anonymous() -> Self {
        Self { consumer: Consumer::anonymous(), token_value: None }
    }
}

/// Resolve `bearer` (the raw `Authorization` header value, already stripped
/// of any `Bearer ` prefix by the caller) into an [`Identity`].
pub async fn resolve(
    bearer: Option<&str>,
    client_ip: &str,
    tokens: &dyn TokenRepository,
    consumers: &dyn ConsumerRepository,
    config: &BifrostConfig,
) -> Identity {
    let Some(value) = bearer.filter(|v| !v.is_empty()) else {
        return Identity::anonymous();
    };

    let token = match tokens.get(value).await {
        Ok(Some(t)) => t,
        _ => return Identity::anonymous(),
    };

    if !token.is_valid() {
        let _ = tokens.delete(value).await;
        return Identity::anonymous();
    }

    if config.token.verify_ip && !token.ip_allowed(&normalize_ip(client_ip)) {
        return Identity::anonymous();
    }

    let consumer = match consumers.get(&token.consumer_id).await {
        Ok(Some(c)) => c,
        _ => return Identity::anonymous(),
    };

    if config.token.sliding_expiration {
        let mut token = token;
        token.slide(config.token_timeout());
        let _ = tokens.update(token).await;
    }

    Identity { consumer, token_value: Some(value.to_string()) }
}
