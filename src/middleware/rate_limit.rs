//! Per-credential rate limiting using the Governor crate

use axum::{
    body::Body,
    extract::ConnectInfo,
    http::Request,
    response::{IntoResponse, Response},
};
use futures::future::BoxFuture;
use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter};
use std::{
    net::{IpAddr, SocketAddr},
    num::NonZeroU32,
    sync::Arc,
    task::{Context, Poll},
};
use tower::{Layer, Service};
use tracing::warn;

use crate::credentials::Authenticator;
use crate::error::AppError;

const ANONYMOUS: &str = "anonymous";
/// Idle keys are pruned once the table grows past this
const PRUNE_THRESHOLD: usize = 10_000;

type SharedRateLimiter = Arc<DefaultKeyedRateLimiter<String>>;

/// Rate limiting layer keyed by verified credential.
///
/// Requests without a valid credential share a bucket per peer address, or a single
/// `anonymous` bucket when the peer is unknown.
#[derive(Clone)]
pub struct RateLimitLayer {
    limiter: SharedRateLimiter,
    authenticator: Arc<Authenticator>,
}

impl RateLimitLayer {
    pub fn new(requests_per_second: u32, burst_size: u32, authenticator: Arc<Authenticator>) -> Self {
        let quota = Quota::per_second(NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::MIN))
            .allow_burst(NonZeroU32::new(burst_size).unwrap_or(NonZeroU32::MIN));

        Self {
            limiter: Arc::new(RateLimiter::keyed(quota)),
            authenticator,
        }
    }
}

impl<S> Layer<S> for RateLimitLayer {
    type Service = RateLimitMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RateLimitMiddleware {
            inner,
            limiter: self.limiter.clone(),
            authenticator: self.authenticator.clone(),
        }
    }
}

#[derive(Clone)]
pub struct RateLimitMiddleware<S> {
    inner: S,
    limiter: SharedRateLimiter,
    authenticator: Arc<Authenticator>,
}

async fn limiter_key(authenticator: &Authenticator, token: Option<String>, peer: Option<IpAddr>) -> String {
    if let Some(token) = token {
        if let Some(identity) = authenticator.identify(&token).await {
            return identity;
        }
    }
    match peer {
        Some(ip) => format!("ip:{}", ip),
        None => ANONYMOUS.to_string(),
    }
}

impl<S> Service<Request<Body>> for RateLimitMiddleware<S>
where
    S: Service<Request<Body>, Response = Response> + Send + Clone + 'static,
    S::Future: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request<Body>) -> Self::Future {
        if request.uri().path() == "/health" {
            let future = self.inner.call(request);
            return Box::pin(future);
        }

        let limiter = self.limiter.clone();
        let authenticator = self.authenticator.clone();
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        let token = Authenticator::bearer_token(request.headers()).map(str::to_string);
        let peer = request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip());

        Box::pin(async move {
            let key = limiter_key(&authenticator, token, peer).await;

            if limiter.len() > PRUNE_THRESHOLD {
                limiter.retain_recent();
            }

            match limiter.check_key(&key) {
                Ok(_) => inner.call(request).await,
                Err(_) => {
                    warn!(path = %request.uri().path(), key = %key, "Rate limit exceeded");
                    Ok(AppError::RateLimitExceeded.into_response())
                }
            }
        })
    }
}
