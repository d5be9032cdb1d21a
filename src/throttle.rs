use std::{num::NonZeroU32, sync::Arc, time::Duration};

use actix_web::{
    body::EitherBody,
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    http::{header, StatusCode},
    web, HttpResponse, ResponseError,
};
use futures_util::future::{ready, LocalBoxFuture, Ready};
use governor::{
    clock::{Clock, DefaultClock},
    DefaultKeyedRateLimiter, Quota, RateLimiter,
};
use tokio::{task::JoinHandle, time::MissedTickBehavior};
use tracing::Instrument;

use crate::{
    auth::{extractors::bearer_token, jwt::Tokenizer},
    configuration::ThrottleSettings,
    utils::ErrorDetail,
};

/// Per-client request budgets: anonymous callers keyed by IP, authenticated
/// callers keyed by user id.
pub struct Throttler{
    anon: DefaultKeyedRateLimiter<String>,
    user: DefaultKeyedRateLimiter<String>,
    clock: DefaultClock
}

impl Throttler {
    pub fn new(settings: &ThrottleSettings) -> Result<Self, anyhow::Error>{
        let anon = NonZeroU32::new(settings.anon_per_minute)
            .ok_or_else(|| anyhow::anyhow!("throttle.anon_per_minute must be greater than 0"))?;
        let user = NonZeroU32::new(settings.user_per_minute)
            .ok_or_else(|| anyhow::anyhow!("throttle.user_per_minute must be greater than 0"))?;

        Ok(Self{
            anon: RateLimiter::keyed(Quota::per_minute(anon)),
            user: RateLimiter::keyed(Quota::per_minute(user)),
            clock: DefaultClock::default()
        })
    }

    /// `Err` carries how long the client has to wait.
    pub fn check(&self, identity: &ClientIdentity) -> Result<(), Duration>{
        let outcome = match identity {
            ClientIdentity::User(id) => self.user.check_key(id),
            ClientIdentity::Anonymous(ip) => self.anon.check_key(ip)
        };

        outcome.map_err(|not_until| not_until.wait_time_from(self.clock.now()))
    }

    /// Forgets clients whose budget has fully refilled.
    pub fn retain_recent(&self){
        self.anon.retain_recent();
        self.anon.shrink_to_fit();
        self.user.retain_recent();
        self.user.shrink_to_fit();
    }

    pub fn tracked_clients(&self) -> usize {
        self.anon.len() + self.user.len()
    }
}

const HOUSEKEEPING_PERIOD: Duration = Duration::from_secs(60);

/// Prunes idle limiter state on a timer so rotating client addresses cannot
/// grow it without bound.
pub fn spawn_housekeeping(throttler: Arc<Throttler>) -> JoinHandle<()>{
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(HOUSEKEEPING_PERIOD);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            interval.tick().await;
            throttler.retain_recent();
            tracing::debug!(clients = throttler.tracked_clients(), "Pruned throttle state");
        }
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientIdentity{
    User(String),
    Anonymous(String)
}

impl ClientIdentity {
    // Invalid tokens fall back to the IP budget, the handler rejects them later
    pub fn of(req: &ServiceRequest) -> Self{
        let user = req.app_data::<web::Data<Tokenizer>>()
            .zip(bearer_token(req.request()).ok().flatten())
            .and_then(|(tokenizer, token)| tokenizer.decode_access(token).ok());

        match user {
            Some(claims) => ClientIdentity::User(claims.sub.to_string()),
            None => {
                let ip = req.connection_info()
                    .realip_remote_addr()
                    .map(|addr| addr.to_string())
                    .unwrap_or_else(|| "unknown".to_string());
                ClientIdentity::Anonymous(ip)
            }
        }
    }
}

#[derive(Debug)]
pub struct ThrottledError(pub Duration);

impl ThrottledError {
    // Whole seconds, never less than one
    pub fn retry_after(&self) -> u64 {
        self.0.as_secs_f64().ceil().max(1.0) as u64
    }
}

impl std::fmt::Display for ThrottledError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Request was throttled. Expected available in {} seconds.", self.retry_after())
    }
}

impl std::error::Error for ThrottledError {}

impl ResponseError for ThrottledError {
    fn status_code(&self) -> StatusCode {
        StatusCode::TOO_MANY_REQUESTS
    }

    fn error_response(&self) -> HttpResponse<actix_web::body::BoxBody> {
        HttpResponse::TooManyRequests()
            .insert_header((header::RETRY_AFTER, self.retry_after().to_string()))
            .json(ErrorDetail::new(self.to_string()))
    }
}

pub struct Throttle(Arc<Throttler>);

impl Throttle {
    pub fn new(throttler: Arc<Throttler>) -> Self{
        Self(throttler)
    }
}

impl<S, B> Transform<S, ServiceRequest> for Throttle
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = actix_web::Error>,
    S::Future: 'static,
    B: 'static
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = actix_web::Error;
    type InitError = ();
    type Transform = ThrottleMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(ThrottleMiddleware{
            service,
            throttler: self.0.clone()
        }))
    }
}

pub struct ThrottleMiddleware<S>{
    service: S,
    throttler: Arc<Throttler>
}

impl<S, B> Service<ServiceRequest> for ThrottleMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = actix_web::Error>,
    S::Future: 'static,
    B: 'static
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = actix_web::Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    #[tracing::instrument(
        "Checking request rate",
        skip(self, req)
    )]
    fn call(&self, req: ServiceRequest) -> Self::Future {
        let identity = ClientIdentity::of(&req);
        let current_span = tracing::Span::current();

        if let Err(wait) = self.throttler.check(&identity) {
            tracing::info!(?identity, "Client throttled");
            let response = ThrottledError(wait).error_response();

            return Box::pin(
                ready(Ok(req.into_response(response).map_into_right_body()))
                    .instrument(current_span)
            )
        }

        let fut = self.service.call(req);

        Box::pin(
            async move {
                let res = fut.await?;
                Ok(res.map_into_left_body())
            }
            .instrument(current_span)
        )
    }
}
