//! Admission stage - one token per request, keyed by caller address.

use actix_web::{
    Error, ResponseError,
    body::EitherBody,
    dev::{Service, ServiceRequest, ServiceResponse, Transform, forward_ready},
    http::header::{HeaderName, HeaderValue},
};
use std::future::{Future, Ready, ready};
use std::pin::Pin;

use turnstile_core::AdmissionController;

use super::error::{ApiError, RATE_LIMIT_LIMIT_HEADER, RATE_LIMIT_REMAINING_HEADER};

/// Key used when the caller address cannot be determined.
const UNKNOWN_CALLER: &str = "unknown";

/// Rate limiting middleware factory.
pub struct RateLimitMiddleware {
    admission: AdmissionController,
    trust_proxy: bool,
}

impl RateLimitMiddleware {
    /// With `trust_proxy` set the caller key comes from `Forwarded` /
    /// `X-Forwarded-For`; otherwise only the socket peer address is used.
    pub fn new(admission: AdmissionController, trust_proxy: bool) -> Self {
        Self {
            admission,
            trust_proxy,
        }
    }
}

impl<S, B> Transform<S, ServiceRequest> for RateLimitMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Transform = RateLimitMiddlewareService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RateLimitMiddlewareService {
            service,
            admission: self.admission.clone(),
            trust_proxy: self.trust_proxy,
        }))
    }
}

pub struct RateLimitMiddlewareService<S> {
    service: S,
    admission: AdmissionController,
    trust_proxy: bool,
}

impl<S, B> Service<ServiceRequest> for RateLimitMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let key = caller_key(&req, self.trust_proxy);

        match self.admission.allow(&key) {
            Err(rejection) => {
                let response = ApiError::from(rejection).error_response();
                let (http_req, _payload) = req.into_parts();
                let srv_response = ServiceResponse::new(http_req, response);

                Box::pin(async move { Ok(srv_response.map_into_right_body()) })
            }
            Ok(result) => {
                let limit = self.admission.policy().burst_size;
                let fut = self.service.call(req);

                Box::pin(async move {
                    let mut res = fut.await?;
                    let headers = res.headers_mut();
                    headers.insert(
                        HeaderName::from_static(RATE_LIMIT_LIMIT_HEADER),
                        HeaderValue::from(limit),
                    );
                    headers.insert(
                        HeaderName::from_static(RATE_LIMIT_REMAINING_HEADER),
                        HeaderValue::from(result.remaining),
                    );
                    Ok(res.map_into_left_body())
                })
            }
        }
    }
}

/// Derive the per-caller bucket key.
///
/// The port is dropped so every connection from one host shares a bucket.
fn caller_key(req: &ServiceRequest, trust_proxy: bool) -> String {
    if trust_proxy {
        if let Some(addr) = req.connection_info().realip_remote_addr() {
            return addr.to_string();
        }
    }

    req.peer_addr()
        .map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| UNKNOWN_CALLER.to_string())
}
