//! Panic recovery - the outermost stage.
//!
//! A panic anywhere downstream, whether while building the inner future or
//! while polling it, is turned into a 500 `INTERNAL_ERROR` envelope instead of
//! tearing down the connection.

use actix_web::{
    Error, HttpResponse, ResponseError,
    dev::{Service, ServiceRequest, ServiceResponse, Transform, forward_ready},
    http::{
        StatusCode,
        header::{HeaderName, HeaderValue},
    },
};
use futures::FutureExt;
use std::any::Any;
use std::backtrace::Backtrace;
use std::cell::RefCell;
use std::fmt;
use std::future::{Future, Ready, ready};
use std::panic::{self, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::Once;

use turnstile_core::error::Rejection;

use super::error::ApiError;
use super::security_headers::SECURITY_HEADERS;
use crate::observability::{REQUEST_ID_HEADER, assign_request_id};

thread_local! {
    static LAST_PANIC_BACKTRACE: RefCell<Option<String>> = const { RefCell::new(None) };
}

/// Chain a hook that records the panicking thread's backtrace.
///
/// The stack is gone by the time `catch_unwind` returns, so it has to be
/// captured at the panic site.
fn install_panic_hook() {
    static INSTALL: Once = Once::new();

    INSTALL.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            let backtrace = Backtrace::force_capture().to_string();
            LAST_PANIC_BACKTRACE.with(|slot| *slot.borrow_mut() = Some(backtrace));
            previous(info);
        }));
    });
}

fn take_panic_backtrace() -> Option<String> {
    LAST_PANIC_BACKTRACE.with(|slot| slot.borrow_mut().take())
}

pub struct RecoveryMiddleware;

impl<S, B> Transform<S, ServiceRequest> for RecoveryMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Transform = RecoveryService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        install_panic_hook();
        ready(Ok(RecoveryService { service }))
    }
}

pub struct RecoveryService<S> {
    service: S,
}

impl<S, B> Service<ServiceRequest> for RecoveryService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let path = req.path().to_string();
        // Assigned here so the 500 carries the same ID the inner stages logged.
        let request_id = assign_request_id(&req);

        // The request is consumed by the inner call, so a recovered panic is
        // reported as an error and rendered by actix through `RecoveredPanic`.
        let fut = match panic::catch_unwind(AssertUnwindSafe(|| self.service.call(req))) {
            Ok(fut) => fut,
            Err(payload) => return Box::pin(ready(Err(recovered(&path, request_id, payload)))),
        };

        Box::pin(async move {
            match AssertUnwindSafe(fut).catch_unwind().await {
                Ok(res) => res,
                Err(payload) => Err(recovered(&path, request_id, payload)),
            }
        })
    }
}

fn recovered(path: &str, request_id: String, payload: Box<dyn Any + Send>) -> Error {
    let message = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_string());
    let backtrace = take_panic_backtrace().unwrap_or_else(|| "unavailable".to_string());

    tracing::error!(
        panic = %message,
        path = %path,
        request_id = %request_id,
        backtrace = %backtrace,
        "Recovered from panic"
    );
    RecoveredPanic { request_id }.into()
}

/// A caught panic, rendered as the internal-error envelope.
///
/// The stages that normally decorate responses never saw this one, so it
/// carries the request ID and hardening headers itself.
#[derive(Debug)]
pub struct RecoveredPanic {
    request_id: String,
}

impl fmt::Display for RecoveredPanic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("An unexpected error occurred")
    }
}

impl ResponseError for RecoveredPanic {
    fn status_code(&self) -> StatusCode {
        StatusCode::INTERNAL_SERVER_ERROR
    }

    fn error_response(&self) -> HttpResponse {
        let mut resp = ApiError::from(Rejection::Internal).error_response();
        let headers = resp.headers_mut();

        if let Ok(value) = HeaderValue::from_str(&self.request_id) {
            headers.insert(HeaderName::from_static(REQUEST_ID_HEADER), value);
        }
        for &(name, value) in SECURITY_HEADERS {
            if let Ok(name) = HeaderName::from_bytes(name.as_bytes()) {
                headers.insert(name, HeaderValue::from_static(value));
            }
        }

        resp
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{App, body::to_bytes, test, web};

    async fn boom() -> HttpResponse {
        panic!("handler exploded")
    }

    #[actix_web::test]
    async fn test_handler_panic_becomes_internal_error() {
        let app = test::init_service(
            App::new()
                .wrap(RecoveryMiddleware)
                .route("/boom", web::get().to(boom))
                .route("/ok", web::get().to(HttpResponse::Ok)),
        )
        .await;

        let req = test::TestRequest::get().uri("/boom").to_request();
        let err = match app.call(req).await {
            Err(err) => err,
            Ok(resp) => panic!("expected a recovered error, got {}", resp.status()),
        };

        let resp = err.error_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(resp.headers().contains_key(REQUEST_ID_HEADER));

        let bytes = to_bytes(resp.into_body()).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["error"]["code"], "INTERNAL_ERROR");
        assert_eq!(body["error"]["message"], "An unexpected error occurred");

        // The service keeps serving after a panic.
        let req = test::TestRequest::get().uri("/ok").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[actix_web::test]
    async fn test_passes_through_normal_responses() {
        let app = test::init_service(
            App::new()
                .wrap(RecoveryMiddleware)
                .route("/ok", web::get().to(HttpResponse::Ok)),
        )
        .await;

        let req = test::TestRequest::get().uri("/ok").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[actix_web::test]
    async fn test_recovered_error_carries_request_id_and_hardening_headers() {
        let err = recovered("/x", "req-7".to_string(), Box::new("bad"));
        assert_eq!(
            err.as_response_error().status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );

        let resp = err.error_response();
        assert_eq!(resp.headers().get(REQUEST_ID_HEADER).unwrap(), "req-7");
        for (name, value) in SECURITY_HEADERS {
            assert_eq!(resp.headers().get(*name).unwrap(), *value);
        }
    }

    #[actix_web::test]
    async fn test_panic_hook_records_backtrace_for_the_panicking_thread() {
        install_panic_hook();
        take_panic_backtrace();

        let caught = panic::catch_unwind::<_, ()>(|| panic!("recorded"));
        assert!(caught.is_err());

        assert!(take_panic_backtrace().is_some());
        assert!(take_panic_backtrace().is_none());
    }
}
