//! Pipeline composer - owns the admission services and orders the stages.
//!
//! Request flow, outermost first:
//!
//! ```text
//! recovery -> tracing -> request id -> security headers
//!          -> admission -> authentication -> handler
//! ```
//!
//! Any stage may short-circuit; the stages outside it still run on the way
//! out, so rejections carry the request id and hardening headers too.

use std::sync::Arc;

use actix_web::{
    App, Error,
    body::MessageBody,
    dev::{ServiceFactory, ServiceRequest, ServiceResponse},
    web,
};
use tokio_util::sync::CancellationToken;
use tracing_actix_web::TracingLogger;

use turnstile_core::domain::{AdmissionPolicy, AuthPolicy};
use turnstile_core::ports::TokenService;
use turnstile_core::{AdmissionController, Authenticator};
use turnstile_infra::{BucketRegistry, JwtConfig, JwtTokenService, Sweeper, SweeperConfig};

use crate::config::AppConfig;
use crate::handlers;
use crate::middleware::{AuthMiddleware, RateLimitMiddleware, RecoveryMiddleware, security_headers};
use crate::observability::RequestIdMiddleware;

/// Cheap, cloneable handles for each worker's `App`.
#[derive(Clone)]
pub struct PipelineStages {
    pub admission: AdmissionController,
    pub authenticator: Authenticator,
    pub trust_proxy: bool,
}

/// The running admission layer: bucket registry, sweeper and token service.
pub struct Pipeline {
    stages: PipelineStages,
    registry: Arc<BucketRegistry>,
    sweeper: Sweeper,
    shutdown: CancellationToken,
}

impl Pipeline {
    /// Build the services and start the sweeper. Must run inside a tokio runtime.
    pub fn start(config: &AppConfig) -> Self {
        Self::from_policies(&config.admission, &config.auth, config.trust_proxy)
    }

    pub fn from_policies(admission: &AdmissionPolicy, auth: &AuthPolicy, trust_proxy: bool) -> Self {
        let registry = Arc::new(BucketRegistry::from_policy(admission));
        let tokens: Arc<dyn TokenService> = Arc::new(JwtTokenService::new(JwtConfig::from(auth)));

        let shutdown = CancellationToken::new();
        let sweeper = Sweeper::spawn(
            registry.clone(),
            SweeperConfig::from(admission),
            shutdown.child_token(),
        );

        tracing::info!(
            requests_per_second = admission.requests_per_second,
            burst_size = admission.burst_size,
            cleanup_interval_secs = admission.cleanup_interval.as_secs(),
            bypass_paths = ?auth.bypass_paths.iter().collect::<Vec<_>>(),
            "Admission pipeline started"
        );

        Self {
            stages: PipelineStages {
                admission: AdmissionController::new(registry.clone(), admission.clone()),
                authenticator: Authenticator::new(tokens, auth.bypass_paths.clone()),
                trust_proxy,
            },
            registry,
            sweeper,
            shutdown,
        }
    }

    pub fn stages(&self) -> PipelineStages {
        self.stages.clone()
    }

    pub fn registry(&self) -> &Arc<BucketRegistry> {
        &self.registry
    }

    /// Stop the sweeper and wait for its last pass to finish.
    pub async fn shutdown(self) {
        let Pipeline {
            registry,
            sweeper,
            shutdown,
            ..
        } = self;

        shutdown.cancel();
        sweeper.shutdown().await;
        tracing::info!(buckets = registry.len(), "Admission pipeline stopped");
    }
}

/// Build the application with every stage in order.
///
/// `.wrap` registers outside-in from the bottom: the last call is the
/// outermost stage.
pub fn build_app(
    stages: PipelineStages,
) -> App<
    impl ServiceFactory<
        ServiceRequest,
        Config = (),
        Response = ServiceResponse<impl MessageBody>,
        Error = Error,
        InitError = (),
    >,
> {
    App::new()
        .configure(handlers::configure_routes)
        .default_service(web::to(handlers::not_found))
        .wrap(AuthMiddleware::new(stages.authenticator))
        .wrap(RateLimitMiddleware::new(stages.admission, stages.trust_proxy))
        .wrap(security_headers())
        .wrap(RequestIdMiddleware)
        .wrap(TracingLogger::default())
        .wrap(RecoveryMiddleware)
}
