//! Data Transfer Objects - response types for the API.

use serde::{Deserialize, Serialize};

/// Liveness and readiness check body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: String,
}

/// The verified identity of the current caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityResponse {
    pub subject_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub expires_at: String,
}
