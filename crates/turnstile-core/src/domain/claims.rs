use chrono::{DateTime, Utc};

/// Verified identity extracted from a bearer credential.
///
/// Built once per request by a [`TokenService`](crate::ports::TokenService)
/// and only read afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Claims {
    pub subject_id: String,
    pub email: Option<String>,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}
