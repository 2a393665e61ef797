use thiserror::Error;

/// Terminal failures of the request guard.
///
/// None of these are retried. `Infrastructure` means access could not be
/// determined and the request fails closed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AuthzError {
    #[error("Authentication required: no credential presented")]
    CredentialMissing,

    #[error("Invalid credential: {0}")]
    CredentialInvalid(String),

    #[error("Forbidden: requires one of roles {}", required.join(", "))]
    InsufficientRole { required: Vec<String> },

    #[error("Forbidden: policy `{policy}` denied access")]
    PolicyDenied { policy: String },

    #[error("Route declares policies but no principal is available")]
    MisconfiguredRoute,

    #[error("Could not determine access: {0}")]
    Infrastructure(String),
}

impl AuthzError {
    /// Stable machine-readable code.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            AuthzError::CredentialMissing => "credential_missing",
            AuthzError::CredentialInvalid(_) => "credential_invalid",
            AuthzError::InsufficientRole { .. } => "insufficient_role",
            AuthzError::PolicyDenied { .. } => "policy_denied",
            AuthzError::MisconfiguredRoute => "misconfigured_route",
            AuthzError::Infrastructure(_) => "authz_unavailable",
        }
    }

    /// Message safe to hand to the caller. Credential and policy details stay
    /// in the logs.
    #[must_use]
    pub fn public_message(&self) -> String {
        match self {
            AuthzError::CredentialMissing => self.to_string(),
            AuthzError::CredentialInvalid(_) => "Invalid credential".to_owned(),
            AuthzError::InsufficientRole { required } => {
                format!("Forbidden: requires one of roles {}", required.join(", "))
            }
            AuthzError::PolicyDenied { .. } => "Forbidden: access denied".to_owned(),
            AuthzError::MisconfiguredRoute | AuthzError::Infrastructure(_) => {
                "Access could not be determined".to_owned()
            }
        }
    }

    #[cfg(feature = "axum-ext")]
    #[must_use]
    pub fn status(&self) -> axum::http::StatusCode {
        use axum::http::StatusCode;

        match self {
            AuthzError::CredentialMissing | AuthzError::CredentialInvalid(_) => {
                StatusCode::UNAUTHORIZED
            }
            AuthzError::InsufficientRole { .. } | AuthzError::PolicyDenied { .. } => {
                StatusCode::FORBIDDEN
            }
            AuthzError::MisconfiguredRoute => StatusCode::INTERNAL_SERVER_ERROR,
            AuthzError::Infrastructure(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

#[cfg(feature = "axum-ext")]
impl axum::response::IntoResponse for AuthzError {
    fn into_response(self) -> axum::response::Response {
        use axum::response::Json;
        use serde_json::json;

        let status = self.status();
        let mut body = json!({
            "error": self.public_message(),
            "code": self.code(),
            "status": status.as_u16(),
        });
        if let AuthzError::InsufficientRole { required } = &self {
            body["required_roles"] = json!(required);
        }

        (status, Json(body)).into_response()
    }
}
