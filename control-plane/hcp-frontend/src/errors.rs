use axum::http::{HeaderValue, StatusCode, header::RETRY_AFTER};
use hcp_models::{
    CloudErrorBody, FieldError, ResourceId, cloud_error_from_field_errors, codes,
};
use hcp_storage::StorageError;
use thiserror::Error;
use tracing::{error, info};

pub const ERROR_CODE_HEADER: &str = "x-ms-error-code";

#[derive(Error, Debug)]
pub enum ControlPlaneError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Control plane returned {status} ({code}): {reason}")]
    Status {
        status: u16,
        code: String,
        reason: String,
    },

    #[error("JSON serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid control plane response: {0}")]
    InvalidResponse(String),

    #[error("Client configuration error: {0}")]
    Configuration(String),

    #[error("Cannot convert {0}")]
    Conversion(String),
}

impl ControlPlaneError {
    pub fn status(status: u16, code: impl Into<String>, reason: impl Into<String>) -> Self {
        ControlPlaneError::Status {
            status,
            code: code.into(),
            reason: reason.into(),
        }
    }

    pub fn not_found(reason: impl Into<String>) -> Self {
        Self::status(404, "CLUSTERS-MGMT-404", reason)
    }

    pub fn status_code(&self) -> Option<u16> {
        match self {
            ControlPlaneError::Status { status, .. } => Some(*status),
            ControlPlaneError::Request(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status_code() == Some(404)
    }
}

#[derive(Error, Debug)]
pub enum FrontendError {
    #[error("Validation failed on {} field(s)", .0.len())]
    Validation(Vec<FieldError>),

    #[error("{message}")]
    InvalidRequest {
        code: &'static str,
        message: String,
        target: String,
    },

    #[error("{message}")]
    Conflict {
        message: String,
        retry_after: Option<u64>,
    },

    #[error("{message}")]
    NotFound { message: String, target: String },

    #[error("{message}")]
    SubscriptionState { message: String, conflict: bool },

    #[error("Control plane error: {0}")]
    ControlPlane(#[from] ControlPlaneError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl FrontendError {
    pub fn conflict(message: impl Into<String>) -> Self {
        FrontendError::Conflict {
            message: message.into(),
            retry_after: None,
        }
    }

    pub fn conflict_retry(message: impl Into<String>, retry_after: u64) -> Self {
        FrontendError::Conflict {
            message: message.into(),
            retry_after: Some(retry_after),
        }
    }

    pub fn invalid_request(
        code: &'static str,
        message: impl Into<String>,
        target: impl Into<String>,
    ) -> Self {
        FrontendError::InvalidRequest {
            code,
            message: message.into(),
            target: target.into(),
        }
    }

    pub fn resource_not_found(id: &ResourceId) -> Self {
        let message = match id.resource_group_name() {
            Some(rg) => format!(
                "The Resource '{}/{}' under resource group '{}' was not found.",
                id.resource_type(),
                id.name(),
                rg
            ),
            None => format!("The Resource '{}' was not found.", id),
        };
        FrontendError::NotFound {
            message,
            target: id.to_string(),
        }
    }

    pub fn operation_not_found(operation_id: &str) -> Self {
        FrontendError::NotFound {
            message: format!("The operation '{operation_id}' was not found."),
            target: String::new(),
        }
    }
}

pub type FrontendResult<T> = Result<T, FrontendError>;

/// HTTP-facing error carrying a cloud error body.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Bad request: {0}")]
    BadRequest(CloudErrorBody),

    #[error("Not found: {0}")]
    NotFound(CloudErrorBody),

    #[error("Conflict: {body}")]
    Conflict {
        body: CloudErrorBody,
        retry_after: Option<u64>,
    },

    #[error("Internal server error: {0}")]
    InternalServerError(CloudErrorBody),
}

impl ApiError {
    pub fn bad_request(code: &str, message: impl Into<String>) -> Self {
        ApiError::BadRequest(CloudErrorBody::new(code, message))
    }

    pub fn internal() -> Self {
        ApiError::InternalServerError(CloudErrorBody::new(
            codes::INTERNAL_SERVER_ERROR,
            "Internal server error.",
        ))
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict { .. } => StatusCode::CONFLICT,
            ApiError::InternalServerError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn body(&self) -> &CloudErrorBody {
        match self {
            ApiError::BadRequest(body)
            | ApiError::NotFound(body)
            | ApiError::Conflict { body, .. }
            | ApiError::InternalServerError(body) => body,
        }
    }
}

impl From<FrontendError> for ApiError {
    fn from(err: FrontendError) -> Self {
        match err {
            FrontendError::Validation(errors) => {
                info!(count = errors.len(), "request failed validation");
                ApiError::BadRequest(cloud_error_from_field_errors(&errors).unwrap_or_else(
                    || CloudErrorBody::new(codes::INVALID_REQUEST_CONTENT, "Invalid request content"),
                ))
            }
            FrontendError::InvalidRequest {
                code,
                message,
                target,
            } => {
                info!(%code, "invalid request: {}", message);
                ApiError::BadRequest(CloudErrorBody::new(code, message).with_target(target))
            }
            FrontendError::Conflict {
                message,
                retry_after,
            } => {
                info!("conflict: {}", message);
                ApiError::Conflict {
                    body: CloudErrorBody::new(codes::CONFLICT, message),
                    retry_after,
                }
            }
            FrontendError::NotFound { message, target } => {
                info!("not found: {}", message);
                ApiError::NotFound(
                    CloudErrorBody::new(codes::RESOURCE_NOT_FOUND, message).with_target(target),
                )
            }
            FrontendError::SubscriptionState { message, conflict } => {
                info!("subscription state rejected request: {}", message);
                let body = CloudErrorBody::new(codes::INVALID_SUBSCRIPTION_STATE, message);
                if conflict {
                    ApiError::Conflict {
                        body,
                        retry_after: None,
                    }
                } else {
                    ApiError::BadRequest(body)
                }
            }
            FrontendError::ControlPlane(e) => match &e {
                ControlPlaneError::Status { status: 400, reason, .. } => {
                    info!("control plane rejected request: {}", e);
                    ApiError::BadRequest(CloudErrorBody::new(
                        codes::INVALID_REQUEST_CONTENT,
                        reason.clone(),
                    ))
                }
                ControlPlaneError::Status { status: 404, reason, .. } => {
                    info!("control plane object not found: {}", e);
                    ApiError::NotFound(CloudErrorBody::new(
                        codes::RESOURCE_NOT_FOUND,
                        reason.clone(),
                    ))
                }
                ControlPlaneError::Status { status: 409, reason, .. } => {
                    info!("control plane conflict: {}", e);
                    ApiError::Conflict {
                        body: CloudErrorBody::new(codes::CONFLICT, reason.clone()),
                        retry_after: None,
                    }
                }
                _ => {
                    error!(error = ?e, "control plane request failed: {}", e);
                    ApiError::internal()
                }
            },
            FrontendError::Storage(e) => {
                error!(error = ?e, "storage failure: {}", e);
                ApiError::internal()
            }
            FrontendError::Internal(msg) => {
                error!("internal error: {}", msg);
                ApiError::internal()
            }
        }
    }
}

impl axum::response::IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        use axum::Json;
        use serde_json::json;

        let status = self.status();
        let (body, retry_after) = match self {
            ApiError::Conflict { body, retry_after } => (body, retry_after),
            ApiError::BadRequest(body)
            | ApiError::NotFound(body)
            | ApiError::InternalServerError(body) => (body, None),
        };

        let code = HeaderValue::from_str(&body.code).ok();
        let mut response = (status, Json(json!({ "error": body }))).into_response();
        if let Some(code) = code {
            response.headers_mut().insert(ERROR_CODE_HEADER, code);
        }
        if let Some(secs) = retry_after {
            response.headers_mut().insert(RETRY_AFTER, HeaderValue::from(secs));
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::response::IntoResponse;

    #[test]
    fn control_plane_statuses_are_classified() {
        let cases = [
            (400, StatusCode::BAD_REQUEST, codes::INVALID_REQUEST_CONTENT),
            (404, StatusCode::NOT_FOUND, codes::RESOURCE_NOT_FOUND),
            (409, StatusCode::CONFLICT, codes::CONFLICT),
            (503, StatusCode::INTERNAL_SERVER_ERROR, codes::INTERNAL_SERVER_ERROR),
        ];
        for (upstream, status, code) in cases {
            let api: ApiError =
                FrontendError::from(ControlPlaneError::status(upstream, "X", "reason")).into();
            assert_eq!(api.status(), status);
            assert_eq!(api.body().code, code);
        }
    }

    #[test]
    fn internal_errors_hide_details() {
        let api: ApiError = FrontendError::Internal("db password wrong".into()).into();
        assert_eq!(api.body().message, "Internal server error.");
    }

    #[test]
    fn conflict_response_carries_headers() {
        let response =
            ApiError::from(FrontendError::conflict_retry("busy", 10)).into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
        assert_eq!(response.headers()[RETRY_AFTER], "10");
        assert_eq!(response.headers()[ERROR_CODE_HEADER], codes::CONFLICT);
    }

    #[test]
    fn subscription_state_maps_by_severity() {
        let rejected = ApiError::from(FrontendError::SubscriptionState {
            message: "nope".into(),
            conflict: false,
        });
        assert_eq!(rejected.status(), StatusCode::BAD_REQUEST);
        let blocked = ApiError::from(FrontendError::SubscriptionState {
            message: "nope".into(),
            conflict: true,
        });
        assert_eq!(blocked.status(), StatusCode::CONFLICT);
        assert_eq!(blocked.body().code, codes::INVALID_SUBSCRIPTION_STATE);
    }
}
