use serde::{Deserialize, Serialize};
use std::fmt;

pub mod codes {
    pub const INTERNAL_SERVER_ERROR: &str = "InternalServerError";
    pub const INVALID_PARAMETER: &str = "InvalidParameter";
    pub const INVALID_REQUEST_CONTENT: &str = "InvalidRequestContent";
    pub const INVALID_RESOURCE_TYPE: &str = "InvalidResourceType";
    pub const INVALID_RESOURCE_NAME: &str = "InvalidResourceName";
    pub const MULTIPLE_ERRORS_OCCURRED: &str = "MultipleErrorsOccurred";
    pub const CANCELED: &str = "Canceled";
    pub const CONFLICT: &str = "Conflict";
    pub const NOT_FOUND: &str = "NotFound";
    pub const RESOURCE_NOT_FOUND: &str = "ResourceNotFound";
    pub const INVALID_SUBSCRIPTION_STATE: &str = "InvalidSubscriptionState";
    pub const PREFLIGHT_VALIDATION_FAILED: &str = "PreflightValidationFailed";
}

/// Body of a resource provider error response.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CloudErrorBody {
    pub code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub target: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<CloudErrorBody>,
}

impl CloudErrorBody {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
            target: String::new(),
            details: Vec::new(),
        }
    }

    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = target.into();
        self
    }

    pub fn with_details(mut self, details: Vec<CloudErrorBody>) -> Self {
        self.details = details;
        self
    }

    /// One error is returned as is; several are wrapped under `MultipleErrorsOccurred`.
    pub fn from_slice(
        mut errors: Vec<CloudErrorBody>,
        multiple_errors_message: &str,
    ) -> Option<Self> {
        match errors.len() {
            0 => None,
            1 => errors.pop(),
            _ => Some(
                Self::new(codes::MULTIPLE_ERRORS_OCCURRED, multiple_errors_message)
                    .with_details(errors),
            ),
        }
    }
}

impl fmt::Display for CloudErrorBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: ", self.code)?;
        if !self.target.is_empty() {
            write!(f, "{}: ", self.target)?;
        }
        f.write_str(&self.message)?;
        if !self.details.is_empty() {
            f.write_str(" Details: ")?;
            for (i, d) in self.details.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{d}")?;
            }
        }
        Ok(())
    }
}

/// A single field-scoped validation failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl From<&FieldError> for CloudErrorBody {
    fn from(e: &FieldError) -> Self {
        CloudErrorBody::new(codes::INVALID_REQUEST_CONTENT, e.message.clone())
            .with_target(e.field.clone())
    }
}

/// Aggregates every field error into one error body, or `None` if there are none.
pub fn cloud_error_from_field_errors(errors: &[FieldError]) -> Option<CloudErrorBody> {
    CloudErrorBody::from_slice(
        errors.iter().map(CloudErrorBody::from).collect(),
        "Content validation failed on multiple fields",
    )
}
