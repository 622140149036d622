use axum::{
    extract::rejection::{JsonRejection, PathRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Extension, Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::api::headers::Alert;
use crate::logic::validate::FieldError;
use crate::model::Entity;

/// Stable, machine-readable error keys. Clients match on these, never on titles.
pub mod error_key {
    pub const ID_EXISTS: &str = "idexists";
    pub const ID_NULL: &str = "idnull";
    pub const ID_INVALID: &str = "idinvalid";
    pub const ID_NOT_FOUND: &str = "idnotfound";
    pub const NOT_FOUND: &str = "notfound";
    pub const VALIDATION: &str = "validation";
    pub const BAD_PAYLOAD: &str = "badpayload";
    pub const INTERNAL: &str = "internal";
}

/// Failure of a REST request, tagged with the entity it concerns.
#[derive(Error, Debug)]
pub enum ApiError {
    /// A new record arrived with an identifier already set. HTTP 400.
    #[error("A new {entity} cannot already have an ID")]
    Conflict { entity: &'static str },

    /// Missing identifier, or path and body identifiers disagree. HTTP 400.
    #[error("{title}")]
    InvalidRequest {
        entity: &'static str,
        key: &'static str,
        title: &'static str,
    },

    /// No record for the identifier. The status depends on where the check happens.
    #[error("{title}")]
    NotFound {
        entity: &'static str,
        key: &'static str,
        title: &'static str,
        status: StatusCode,
    },

    /// Required fields missing or blank. HTTP 400.
    #[error("Validation failed for {entity}")]
    Validation {
        entity: &'static str,
        field_errors: Vec<FieldError>,
    },

    /// Body or path could not be decoded. HTTP 400 or 415.
    #[error("{message}")]
    Payload {
        entity: &'static str,
        status: StatusCode,
        message: String,
    },

    /// Storage failure. HTTP 500.
    #[error("Internal error on {entity}: {cause:#}")]
    Internal {
        entity: &'static str,
        cause: anyhow::Error,
    },
}

impl ApiError {
    pub fn id_exists<E: Entity>() -> Self {
        ApiError::Conflict {
            entity: E::ENTITY_NAME,
        }
    }

    pub fn id_null<E: Entity>() -> Self {
        ApiError::InvalidRequest {
            entity: E::ENTITY_NAME,
            key: error_key::ID_NULL,
            title: "Invalid id",
        }
    }

    pub fn id_invalid<E: Entity>() -> Self {
        ApiError::InvalidRequest {
            entity: E::ENTITY_NAME,
            key: error_key::ID_INVALID,
            title: "Invalid ID",
        }
    }

    /// Existence check failed on an update path; `status` is 400 for PUT and 404 for PATCH.
    pub fn id_not_found<E: Entity>(status: StatusCode) -> Self {
        ApiError::NotFound {
            entity: E::ENTITY_NAME,
            key: error_key::ID_NOT_FOUND,
            title: "Entity not found",
            status,
        }
    }

    pub fn not_found<E: Entity>() -> Self {
        ApiError::NotFound {
            entity: E::ENTITY_NAME,
            key: error_key::NOT_FOUND,
            title: "Not Found",
            status: StatusCode::NOT_FOUND,
        }
    }

    pub fn validation<E: Entity>(field_errors: Vec<FieldError>) -> Self {
        ApiError::Validation {
            entity: E::ENTITY_NAME,
            field_errors,
        }
    }

    pub fn json_payload<E: Entity>(rejection: JsonRejection) -> Self {
        let status = match rejection {
            JsonRejection::MissingJsonContentType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            _ => StatusCode::BAD_REQUEST,
        };
        ApiError::Payload {
            entity: E::ENTITY_NAME,
            status,
            message: rejection.body_text(),
        }
    }

    pub fn path_payload<E: Entity>(rejection: PathRejection) -> Self {
        ApiError::Payload {
            entity: E::ENTITY_NAME,
            status: StatusCode::BAD_REQUEST,
            message: rejection.body_text(),
        }
    }

    pub fn internal<E: Entity>(cause: anyhow::Error) -> Self {
        ApiError::Internal {
            entity: E::ENTITY_NAME,
            cause,
        }
    }

    pub fn entity(&self) -> &'static str {
        match self {
            ApiError::Conflict { entity }
            | ApiError::InvalidRequest { entity, .. }
            | ApiError::NotFound { entity, .. }
            | ApiError::Validation { entity, .. }
            | ApiError::Payload { entity, .. }
            | ApiError::Internal { entity, .. } => *entity,
        }
    }

    pub fn error_key(&self) -> &'static str {
        match self {
            ApiError::Conflict { .. } => error_key::ID_EXISTS,
            ApiError::InvalidRequest { key, .. } | ApiError::NotFound { key, .. } => *key,
            ApiError::Validation { .. } => error_key::VALIDATION,
            ApiError::Payload { .. } => error_key::BAD_PAYLOAD,
            ApiError::Internal { .. } => error_key::INTERNAL,
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Conflict { .. }
            | ApiError::InvalidRequest { .. }
            | ApiError::Validation { .. } => StatusCode::BAD_REQUEST,
            ApiError::NotFound { status, .. } | ApiError::Payload { status, .. } => *status,
            ApiError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub title: String,
    pub status: u16,
    pub message: String,
    pub entity_name: String,
    pub error_key: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub field_errors: Vec<FieldError>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            log::error!("{}", self);
        } else {
            log::warn!("Rejected {} request: {} ({})", self.entity(), self, self.error_key());
        }

        let alert = Alert::Error {
            entity: self.entity(),
            key: self.error_key(),
        };
        let title = match &self {
            // Storage details stay in the log
            ApiError::Internal { .. } => "Internal Server Error".to_string(),
            other => other.to_string(),
        };
        let body = ErrorResponse {
            title,
            status: status.as_u16(),
            message: format!("error.{}", self.error_key()),
            entity_name: self.entity().to_string(),
            error_key: self.error_key().to_string(),
            field_errors: match self {
                ApiError::Validation { field_errors, .. } => field_errors,
                _ => Vec::new(),
            },
        };

        (status, Extension(alert), Json(body)).into_response()
    }
}
