use std::sync::Arc;

use async_graphql::{Error, ErrorExtensions};
use platform_authz::{Permission, Resource, has_any_permission_by_resource};
use platform_db::DbError;
use thiserror::Error;

/// Shared GraphQL result type.
pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Error, Clone)]
pub enum ApiError {
    #[error("unauthorized")]
    Unauthorized,
    #[error("forbidden")]
    Forbidden,
    #[error("resource not found")]
    NotFound,
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("bad request: {0}")]
    InvalidInput(String),
    #[error("internal server error")]
    Internal(Arc<anyhow::Error>),
}

impl ApiError {
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Unauthorized => "UNAUTHORIZED",
            ApiError::Forbidden => "FORBIDDEN",
            ApiError::NotFound => "NOT_FOUND",
            ApiError::Conflict(_) => "CONFLICT",
            ApiError::InvalidInput(_) => "INVALID_INPUT",
            ApiError::Internal(_) => "INTERNAL",
        }
    }

    pub fn internal(err: anyhow::Error) -> Self {
        Self::Internal(Arc::new(err))
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(value: anyhow::Error) -> Self {
        Self::internal(value)
    }
}

impl From<DbError> for ApiError {
    fn from(value: DbError) -> Self {
        match value {
            DbError::RoleNotFound(_) | DbError::UserNotFound(_) => ApiError::NotFound,
            DbError::RoleExists(_) | DbError::SystemRole(_) | DbError::RoleInUse { .. } => {
                ApiError::Conflict(value.to_string())
            }
            DbError::UnknownPermission(_) | DbError::InvalidInput(_) => {
                ApiError::InvalidInput(value.to_string())
            }
            DbError::MissingUrl | DbError::Database(_) => ApiError::internal(value.into()),
        }
    }
}

impl ErrorExtensions for ApiError {
    fn extend(&self) -> Error {
        if let ApiError::Internal(inner) = self {
            tracing::error!(error = %inner, "internal api error");
        }
        let mut err = Error::new(self.to_string());
        err = err.extend_with(|_err, e| {
            e.set("code", self.code());
        });
        if let ApiError::InvalidInput(_) = self {
            err = err.extend_with(|_err, e| {
                e.set("type", "BAD_REQUEST");
            });
        }
        err
    }
}

/// Passes when `permissions` cover at least one of `required`.
pub fn authorize(permissions: &[Permission], required: &[Resource]) -> ApiResult<()> {
    if has_any_permission_by_resource(permissions, required) {
        Ok(())
    } else {
        Err(ApiError::Forbidden)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_graphql::Value;
    use uuid::Uuid;

    fn code_of(err: &Error) -> Option<Value> {
        err.extensions
            .as_ref()
            .and_then(|map| map.get("code"))
            .cloned()
    }

    #[test]
    fn internal_errors_are_masked() {
        let err = ApiError::internal(anyhow::anyhow!("boom")).extend();
        assert_eq!(err.message, "internal server error");
        assert_eq!(code_of(&err), Some(Value::from("INTERNAL")));
    }

    #[test]
    fn store_errors_map_to_codes() {
        let missing: ApiError = DbError::RoleNotFound(Uuid::nil()).into();
        assert_eq!(missing.code(), "NOT_FOUND");

        let taken: ApiError = DbError::RoleExists("SALES".into()).into();
        assert_eq!(taken.code(), "CONFLICT");

        let in_use: ApiError = DbError::RoleInUse {
            name: "SALES".into(),
            users: 2,
        }
        .into();
        assert_eq!(in_use.extend().message, "conflict: role SALES is assigned to 2 user(s)");

        let bad: ApiError = DbError::UnknownPermission(Uuid::nil()).into();
        assert_eq!(code_of(&bad.extend()), Some(Value::from("INVALID_INPUT")));
    }

    #[test]
    fn authorize_requires_a_matching_category() {
        let perms = vec![Permission::new("order_management:status_check", "view", "all")];
        assert!(authorize(&perms, &[Resource::OrderManagement]).is_ok());
        assert!(matches!(
            authorize(&perms, &[Resource::SystemManagement]),
            Err(ApiError::Forbidden)
        ));
    }
}
