use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::error::AppError;
use crate::state::SharedState;
use crate::store::QueryOptions;

/// An authenticated admin operator.
///
/// The bearer token is validated against the remote store's identity
/// endpoint, then the resulting email is checked against the `admin_users`
/// allow-list collection. Authorization design itself lives in the remote
/// store; this is only the validation step.
#[derive(Debug, Clone)]
pub struct AdminUser {
    pub email: String,
}

impl FromRequestParts<SharedState> for AdminUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &SharedState,
    ) -> Result<Self, Self::Rejection> {
        // Development bypass. The build-type check is hard-coded so the
        // header cannot be enabled in a release binary by configuration.
        if cfg!(debug_assertions) {
            let skip = parts
                .headers
                .get("x-skip-auth")
                .and_then(|v| v.to_str().ok());
            if matches!(skip, Some("1") | Some("true")) {
                return Ok(AdminUser {
                    email: state.config.dev_admin_email.clone(),
                });
            }
        }

        let bearer = parts
            .headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| AppError::Unauthorized("Missing Authorization header".to_string()))?;

        let email = state.store.validate_token(bearer).await?;

        let rows = state
            .store
            .request(
                "admin_users",
                reqwest::Method::GET,
                None,
                QueryOptions::filter("email", &format!("eq.{email}")),
            )
            .await?;

        let is_admin = rows.as_array().is_some_and(|a| !a.is_empty());
        if !is_admin {
            return Err(AppError::Forbidden("Not an admin".to_string()));
        }

        Ok(AdminUser { email })
    }
}
