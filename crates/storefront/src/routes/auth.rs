//! Sign-in, sign-up and sign-out handlers.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use super::Shell;
use crate::error::{Result, clear_sentry_user, set_sentry_user};
use crate::filters;
use crate::middleware::OptionalAuth;
use crate::services::auth::{LoginForm, RegisterForm};
use crate::services::{AuthError, AuthService, ValidationErrors};
use crate::state::AppState;

/// Where customers land after signing in without a `next` path.
const DEFAULT_LANDING: &str = "/account";

#[derive(Debug, Default, Deserialize)]
pub struct NextQuery {
    pub next: Option<String>,
}

/// Login page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/login.html")]
pub struct LoginTemplate {
    pub shell: Shell,
    pub email: String,
    pub next: String,
    pub errors: ValidationErrors,
    pub error: Option<String>,
}

impl LoginTemplate {
    #[must_use]
    pub fn field_error(&self, field: &str) -> &str {
        self.errors.get(field).unwrap_or_default()
    }
}

/// Registration page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/register.html")]
pub struct RegisterTemplate {
    pub shell: Shell,
    pub form: RegisterForm,
    pub errors: ValidationErrors,
    pub error: Option<String>,
}

impl RegisterTemplate {
    #[must_use]
    pub fn field_error(&self, field: &str) -> &str {
        self.errors.get(field).unwrap_or_default()
    }
}

/// Only same-site paths are followed after sign-in.
fn safe_next(next: Option<&str>) -> &str {
    match next.map(str::trim) {
        Some(path) if path.starts_with('/') && !path.starts_with("//") && !path.contains('\\') => {
            path
        }
        _ => DEFAULT_LANDING,
    }
}

/// Split an auth failure into field errors and a banner message.
fn form_failure(err: AuthError) -> Result<(StatusCode, ValidationErrors, Option<String>)> {
    match err {
        AuthError::Validation(errors) => Ok((StatusCode::UNPROCESSABLE_ENTITY, errors, None)),
        err @ AuthError::InvalidCredentials => Ok((
            StatusCode::UNAUTHORIZED,
            ValidationErrors::new(),
            Some(err.user_message()),
        )),
        err @ AuthError::Rejected(_) => Ok((
            StatusCode::UNPROCESSABLE_ENTITY,
            ValidationErrors::new(),
            Some(err.user_message()),
        )),
        other => Err(other.into()),
    }
}

/// Display login page.
#[instrument(skip_all)]
pub async fn login_page(
    OptionalAuth(customer): OptionalAuth,
    Query(query): Query<NextQuery>,
) -> Response {
    if customer.is_some() {
        return Redirect::to(safe_next(query.next.as_deref())).into_response();
    }

    LoginTemplate {
        shell: Shell::default(),
        email: String::new(),
        next: query.next.unwrap_or_default(),
        errors: ValidationErrors::new(),
        error: None,
    }
    .into_response()
}

/// Handle login form submission.
#[instrument(skip_all)]
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<LoginForm>,
) -> Result<Response> {
    let service = AuthService::new(state.backend(), &session, state.config().access_token_ttl);

    match service.login(&form).await {
        Ok(customer) => {
            set_sentry_user(&customer.user.id, Some(&customer.user.email));
            Ok(Redirect::to(safe_next(form.next.as_deref())).into_response())
        }
        Err(err) => {
            let (status, errors, error) = form_failure(err)?;
            Ok((
                status,
                LoginTemplate {
                    shell: Shell::default(),
                    email: form.email,
                    next: form.next.unwrap_or_default(),
                    errors,
                    error,
                },
            )
                .into_response())
        }
    }
}

/// Display registration page.
#[instrument(skip_all)]
pub async fn register_page(OptionalAuth(customer): OptionalAuth) -> Response {
    if customer.is_some() {
        return Redirect::to(DEFAULT_LANDING).into_response();
    }

    RegisterTemplate {
        shell: Shell::default(),
        form: RegisterForm::default(),
        errors: ValidationErrors::new(),
        error: None,
    }
    .into_response()
}

/// Handle registration form submission.
#[instrument(skip_all)]
pub async fn register(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<RegisterForm>,
) -> Result<Response> {
    let service = AuthService::new(state.backend(), &session, state.config().access_token_ttl);

    match service.register(&form).await {
        Ok(customer) => {
            set_sentry_user(&customer.user.id, Some(&customer.user.email));
            Ok(Redirect::to(DEFAULT_LANDING).into_response())
        }
        Err(err) => {
            let (status, errors, error) = form_failure(err)?;
            // Never echo passwords back into the page
            let form = RegisterForm {
                password: String::new(),
                password_confirm: String::new(),
                ..form
            };
            Ok((
                status,
                RegisterTemplate {
                    shell: Shell::default(),
                    form,
                    errors,
                    error,
                },
            )
                .into_response())
        }
    }
}

/// Handle logout.
#[instrument(skip_all)]
pub async fn logout(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(customer): OptionalAuth,
) -> Result<Redirect> {
    if let Some(customer) = customer {
        AuthService::new(state.backend(), &session, state.config().access_token_ttl)
            .logout(&customer)
            .await?;
    }
    clear_sentry_user();
    Ok(Redirect::to("/"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_safe_next_only_follows_local_paths() {
        assert_eq!(safe_next(Some("/orders/12")), "/orders/12");
        assert_eq!(safe_next(Some("https://evil.example")), DEFAULT_LANDING);
        assert_eq!(safe_next(Some("//evil.example")), DEFAULT_LANDING);
        assert_eq!(safe_next(Some("/\\evil.example")), DEFAULT_LANDING);
        assert_eq!(safe_next(None), DEFAULT_LANDING);
    }
}
