//! Account page handlers (requires auth).

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tower_sessions::Session;
use tracing::instrument;

use super::Shell;
use crate::backend::Order;
use crate::error::Result;
use crate::filters;
use crate::middleware::RequireAuth;
use crate::models::CurrentCustomer;
use crate::services::auth::{PasswordChangeForm, ProfileForm};
use crate::services::{AuthError, AuthService, ValidationErrors};
use crate::state::AppState;

/// Orders shown on the account page.
const RECENT_ORDERS: usize = 5;

/// Account page template.
#[derive(Template, WebTemplate)]
#[template(path = "account/index.html")]
pub struct AccountTemplate {
    pub shell: Shell,
    pub profile: ProfileForm,
    pub email: String,
    pub recent_orders: Vec<Order>,
    pub errors: ValidationErrors,
    pub notice: Option<String>,
    pub error: Option<String>,
}

impl AccountTemplate {
    #[must_use]
    pub fn field_error(&self, field: &str) -> &str {
        self.errors.get(field).unwrap_or_default()
    }
}

fn profile_form(customer: &CurrentCustomer) -> ProfileForm {
    ProfileForm {
        first_name: customer.user.first_name.clone(),
        last_name: customer.user.last_name.clone(),
        phone: customer.user.phone.clone().unwrap_or_default(),
    }
}

/// The account page is still useful without order history, so a failed
/// lookup renders an empty list.
async fn recent_orders(state: &AppState, customer: &CurrentCustomer) -> Vec<Order> {
    match state.backend().list_orders(customer.access_token(), 1).await {
        Ok(page) => page.results.into_iter().take(RECENT_ORDERS).collect(),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to load recent orders");
            Vec::new()
        }
    }
}

async fn render(
    state: &AppState,
    customer: &CurrentCustomer,
    profile: ProfileForm,
    errors: ValidationErrors,
    notice: Option<String>,
    error: Option<String>,
) -> AccountTemplate {
    AccountTemplate {
        shell: Shell::new(Some(customer)),
        profile,
        email: customer.user.email.clone(),
        recent_orders: recent_orders(state, customer).await,
        errors,
        notice,
        error,
    }
}

/// Split a failed form into field errors and a banner message.
fn form_failure(err: AuthError) -> Result<(ValidationErrors, Option<String>)> {
    match err {
        AuthError::Validation(errors) => Ok((errors, None)),
        err @ AuthError::Rejected(_) => Ok((ValidationErrors::new(), Some(err.user_message()))),
        other => Err(other.into()),
    }
}

/// Display account page.
#[instrument(skip_all)]
pub async fn index(
    State(state): State<AppState>,
    RequireAuth(customer): RequireAuth,
) -> impl IntoResponse {
    let profile = profile_form(&customer);
    render(&state, &customer, profile, ValidationErrors::new(), None, None).await
}

/// Update name and phone.
#[instrument(skip_all)]
pub async fn update_profile(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(customer): RequireAuth,
    Form(form): Form<ProfileForm>,
) -> Result<Response> {
    let service = AuthService::new(state.backend(), &session, state.config().access_token_ttl);

    match service.update_profile(&customer, &form).await {
        Ok(updated) => {
            let profile = profile_form(&updated);
            Ok(render(
                &state,
                &updated,
                profile,
                ValidationErrors::new(),
                Some("Profile updated.".to_string()),
                None,
            )
            .await
            .into_response())
        }
        Err(err) => {
            let (errors, error) = form_failure(err)?;
            let page = render(&state, &customer, form, errors, None, error).await;
            Ok((StatusCode::UNPROCESSABLE_ENTITY, page).into_response())
        }
    }
}

/// Change the account password.
#[instrument(skip_all)]
pub async fn change_password(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(customer): RequireAuth,
    Form(form): Form<PasswordChangeForm>,
) -> Result<Response> {
    let service = AuthService::new(state.backend(), &session, state.config().access_token_ttl);
    let profile = profile_form(&customer);

    match service.change_password(&customer, &form).await {
        Ok(()) => Ok(render(
            &state,
            &customer,
            profile,
            ValidationErrors::new(),
            Some("Password changed.".to_string()),
            None,
        )
        .await
        .into_response()),
        Err(err) => {
            let (errors, error) = form_failure(err)?;
            let page = render(&state, &customer, profile, errors, None, error).await;
            Ok((StatusCode::UNPROCESSABLE_ENTITY, page).into_response())
        }
    }
}
