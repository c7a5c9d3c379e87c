//! Customer authentication against the backend's JWT endpoints.
//!
//! Credentials are validated locally before any network call. Tokens live
//! in the server-side session; the access token is refreshed shortly before
//! it expires. A rejected refresh token signs the customer out, while a
//! transient failure keeps the current token until it actually expires.

use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::Utc;
use serde::Deserialize;
use thiserror::Error;
use tower_sessions::Session;
use tracing::{info, instrument, warn};

use stride_core::{Email, Password, PhoneNumber};

use super::cart::CartService;
use super::favorites::FavoritesService;
use super::validation::ValidationErrors;
use crate::backend::{
    AuthResponse, BackendClient, BackendError, Credentials, ErrorKind, ProfileUpdate,
    Registration,
};
use crate::models::{CurrentCustomer, SessionTokens, keys};

/// Errors that can occur during authentication operations.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The form failed local validation; nothing was sent.
    #[error("validation failed: {0}")]
    Validation(ValidationErrors),

    /// Wrong email or password.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// The backend refused the request with a customer-facing reason.
    #[error("rejected: {0}")]
    Rejected(String),

    /// The refresh token is no longer valid.
    #[error("session expired")]
    SessionExpired,

    #[error("backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("session error: {0}")]
    Session(#[from] tower_sessions::session::Error),
}

impl AuthError {
    /// Message safe to show to customers.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation(errors) => errors.to_string(),
            Self::InvalidCredentials => "Invalid email or password.".to_string(),
            Self::Rejected(message) => message.clone(),
            Self::SessionExpired => "Your session has expired. Please sign in again.".to_string(),
            Self::Backend(err) => err.user_message(),
            Self::Session(_) => "Something went wrong. Please try again.".to_string(),
        }
    }

    /// Map a backend rejection of a form to a customer-facing error.
    fn from_form_rejection(err: BackendError) -> Self {
        match err {
            BackendError::Status { status, .. } if status < 500 => {
                Self::Rejected(err.user_message())
            }
            other => Self::Backend(other),
        }
    }
}

// =============================================================================
// Forms
// =============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    /// Path to return to after signing in
    #[serde(default)]
    pub next: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RegisterForm {
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub password_confirm: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PasswordChangeForm {
    #[serde(default)]
    pub current_password: String,
    #[serde(default)]
    pub new_password: String,
    #[serde(default)]
    pub confirm_password: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileForm {
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub phone: String,
}

/// A registration that passed local validation.
#[derive(Debug)]
pub struct NewAccount {
    pub email: Email,
    pub password: Password,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<PhoneNumber>,
}

/// Validate a sign-in form.
///
/// # Errors
///
/// Returns the failing fields in form order.
pub fn validate_login(form: &LoginForm) -> Result<Email, ValidationErrors> {
    let mut errors = ValidationErrors::new();
    let email = Email::parse(&form.email)
        .map_err(|e| errors.add("email", e.to_string()))
        .ok();
    if form.password.is_empty() {
        errors.add("password", "Password is required");
    }
    match email {
        Some(email) if errors.is_empty() => Ok(email),
        _ => Err(errors),
    }
}

/// Validate a registration form.
///
/// # Errors
///
/// Returns the failing fields in form order.
pub fn validate_registration(form: &RegisterForm) -> Result<NewAccount, ValidationErrors> {
    let mut errors = ValidationErrors::new();

    let first_name = form.first_name.trim();
    if first_name.is_empty() {
        errors.add("first_name", "First name is required");
    }
    let email = Email::parse(&form.email)
        .map_err(|e| errors.add("email", e.to_string()))
        .ok();
    let phone = if form.phone.trim().is_empty() {
        None
    } else {
        PhoneNumber::parse(&form.phone)
            .map_err(|e| errors.add("phone", e.to_string()))
            .ok()
    };
    let password = Password::parse(&form.password)
        .map_err(|e| errors.add("password", e.to_string()))
        .ok();
    if form.password != form.password_confirm {
        errors.add("password_confirm", "Passwords do not match");
    }

    match (email, password) {
        (Some(email), Some(password)) if errors.is_empty() => Ok(NewAccount {
            email,
            password,
            first_name: first_name.to_string(),
            last_name: form.last_name.trim().to_string(),
            phone,
        }),
        _ => Err(errors),
    }
}

/// Validate a password change form.
///
/// # Errors
///
/// Returns the failing fields in form order.
pub fn validate_password_change(form: &PasswordChangeForm) -> Result<Password, ValidationErrors> {
    let mut errors = ValidationErrors::new();
    if form.current_password.is_empty() {
        errors.add("current_password", "Current password is required");
    }
    let password = Password::parse(&form.new_password)
        .map_err(|e| errors.add("new_password", e.to_string()))
        .ok();
    if form.new_password != form.confirm_password {
        errors.add("confirm_password", "Passwords do not match");
    }
    if !form.current_password.is_empty() && form.current_password == form.new_password {
        errors.add("new_password", "New password must differ from the current one");
    }
    match password {
        Some(password) if errors.is_empty() => Ok(password),
        _ => Err(errors),
    }
}

// =============================================================================
// Tokens
// =============================================================================

#[derive(Deserialize)]
struct Claims {
    exp: i64,
}

/// Read the `exp` claim of a JWT without verifying it. The backend verifies
/// signatures; the storefront only needs to know when to refresh.
#[must_use]
pub fn token_expiry(token: &str) -> Option<i64> {
    let payload = token.split('.').nth(1)?;
    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .ok()?;
    serde_json::from_slice::<Claims>(&bytes).ok().map(|c| c.exp)
}

/// Whether a failed refresh is transient, so the current access token may
/// still be used. Rate limiting counts as transient.
fn keeps_current_token(err: &BackendError) -> bool {
    matches!(err, BackendError::RateLimited(_)) || err.kind() != ErrorKind::Client
}

fn session_tokens(access: String, refresh: String, fallback_ttl: Duration) -> SessionTokens {
    let expires_at = token_expiry(&access).unwrap_or_else(|| {
        Utc::now().timestamp() + i64::try_from(fallback_ttl.as_secs()).unwrap_or(i64::MAX / 2)
    });
    SessionTokens {
        access,
        refresh,
        expires_at,
    }
}

// =============================================================================
// AuthService
// =============================================================================

/// Sign-in, sign-up and token lifecycle for one request.
pub struct AuthService<'a> {
    backend: &'a BackendClient,
    session: &'a Session,
    token_ttl: Duration,
}

impl<'a> AuthService<'a> {
    #[must_use]
    pub const fn new(backend: &'a BackendClient, session: &'a Session, token_ttl: Duration) -> Self {
        Self {
            backend,
            session,
            token_ttl,
        }
    }

    /// Sign in with email and password.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Validation` without contacting the backend when
    /// the form is incomplete, `AuthError::InvalidCredentials` when the
    /// backend rejects the credentials.
    #[instrument(skip_all)]
    pub async fn login(&self, form: &LoginForm) -> Result<CurrentCustomer, AuthError> {
        let email = validate_login(form).map_err(AuthError::Validation)?;

        let credentials = Credentials {
            email: email.as_str(),
            password: &form.password,
        };
        let response = self
            .backend
            .login(&credentials)
            .await
            .map_err(|err| match err {
                BackendError::Unauthorized => AuthError::InvalidCredentials,
                BackendError::Status { status: 400, .. } => AuthError::InvalidCredentials,
                other => AuthError::Backend(other),
            })?;

        self.start_session(response).await
    }

    /// Create an account and sign it in.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Validation` without contacting the backend when
    /// the form is invalid, `AuthError::Rejected` when the backend refuses
    /// the registration (e.g. email already in use).
    #[instrument(skip_all)]
    pub async fn register(&self, form: &RegisterForm) -> Result<CurrentCustomer, AuthError> {
        let account = validate_registration(form).map_err(AuthError::Validation)?;

        let registration = Registration {
            email: account.email.as_str(),
            password: account.password.expose(),
            first_name: &account.first_name,
            last_name: &account.last_name,
            phone: account.phone.as_ref().map(PhoneNumber::as_str),
        };
        let response = self
            .backend
            .register(&registration)
            .await
            .map_err(AuthError::from_form_rejection)?;

        self.start_session(response).await
    }

    /// Store the customer in a fresh session and merge guest state into the
    /// account.
    async fn start_session(&self, response: AuthResponse) -> Result<CurrentCustomer, AuthError> {
        let customer = CurrentCustomer {
            user: response.user,
            tokens: session_tokens(response.access, response.refresh, self.token_ttl),
        };

        self.session.cycle_id().await?;
        self.session.insert(keys::CURRENT_CUSTOMER, &customer).await?;
        self.session.remove_value(keys::OFFERS).await?;

        if let Err(e) = CartService::sync_guest_cart(self.backend, self.session, &customer).await {
            warn!(error = %e, "Failed to merge guest cart");
        }
        if let Err(e) =
            FavoritesService::sync_guest_favorites(self.backend, self.session, &customer).await
        {
            warn!(error = %e, "Failed to merge guest favorites");
        }

        info!(user_id = %customer.user.id, "Customer signed in");
        Ok(customer)
    }

    /// Refresh the access token if it expires within the refresh margin.
    ///
    /// A rejected refresh token signs the customer out. A transient failure
    /// keeps the current token while it is still valid.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::SessionExpired` when the customer had to be
    /// signed out.
    #[instrument(skip_all, fields(user_id = %customer.user.id))]
    pub async fn ensure_fresh(&self, customer: CurrentCustomer) -> Result<CurrentCustomer, AuthError> {
        let now = Utc::now().timestamp();
        if !customer.tokens.needs_refresh(now) {
            return Ok(customer);
        }

        match self.backend.refresh_token(&customer.tokens.refresh).await {
            Ok(refreshed) => {
                // Rotation: keep the old refresh token if no new one came back
                let refresh = refreshed
                    .refresh
                    .unwrap_or_else(|| customer.tokens.refresh.clone());
                let updated = CurrentCustomer {
                    tokens: session_tokens(refreshed.access, refresh, self.token_ttl),
                    user: customer.user,
                };
                self.session.insert(keys::CURRENT_CUSTOMER, &updated).await?;
                Ok(updated)
            }
            Err(err) if keeps_current_token(&err) && now < customer.tokens.expires_at => {
                warn!(error = %err, "Token refresh failed, using current token");
                Ok(customer)
            }
            Err(err) => {
                info!(error = %err, "Token refresh failed, signing out");
                self.clear().await?;
                Err(AuthError::SessionExpired)
            }
        }
    }

    /// Sign out. The backend logout is best effort; the session is always
    /// cleared.
    ///
    /// # Errors
    ///
    /// Returns an error if the session cannot be modified.
    #[instrument(skip_all)]
    pub async fn logout(&self, customer: &CurrentCustomer) -> Result<(), AuthError> {
        if let Err(e) = self
            .backend
            .logout(&customer.tokens.access, &customer.tokens.refresh)
            .await
        {
            warn!(error = %e, "Backend logout failed");
        }
        self.clear().await?;
        self.session.cycle_id().await?;
        Ok(())
    }

    async fn clear(&self) -> Result<(), AuthError> {
        self.session.remove_value(keys::CURRENT_CUSTOMER).await?;
        self.session.remove_value(keys::OFFERS).await?;
        Ok(())
    }

    /// Update name and phone, keeping the session copy in sync.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Validation` for a bad phone number or missing
    /// first name.
    pub async fn update_profile(
        &self,
        customer: &CurrentCustomer,
        form: &ProfileForm,
    ) -> Result<CurrentCustomer, AuthError> {
        let mut errors = ValidationErrors::new();
        if form.first_name.trim().is_empty() {
            errors.add("first_name", "First name is required");
        }
        let phone = if form.phone.trim().is_empty() {
            None
        } else {
            PhoneNumber::parse(&form.phone)
                .map_err(|e| errors.add("phone", e.to_string()))
                .ok()
        };
        if !errors.is_empty() {
            return Err(AuthError::Validation(errors));
        }

        let update = ProfileUpdate {
            first_name: form.first_name.trim().to_string(),
            last_name: form.last_name.trim().to_string(),
            phone: phone.map(|p| p.as_str().to_string()),
        };
        let user = self
            .backend
            .update_profile(customer.access_token(), &update)
            .await
            .map_err(AuthError::from_form_rejection)?;

        let updated = CurrentCustomer {
            user,
            tokens: customer.tokens.clone(),
        };
        self.session.insert(keys::CURRENT_CUSTOMER, &updated).await?;
        Ok(updated)
    }

    /// Change the account password.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Validation` for local failures and
    /// `AuthError::Rejected` if the backend refuses the current password.
    pub async fn change_password(
        &self,
        customer: &CurrentCustomer,
        form: &PasswordChangeForm,
    ) -> Result<(), AuthError> {
        let password = validate_password_change(form).map_err(AuthError::Validation)?;
        self.backend
            .change_password(
                customer.access_token(),
                &form.current_password,
                password.expose(),
            )
            .await
            .map_err(AuthError::from_form_rejection)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn jwt_with_payload(payload: &str) -> String {
        format!("eyJhbGciOiJIUzI1NiJ9.{}.c2lnbmF0dXJl", URL_SAFE_NO_PAD.encode(payload))
    }

    #[test]
    fn test_token_expiry_reads_exp_claim() {
        let token = jwt_with_payload(r#"{"token_type":"access","exp":1767225600,"user_id":4}"#);
        assert_eq!(token_expiry(&token), Some(1_767_225_600));
    }

    #[test]
    fn test_token_expiry_rejects_garbage() {
        assert_eq!(token_expiry("not-a-jwt"), None);
        assert_eq!(token_expiry("a.!!!.c"), None);
        assert_eq!(token_expiry(&jwt_with_payload(r#"{"sub":"4"}"#)), None);
    }

    #[test]
    fn test_refresh_failures_that_keep_the_session() {
        assert!(keeps_current_token(&BackendError::Timeout));
        assert!(keeps_current_token(&BackendError::RateLimited(30)));
        assert!(keeps_current_token(&BackendError::Status {
            status: 502,
            message: None,
        }));
        assert!(!keeps_current_token(&BackendError::Unauthorized));
        assert!(!keeps_current_token(&BackendError::Status {
            status: 400,
            message: Some("Token is blacklisted".into()),
        }));
    }

    #[test]
    fn test_fallback_ttl_when_no_exp() {
        let before = Utc::now().timestamp();
        let tokens = session_tokens("opaque".into(), "r".into(), Duration::from_secs(300));
        assert!(tokens.expires_at >= before + 300);
    }

    #[test]
    fn test_login_validation_without_network() {
        let errors = validate_login(&LoginForm {
            email: "not-an-email".into(),
            password: String::new(),
            next: None,
        })
        .unwrap_err();
        assert_eq!(errors.first_field(), Some("email"));
        assert!(errors.get("password").is_some());
    }

    #[test]
    fn test_login_validation_accepts_any_password() {
        let email = validate_login(&LoginForm {
            email: " Shopper@Example.com ".into(),
            password: "x".into(),
            next: None,
        })
        .unwrap();
        assert_eq!(email.as_str(), "shopper@example.com");
    }

    #[test]
    fn test_registration_rules() {
        let mut form = RegisterForm {
            first_name: "Mona".into(),
            last_name: "Adel".into(),
            email: "mona@example.com".into(),
            phone: "0100 123 4567".into(),
            password: "walking42".into(),
            password_confirm: "walking42".into(),
        };
        let account = validate_registration(&form).unwrap();
        assert_eq!(account.phone.unwrap().as_str(), "01001234567");

        form.password = "short1".into();
        form.password_confirm = "different1".into();
        let errors = validate_registration(&form).unwrap_err();
        assert_eq!(errors.first_field(), Some("password"));
        assert!(errors.get("password_confirm").is_some());
    }

    #[test]
    fn test_password_change_must_differ() {
        let errors = validate_password_change(&PasswordChangeForm {
            current_password: "walking42".into(),
            new_password: "walking42".into(),
            confirm_password: "walking42".into(),
        })
        .unwrap_err();
        assert_eq!(errors.first_field(), Some("new_password"));
    }
}
