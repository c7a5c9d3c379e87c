//! Checkout route handlers.
//!
//! The form posts as multipart so a payment receipt can be attached. Failed
//! validation re-renders the form with every error and the id of the first
//! failing field, which the page scrolls to.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Multipart, Query, State},
    http::{HeaderMap, StatusCode},
    response::{AppendHeaders, IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use stride_core::PaymentMethod;

use super::{Shell, is_htmx};
use crate::backend::PaymentProof;
use crate::error::{AppError, Result};
use crate::filters;
use crate::geography::{AddressMatch, Governorate};
use crate::middleware::OptionalAuth;
use crate::models::CurrentCustomer;
use crate::services::checkout::CheckoutSummary;
use crate::services::{CheckoutError, CheckoutForm, CheckoutService, ValidationErrors};
use crate::state::AppState;

/// Suggestions shown under the address search box.
const SUGGESTION_LIMIT: usize = 8;

/// Checkout page template.
#[derive(Template, WebTemplate)]
#[template(path = "checkout/show.html")]
pub struct CheckoutTemplate {
    pub shell: Shell,
    pub form: CheckoutForm,
    pub summary: CheckoutSummary,
    pub governorates: Vec<Governorate>,
    pub methods: [PaymentMethod; 4],
    pub errors: ValidationErrors,
    pub error: Option<String>,
}

impl CheckoutTemplate {
    /// Message for a field, empty when it passed.
    #[must_use]
    pub fn field_error(&self, field: &str) -> &str {
        self.errors.get(field).unwrap_or_default()
    }

    #[must_use]
    pub fn first_error(&self) -> &str {
        self.errors.first_field().unwrap_or_default()
    }

    /// Cities of the selected governorate, for the city datalist.
    #[must_use]
    pub fn cities(&self) -> Vec<String> {
        self.governorates
            .iter()
            .find(|g| g.id == self.form.governorate)
            .map(|g| g.cities.iter().map(|c| c.name_en.clone()).collect())
            .unwrap_or_default()
    }
}

/// Address suggestions fragment template (for HTMX).
#[derive(Template, WebTemplate)]
#[template(path = "partials/address_results.html")]
pub struct AddressResultsTemplate {
    pub matches: Vec<AddressMatch>,
}

/// Totals fragment template (for HTMX).
#[derive(Template, WebTemplate)]
#[template(path = "partials/checkout_summary.html")]
pub struct CheckoutSummaryTemplate {
    pub summary: CheckoutSummary,
}

#[derive(Debug, Deserialize)]
pub struct AddressQuery {
    #[serde(default)]
    pub q: String,
}

#[derive(Debug, Deserialize)]
pub struct ShippingQuery {
    #[serde(default)]
    pub governorate: String,
}

fn render_form(
    state: &AppState,
    customer: Option<&CurrentCustomer>,
    form: CheckoutForm,
    summary: CheckoutSummary,
    errors: ValidationErrors,
    error: Option<String>,
) -> CheckoutTemplate {
    CheckoutTemplate {
        shell: Shell::new(customer),
        form,
        summary,
        governorates: state.geography().governorates().to_vec(),
        methods: PaymentMethod::ALL,
        errors,
        error,
    }
}

/// Display the checkout form.
#[instrument(skip_all)]
pub async fn show(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(customer): OptionalAuth,
) -> Result<Response> {
    let service = CheckoutService::new(
        state.backend(),
        &session,
        state.geography(),
        customer.as_ref(),
    );
    let summary = service.summary(None).await?;
    if summary.cart.is_empty() {
        return Ok(Redirect::to("/cart").into_response());
    }

    let form = customer.as_ref().map_or_else(
        || CheckoutForm {
            payment_method: PaymentMethod::CashOnDelivery.as_str().to_string(),
            ..CheckoutForm::default()
        },
        CheckoutForm::for_customer,
    );

    Ok(render_form(
        &state,
        customer.as_ref(),
        form,
        summary,
        ValidationErrors::new(),
        None,
    )
    .into_response())
}

/// Read the multipart checkout form and the optional receipt.
async fn read_form(
    mut multipart: Multipart,
) -> Result<(CheckoutForm, Option<PaymentProof>)> {
    let mut form = CheckoutForm::default();
    let mut proof = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("Invalid form data: {e}")))?
    {
        let name = field.name().unwrap_or_default().to_string();
        if name == "payment_proof" {
            let file_name = field.file_name().unwrap_or_default().to_string();
            let content_type = field.content_type().unwrap_or_default().to_string();
            let bytes = field
                .bytes()
                .await
                .map_err(|e| AppError::BadRequest(format!("Invalid upload: {e}")))?;
            // Browsers send an empty part when no file was chosen
            if !file_name.is_empty() && !bytes.is_empty() {
                proof = Some(PaymentProof {
                    file_name,
                    content_type,
                    bytes: bytes.to_vec(),
                });
            }
        } else {
            let value = field
                .text()
                .await
                .map_err(|e| AppError::BadRequest(format!("Invalid form data: {e}")))?;
            form.set(&name, value);
        }
    }

    Ok((form, proof))
}

/// Place the order.
#[instrument(skip_all)]
pub async fn submit(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(customer): OptionalAuth,
    headers: HeaderMap,
    multipart: Multipart,
) -> Result<Response> {
    let (form, proof) = read_form(multipart).await?;
    let service = CheckoutService::new(
        state.backend(),
        &session,
        state.geography(),
        customer.as_ref(),
    );

    let (errors, error) = match service.submit(&form, proof).await {
        Ok(order) => {
            let target = format!(
                "/orders/{}/confirmation",
                urlencoding::encode(&order.order_number)
            );
            if is_htmx(&headers) {
                return Ok(AppendHeaders([("HX-Redirect", target)]).into_response());
            }
            return Ok(Redirect::to(&target).into_response());
        }
        Err(CheckoutError::Validation(errors)) => (errors, None),
        Err(err @ CheckoutError::Rejected(_)) => (ValidationErrors::new(), Some(err.user_message())),
        Err(CheckoutError::Cart(err)) if err.is_user_error() => {
            (ValidationErrors::new(), Some(err.user_message()))
        }
        Err(other) => return Err(other.into()),
    };

    let governorate = Some(form.governorate.as_str()).filter(|g| !g.is_empty());
    let summary = service.summary(governorate).await?;
    Ok((
        StatusCode::UNPROCESSABLE_ENTITY,
        render_form(&state, customer.as_ref(), form, summary, errors, error),
    )
        .into_response())
}

/// Address suggestions for the search box (HTMX).
#[instrument(skip(state))]
pub async fn address_search(
    State(state): State<AppState>,
    Query(query): Query<AddressQuery>,
) -> Result<impl IntoResponse> {
    let matches = state.geography().search(&query.q, SUGGESTION_LIMIT)?;
    Ok(AddressResultsTemplate { matches })
}

/// Totals for the chosen governorate (HTMX).
#[instrument(skip(state, session, customer))]
pub async fn shipping(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(customer): OptionalAuth,
    Query(query): Query<ShippingQuery>,
) -> Result<impl IntoResponse> {
    let summary = CheckoutService::new(
        state.backend(),
        &session,
        state.geography(),
        customer.as_ref(),
    )
    .summary(Some(query.governorate.trim()))
    .await?;
    Ok(CheckoutSummaryTemplate { summary })
}
