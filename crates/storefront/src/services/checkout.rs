//! Checkout validation and order placement.
//!
//! Fields are checked in the order they appear on the form, so the first
//! error is the one the page scrolls to. Prepaid methods need a transfer
//! receipt plus the detail the shop uses to match the transfer: the sender's
//! wallet number for Vodafone Cash, a transaction reference for InstaPay and
//! bank transfers.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tower_sessions::Session;
use tracing::{info, instrument, warn};

use stride_core::{Email, Money, PaymentMethod, PhoneNumber};

use super::cart::{CartError, CartService, CartView};
use super::validation::ValidationErrors;
use crate::backend::{BackendClient, BackendError, NewOrder, Order, PaymentProof, ShippingAddress};
use crate::geography::Geography;
use crate::models::{CurrentCustomer, keys};

/// Largest accepted payment receipt.
pub const MAX_PROOF_BYTES: usize = 5 * 1024 * 1024;

/// Receipt formats the shop can review.
pub const ALLOWED_PROOF_TYPES: [&str; 4] =
    ["image/jpeg", "image/png", "image/webp", "application/pdf"];

const MIN_NAME_CHARS: usize = 3;
const MIN_ADDRESS_CHARS: usize = 10;
const MIN_REFERENCE_CHARS: usize = 6;

#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("validation failed: {0}")]
    Validation(ValidationErrors),

    /// The backend refused the order with a customer-facing reason.
    #[error("order rejected: {0}")]
    Rejected(String),

    #[error("cart error: {0}")]
    Cart(#[from] CartError),

    #[error("backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("session error: {0}")]
    Session(#[from] tower_sessions::session::Error),
}

impl CheckoutError {
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation(errors) => errors.to_string(),
            Self::Rejected(reason) => reason.clone(),
            Self::Cart(err) => err.user_message(),
            Self::Backend(err) => err.user_message(),
            Self::Session(_) => "Something went wrong. Please try again.".to_string(),
        }
    }
}

/// Checkout form fields as submitted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckoutForm {
    pub full_name: String,
    pub phone: String,
    pub email: String,
    /// Governorate id from the dataset
    pub governorate: String,
    pub city: String,
    pub address: String,
    pub notes: String,
    pub payment_method: String,
    pub sender_phone: String,
    pub transaction_reference: String,
}

impl CheckoutForm {
    /// Set a field from a multipart part. Unknown names are ignored.
    pub fn set(&mut self, name: &str, value: String) {
        let slot = match name {
            "full_name" => &mut self.full_name,
            "phone" => &mut self.phone,
            "email" => &mut self.email,
            "governorate" => &mut self.governorate,
            "city" => &mut self.city,
            "address" => &mut self.address,
            "notes" => &mut self.notes,
            "payment_method" => &mut self.payment_method,
            "sender_phone" => &mut self.sender_phone,
            "transaction_reference" => &mut self.transaction_reference,
            _ => return,
        };
        *slot = value;
    }

    /// Prefill contact fields for a signed-in customer.
    #[must_use]
    pub fn for_customer(customer: &CurrentCustomer) -> Self {
        Self {
            full_name: customer.user.display_name(),
            phone: customer.user.phone.clone().unwrap_or_default(),
            email: customer.user.email.clone(),
            payment_method: PaymentMethod::CashOnDelivery.as_str().to_string(),
            ..Self::default()
        }
    }
}

/// A checkout that passed validation.
#[derive(Debug, Clone)]
pub struct ValidatedCheckout {
    pub shipping_address: ShippingAddress,
    pub governorate_id: String,
    pub shipping_cost: Money,
    pub payment_method: PaymentMethod,
    pub sender_phone: Option<PhoneNumber>,
    pub transaction_reference: Option<String>,
}

fn non_empty(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

/// Validate the checkout form.
///
/// # Errors
///
/// Returns every failing field, in form order.
pub fn validate(
    form: &CheckoutForm,
    proof: Option<&PaymentProof>,
    geography: &Geography,
    cart_is_empty: bool,
) -> Result<ValidatedCheckout, ValidationErrors> {
    let mut errors = ValidationErrors::new();

    let full_name = form.full_name.trim();
    if full_name.is_empty() {
        errors.add("full_name", "Full name is required");
    } else if full_name.chars().count() < MIN_NAME_CHARS {
        errors.add(
            "full_name",
            format!("Full name must be at least {MIN_NAME_CHARS} characters"),
        );
    }

    let phone = PhoneNumber::parse(&form.phone)
        .map_err(|e| errors.add("phone", e.to_string()))
        .ok();

    let email = match non_empty(&form.email) {
        Some(raw) => Email::parse(&raw)
            .map_err(|e| errors.add("email", e.to_string()))
            .ok(),
        None => None,
    };

    let governorate = if form.governorate.trim().is_empty() {
        errors.add("governorate", "Please choose a governorate");
        None
    } else {
        let found = geography.governorate(form.governorate.trim());
        if found.is_none() {
            errors.add("governorate", "Please choose a governorate from the list");
        }
        found
    };

    let city = if form.city.trim().is_empty() {
        errors.add("city", "City is required");
        None
    } else {
        match governorate {
            Some(governorate) => {
                let found = governorate.city(&form.city);
                if found.is_none() {
                    errors.add(
                        "city",
                        format!("Please choose a city in {}", governorate.name_en),
                    );
                }
                found
            }
            None => None,
        }
    };

    let address = form.address.trim();
    if address.is_empty() {
        errors.add("address", "Address is required");
    } else if address.chars().count() < MIN_ADDRESS_CHARS {
        errors.add(
            "address",
            format!("Please enter at least {MIN_ADDRESS_CHARS} characters of address detail"),
        );
    }

    let payment_method = if form.payment_method.trim().is_empty() {
        errors.add("payment_method", "Please choose a payment method");
        None
    } else {
        form.payment_method
            .trim()
            .parse::<PaymentMethod>()
            .map_err(|_| errors.add("payment_method", "Please choose a payment method"))
            .ok()
    };

    let mut sender_phone = None;
    let mut transaction_reference = None;
    if let Some(method) = payment_method.filter(|m| m.requires_proof()) {
        match proof {
            None => errors.add("payment_proof", "Please upload your payment receipt"),
            Some(proof) if proof.bytes.is_empty() => {
                errors.add("payment_proof", "Please upload your payment receipt");
            }
            Some(proof) if !ALLOWED_PROOF_TYPES.contains(&proof.content_type.as_str()) => {
                errors.add(
                    "payment_proof",
                    "Receipt must be a JPEG, PNG or WebP image, or a PDF",
                );
            }
            Some(proof) if proof.bytes.len() > MAX_PROOF_BYTES => {
                errors.add("payment_proof", "Receipt must be 5 MB or smaller");
            }
            Some(_) => {}
        }

        if method.requires_sender_phone() {
            sender_phone = match PhoneNumber::parse(&form.sender_phone) {
                Ok(phone) => Some(phone),
                Err(e) => {
                    errors.add("sender_phone", format!("Sender number: {e}"));
                    None
                }
            };
        }

        if method.requires_reference() {
            let reference = form.transaction_reference.trim();
            if reference.is_empty() {
                errors.add("transaction_reference", "Transaction reference is required");
            } else if reference.chars().count() < MIN_REFERENCE_CHARS {
                errors.add(
                    "transaction_reference",
                    format!(
                        "Transaction reference must be at least {MIN_REFERENCE_CHARS} characters"
                    ),
                );
            } else {
                transaction_reference = Some(reference.to_string());
            }
        }
    }

    if cart_is_empty {
        errors.add("cart", "Your cart is empty");
    }

    match (phone, governorate, city, payment_method) {
        (Some(phone), Some(governorate), Some(city), Some(payment_method))
            if errors.is_empty() =>
        {
            Ok(ValidatedCheckout {
                shipping_address: ShippingAddress {
                    full_name: full_name.to_string(),
                    phone: phone.as_str().to_string(),
                    email: email.map(Email::into_inner),
                    governorate: governorate.name_en.clone(),
                    city: city.name_en.clone(),
                    address: address.to_string(),
                    notes: non_empty(&form.notes),
                },
                governorate_id: governorate.id.clone(),
                shipping_cost: governorate.shipping_cost,
                payment_method,
                sender_phone,
                transaction_reference,
            })
        }
        _ => Err(errors),
    }
}

/// Cart totals plus shipping for the checkout page.
#[derive(Debug, Clone, Serialize)]
pub struct CheckoutSummary {
    pub cart: CartView,
    pub shipping: Option<Money>,
    pub total: Money,
}

impl CheckoutSummary {
    #[must_use]
    pub fn new(cart: CartView, shipping: Option<Money>) -> Self {
        let total = cart.total_with_shipping(shipping.unwrap_or(Money::ZERO));
        let shipping = if cart.free_shipping {
            shipping.map(|_| Money::ZERO)
        } else {
            shipping
        };
        Self {
            cart,
            shipping,
            total,
        }
    }
}

pub struct CheckoutService<'a> {
    backend: &'a BackendClient,
    session: &'a Session,
    geography: &'a Geography,
    customer: Option<&'a CurrentCustomer>,
}

impl<'a> CheckoutService<'a> {
    #[must_use]
    pub const fn new(
        backend: &'a BackendClient,
        session: &'a Session,
        geography: &'a Geography,
        customer: Option<&'a CurrentCustomer>,
    ) -> Self {
        Self {
            backend,
            session,
            geography,
            customer,
        }
    }

    const fn cart(&self) -> CartService<'a> {
        CartService::new(self.backend, self.session, self.customer)
    }

    /// Totals for a governorate, or without shipping if none is chosen.
    ///
    /// # Errors
    ///
    /// Returns an error if the cart cannot be loaded.
    pub async fn summary(&self, governorate_id: Option<&str>) -> Result<CheckoutSummary, CheckoutError> {
        let cart = self.cart().view().await?;
        let shipping = governorate_id.and_then(|id| self.geography.shipping_cost(id));
        Ok(CheckoutSummary::new(cart, shipping))
    }

    /// Validate and place the order, then empty the cart.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::Validation` with every failing field, or the
    /// backend's reason if it refuses the order.
    #[instrument(skip(self, form, proof), fields(guest = self.customer.is_none()))]
    pub async fn submit(
        &self,
        form: &CheckoutForm,
        proof: Option<PaymentProof>,
    ) -> Result<Order, CheckoutError> {
        let cart = self.cart().view().await?;
        let checkout = validate(form, proof.as_ref(), self.geography, cart.is_empty())
            .map_err(CheckoutError::Validation)?;

        let order = NewOrder {
            shipping_address: checkout.shipping_address,
            governorate_id: checkout.governorate_id,
            payment_method: checkout.payment_method,
            sender_phone: checkout.sender_phone.map(|p| p.as_str().to_string()),
            transaction_reference: checkout.transaction_reference,
            coupon_code: cart.coupon.as_ref().map(|c| c.code.clone()),
            items: cart.offer_lines(),
            payment_proof: proof.filter(|_| checkout.payment_method.requires_proof()),
        };

        let token = self.customer.map(CurrentCustomer::access_token);
        let placed = self
            .backend
            .create_order(token, order)
            .await
            .map_err(|err| match err {
                BackendError::Status { status, .. } if (400..500).contains(&status) => {
                    CheckoutError::Rejected(err.user_message())
                }
                other => CheckoutError::Backend(other),
            })?;

        if let Err(e) = self.cart().clear().await {
            warn!(error = %e, order_number = %placed.order_number, "Failed to clear cart after order");
        }
        self.session
            .insert(keys::LAST_ORDER, &placed.order_number)
            .await?;

        info!(
            order_number = %placed.order_number,
            total = %placed.total,
            "Checkout complete"
        );
        Ok(placed)
    }

    /// Whether this visitor just placed `order_number`.
    ///
    /// # Errors
    ///
    /// Returns an error if the session cannot be read.
    pub async fn is_last_order(&self, order_number: &str) -> Result<bool, CheckoutError> {
        Ok(self
            .session
            .get::<String>(keys::LAST_ORDER)
            .await?
            .is_some_and(|last| last == order_number))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn geography() -> Geography {
        Geography::egypt().unwrap()
    }

    fn cash_form() -> CheckoutForm {
        CheckoutForm {
            full_name: "Mona Adel".into(),
            phone: "0100 123 4567".into(),
            governorate: "giza".into(),
            city: "Dokki".into(),
            address: "12 Tahrir Street, 3rd floor".into(),
            payment_method: "cash_on_delivery".into(),
            ..CheckoutForm::default()
        }
    }

    fn receipt(content_type: &str, len: usize) -> PaymentProof {
        PaymentProof {
            file_name: "receipt".into(),
            content_type: content_type.into(),
            bytes: vec![1; len],
        }
    }

    #[test]
    fn test_cash_on_delivery_needs_no_proof() {
        let geography = geography();
        let checkout = validate(&cash_form(), None, &geography, false).unwrap();
        assert_eq!(checkout.shipping_address.phone, "01001234567");
        assert_eq!(checkout.shipping_address.governorate, "Giza");
        assert_eq!(checkout.shipping_cost, geography.shipping_cost("giza").unwrap());
        assert!(checkout.sender_phone.is_none());
    }

    #[test]
    fn test_arabic_city_name_accepted() {
        let form = CheckoutForm {
            city: "الدقي".into(),
            ..cash_form()
        };
        let checkout = validate(&form, None, &geography(), false).unwrap();
        assert_eq!(checkout.shipping_address.city, "Dokki");
    }

    #[test]
    fn test_errors_follow_form_order() {
        let form = CheckoutForm {
            full_name: "Al".into(),
            address: "short".into(),
            payment_method: "vodafone_cash".into(),
            ..CheckoutForm::default()
        };
        let errors = validate(&form, None, &geography(), true).unwrap_err();
        let fields: Vec<&str> = errors.iter().map(|e| e.field).collect();
        assert_eq!(
            fields,
            [
                "full_name",
                "phone",
                "governorate",
                "city",
                "address",
                "payment_proof",
                "sender_phone",
                "cart"
            ]
        );
        assert_eq!(errors.first_field(), Some("full_name"));
    }

    #[test]
    fn test_city_must_belong_to_governorate() {
        let form = CheckoutForm {
            city: "Hurghada".into(),
            ..cash_form()
        };
        let errors = validate(&form, None, &geography(), false).unwrap_err();
        assert_eq!(errors.first_field(), Some("city"));
    }

    #[test]
    fn test_vodafone_cash_requires_sender_phone() {
        let form = CheckoutForm {
            payment_method: "vodafone_cash".into(),
            sender_phone: "01112345678".into(),
            ..cash_form()
        };
        let proof = receipt("image/png", 2048);
        let checkout = validate(&form, Some(&proof), &geography(), false).unwrap();
        assert_eq!(checkout.sender_phone.unwrap().as_str(), "01112345678");
        assert!(checkout.transaction_reference.is_none());
    }

    #[test]
    fn test_instapay_requires_reference() {
        let form = CheckoutForm {
            payment_method: "instapay".into(),
            transaction_reference: "AB12".into(),
            ..cash_form()
        };
        let proof = receipt("application/pdf", 2048);
        let errors = validate(&form, Some(&proof), &geography(), false).unwrap_err();
        assert_eq!(errors.first_field(), Some("transaction_reference"));

        let form = CheckoutForm {
            transaction_reference: "IP-778812".into(),
            ..form
        };
        let checkout = validate(&form, Some(&proof), &geography(), false).unwrap();
        assert_eq!(checkout.transaction_reference.as_deref(), Some("IP-778812"));
    }

    #[test]
    fn test_receipt_type_and_size() {
        let form = CheckoutForm {
            payment_method: "bank_transfer".into(),
            transaction_reference: "TRX-000981".into(),
            ..cash_form()
        };

        let gif = receipt("image/gif", 100);
        let errors = validate(&form, Some(&gif), &geography(), false).unwrap_err();
        assert!(errors.get("payment_proof").unwrap().contains("PDF"));

        let huge = receipt("image/jpeg", MAX_PROOF_BYTES + 1);
        let errors = validate(&form, Some(&huge), &geography(), false).unwrap_err();
        assert_eq!(errors.get("payment_proof"), Some("Receipt must be 5 MB or smaller"));

        let ok = receipt("image/jpeg", MAX_PROOF_BYTES);
        assert!(validate(&form, Some(&ok), &geography(), false).is_ok());
    }

    #[test]
    fn test_invalid_optional_email() {
        let form = CheckoutForm {
            email: "mona@".into(),
            ..cash_form()
        };
        let errors = validate(&form, None, &geography(), false).unwrap_err();
        assert_eq!(errors.first_field(), Some("email"));
    }

    #[test]
    fn test_form_set_from_parts() {
        let mut form = CheckoutForm::default();
        form.set("governorate", "cairo".into());
        form.set("csrf", "ignored".into());
        assert_eq!(form.governorate, "cairo");
    }

    #[test]
    fn test_summary_adds_shipping_unless_free() {
        let cart = CartView {
            total: Money::from_piastres(100_000),
            ..CartView::empty()
        };
        let summary = CheckoutSummary::new(cart.clone(), Some(Money::from_piastres(6_000)));
        assert_eq!(summary.total, Money::from_piastres(106_000));

        let free = CartView {
            free_shipping: true,
            ..cart
        };
        let summary = CheckoutSummary::new(free, Some(Money::from_piastres(6_000)));
        assert_eq!(summary.total, Money::from_piastres(100_000));
        assert_eq!(summary.shipping, Some(Money::ZERO));
    }
}
