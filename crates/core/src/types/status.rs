//! Status enums for orders and payments.
//!
//! Values mirror the backend's snake_case choices.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

/// Order lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    Pending,
    Confirmed,
    Processing,
    Shipped,
    OutForDelivery,
    Delivered,
    Cancelled,
    Returned,
}

impl OrderStatus {
    /// Steps shown on the tracking timeline, in order.
    pub const TIMELINE: [Self; 6] = [
        Self::Pending,
        Self::Confirmed,
        Self::Processing,
        Self::Shipped,
        Self::OutForDelivery,
        Self::Delivered,
    ];

    /// Customers may cancel until the order leaves the warehouse.
    #[must_use]
    pub const fn is_cancellable(self) -> bool {
        matches!(self, Self::Pending | Self::Confirmed)
    }

    /// Zero-based position on the tracking timeline, `None` for statuses
    /// that leave the normal flow.
    #[must_use]
    pub fn progress_step(self) -> Option<usize> {
        Self::TIMELINE.iter().position(|step| *step == self)
    }

    /// Customer-facing label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Confirmed => "Confirmed",
            Self::Processing => "Processing",
            Self::Shipped => "Shipped",
            Self::OutForDelivery => "Out for delivery",
            Self::Delivered => "Delivered",
            Self::Cancelled => "Cancelled",
            Self::Returned => "Returned",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// How the customer pays for an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    CashOnDelivery,
    VodafoneCash,
    Instapay,
    BankTransfer,
}

impl PaymentMethod {
    /// All methods, in the order they appear on the checkout form.
    pub const ALL: [Self; 4] = [
        Self::CashOnDelivery,
        Self::VodafoneCash,
        Self::Instapay,
        Self::BankTransfer,
    ];

    /// Wire value used by the backend and in form fields.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CashOnDelivery => "cash_on_delivery",
            Self::VodafoneCash => "vodafone_cash",
            Self::Instapay => "instapay",
            Self::BankTransfer => "bank_transfer",
        }
    }

    /// Customer-facing label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::CashOnDelivery => "Cash on delivery",
            Self::VodafoneCash => "Vodafone Cash",
            Self::Instapay => "InstaPay",
            Self::BankTransfer => "Bank transfer",
        }
    }

    /// Prepaid methods need an uploaded transfer receipt.
    #[must_use]
    pub const fn requires_proof(self) -> bool {
        !matches!(self, Self::CashOnDelivery)
    }

    /// Wallet transfers are matched by the sender's phone number.
    #[must_use]
    pub const fn requires_sender_phone(self) -> bool {
        matches!(self, Self::VodafoneCash)
    }

    /// Bank-rail transfers are matched by a transaction reference.
    #[must_use]
    pub const fn requires_reference(self) -> bool {
        matches!(self, Self::Instapay | Self::BankTransfer)
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|method| method.as_str() == s)
            .ok_or_else(|| format!("invalid payment method: {s}"))
    }
}

/// Payment verification status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    #[default]
    Pending,
    AwaitingVerification,
    Paid,
    Failed,
    Refunded,
}

impl PaymentStatus {
    /// Customer-facing label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::AwaitingVerification => "Awaiting verification",
            Self::Paid => "Paid",
            Self::Failed => "Failed",
            Self::Refunded => "Refunded",
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_order_status_wire_format() {
        let status: OrderStatus = serde_json::from_str("\"out_for_delivery\"").unwrap();
        assert_eq!(status, OrderStatus::OutForDelivery);
    }

    #[test]
    fn test_cancellable_only_before_shipping() {
        assert!(OrderStatus::Pending.is_cancellable());
        assert!(OrderStatus::Confirmed.is_cancellable());
        assert!(!OrderStatus::Shipped.is_cancellable());
        assert!(!OrderStatus::Cancelled.is_cancellable());
    }

    #[test]
    fn test_progress_step() {
        assert_eq!(OrderStatus::Pending.progress_step(), Some(0));
        assert_eq!(OrderStatus::Delivered.progress_step(), Some(5));
        assert_eq!(OrderStatus::Cancelled.progress_step(), None);
    }

    #[test]
    fn test_payment_method_round_trip_from_form_value() {
        for method in PaymentMethod::ALL {
            assert_eq!(method.as_str().parse::<PaymentMethod>().unwrap(), method);
        }
        assert!("paypal".parse::<PaymentMethod>().is_err());
    }

    #[test]
    fn test_payment_method_requirements() {
        assert!(!PaymentMethod::CashOnDelivery.requires_proof());
        assert!(PaymentMethod::VodafoneCash.requires_sender_phone());
        assert!(PaymentMethod::Instapay.requires_reference());
        assert!(!PaymentMethod::VodafoneCash.requires_reference());
    }
}
