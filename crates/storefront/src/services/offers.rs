//! Offer breakdowns for the current cart.
//!
//! The backend is the only place discounts are computed. The last breakdown
//! is kept in the session together with a fingerprint of the cart lines it
//! was computed for, so pages that render the same cart do not recompute.

use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::warn;

use crate::backend::{BackendClient, OfferCalculation, OfferLine, OfferRequest};
use crate::models::keys;

/// A breakdown and the cart it belongs to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OfferSnapshot {
    pub fingerprint: String,
    pub calculation: OfferCalculation,
}

/// Stable description of cart lines and coupon. Line order does not matter.
#[must_use]
pub fn fingerprint(lines: &[OfferLine], coupon: Option<&str>) -> String {
    let mut parts: Vec<String> = lines
        .iter()
        .map(|line| {
            format!(
                "{}:{}:{}:{}",
                line.product_id,
                line.variant_id.map_or(0, i64::from),
                line.quantity,
                line.unit_price.amount().normalize()
            )
        })
        .collect();
    parts.sort_unstable();
    format!("{}|{}", parts.join(","), coupon.unwrap_or_default())
}

pub struct OfferService<'a> {
    backend: &'a BackendClient,
    session: &'a Session,
}

impl<'a> OfferService<'a> {
    #[must_use]
    pub const fn new(backend: &'a BackendClient, session: &'a Session) -> Self {
        Self { backend, session }
    }

    async fn snapshot(&self) -> Option<OfferSnapshot> {
        self.session
            .get::<OfferSnapshot>(keys::OFFERS)
            .await
            .ok()
            .flatten()
    }

    /// Breakdown for `lines`.
    ///
    /// An empty cart never reaches the backend. When the backend is
    /// unavailable the cart is shown undiscounted.
    pub async fn calculate(
        &self,
        lines: Vec<OfferLine>,
        coupon: Option<&str>,
        token: Option<&str>,
    ) -> OfferCalculation {
        if lines.is_empty() {
            if let Err(e) = self.session.remove_value(keys::OFFERS).await {
                warn!(error = %e, "Failed to clear offer snapshot");
            }
            return OfferCalculation::empty();
        }

        let fingerprint = fingerprint(&lines, coupon);
        if let Some(snapshot) = self.snapshot().await
            && snapshot.fingerprint == fingerprint
        {
            return snapshot.calculation;
        }

        let request = OfferRequest {
            items: lines,
            coupon_code: coupon.map(ToString::to_string),
        };
        match self.backend.calculate_offers(&request, token).await {
            Ok(calculation) => {
                let snapshot = OfferSnapshot {
                    fingerprint,
                    calculation: calculation.clone(),
                };
                if let Err(e) = self.session.insert(keys::OFFERS, &snapshot).await {
                    warn!(error = %e, "Failed to store offer snapshot");
                }
                calculation
            }
            Err(e) => {
                warn!(error = %e, "Offer calculation failed, showing undiscounted totals");
                undiscounted(&request.items)
            }
        }
    }

    /// Whether active offers currently block coupon codes, with the reason.
    pub async fn coupon_block(&self) -> Option<String> {
        self.snapshot()
            .await
            .filter(|snapshot| snapshot.calculation.coupons_blocked)
            .map(|snapshot| {
                snapshot.calculation.blocking_reason.unwrap_or_else(|| {
                    "Coupons can't be combined with the offers in your cart.".to_string()
                })
            })
    }

    /// Forget the stored breakdown.
    pub async fn invalidate(&self) {
        if let Err(e) = self.session.remove_value(keys::OFFERS).await {
            warn!(error = %e, "Failed to clear offer snapshot");
        }
    }
}

/// Breakdown with no offers applied.
fn undiscounted(lines: &[OfferLine]) -> OfferCalculation {
    let total = lines
        .iter()
        .map(|line| line.unit_price.times(line.quantity))
        .sum();
    OfferCalculation {
        original_total: total,
        discounted_total: total,
        ..OfferCalculation::empty()
    }
}

#[cfg(test)]
mod tests {
    use stride_core::{Money, ProductId, VariantId};

    use super::*;

    fn line(product: i64, quantity: u32) -> OfferLine {
        OfferLine {
            product_id: ProductId::new(product),
            variant_id: Some(VariantId::new(product * 10)),
            quantity,
            unit_price: Money::from_piastres(50_000),
        }
    }

    #[test]
    fn test_fingerprint_ignores_line_order() {
        let a = fingerprint(&[line(1, 1), line(2, 3)], None);
        let b = fingerprint(&[line(2, 3), line(1, 1)], None);
        assert_eq!(a, b);
    }

    #[test]
    fn test_fingerprint_changes_with_quantity_and_coupon() {
        let base = fingerprint(&[line(1, 1)], None);
        assert_ne!(base, fingerprint(&[line(1, 2)], None));
        assert_ne!(base, fingerprint(&[line(1, 1)], Some("SAVE10")));
    }

    #[test]
    fn test_undiscounted_totals() {
        let calculation = undiscounted(&[line(1, 2), line(2, 1)]);
        assert_eq!(calculation.original_total, Money::from_piastres(150_000));
        assert_eq!(calculation.discounted_total, calculation.original_total);
        assert!(calculation.total_discount.is_zero());
        assert!(!calculation.coupons_blocked);
    }
}
