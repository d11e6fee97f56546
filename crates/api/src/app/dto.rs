use serde::{Deserialize, Serialize};
use serde_json::Value;

use partyplan_core::{ClaimantId, PlannedEventId};
use partyplan_infra::{ClaimError, NewItem};
use partyplan_registry::ItemSummary;

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct CreateItemRequest {
    pub name: String,
    pub description: Option<String>,
    pub price_cents: Option<u64>,
    pub link: Option<String>,
    #[serde(default)]
    pub target_quantity: Value,
}

impl CreateItemRequest {
    pub fn into_new_item(self, planned_event_id: PlannedEventId) -> Result<NewItem, ClaimError> {
        Ok(NewItem {
            planned_event_id,
            target_quantity: integer_quantity("target_quantity", &self.target_quantity)?,
            name: self.name,
            description: self.description,
            price_cents: self.price_cents,
            link: self.link,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct SetTargetRequest {
    #[serde(default)]
    pub target_quantity: Value,
}

/// Body of `POST .../claims`.
///
/// `quantity` is taken as raw JSON so that `1.5`, `"two"` and `null` surface
/// as `InvalidQuantity` instead of a generic body rejection.
#[derive(Debug, Deserialize)]
pub struct SubmitClaimRequest {
    pub claimant_id: ClaimantId,
    #[serde(default)]
    pub quantity: Value,
    pub contact_info: Option<String>,
    pub message: Option<String>,
    pub request_key: Option<String>,
}

/// Read a JSON value as a whole number.
///
/// Range checks (zero, negative, above `u32::MAX`) happen in `Quantity`; this
/// only refuses what is not an integer at all.
pub fn integer_quantity(field: &str, value: &Value) -> Result<i64, ClaimError> {
    match value {
        Value::Number(n) => match (n.as_i64(), n.as_u64()) {
            (Some(v), _) => Ok(v),
            (None, Some(_)) => Err(ClaimError::InvalidQuantity(format!("{field} is out of range"))),
            (None, None) => Err(ClaimError::InvalidQuantity(format!("{field} must be a whole number"))),
        },
        Value::Null => Err(ClaimError::InvalidQuantity(format!("{field} is required"))),
        _ => Err(ClaimError::InvalidQuantity(format!("{field} must be a number"))),
    }
}

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Serialize)]
pub struct ItemListResponse {
    pub planned_event_id: PlannedEventId,
    pub items: Vec<ItemSummary>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn whole_numbers_pass_through() {
        assert_eq!(integer_quantity("quantity", &json!(3)).unwrap(), 3);
        // Range is checked later by Quantity.
        assert_eq!(integer_quantity("quantity", &json!(-1)).unwrap(), -1);
    }

    #[test]
    fn non_integers_are_invalid_quantities() {
        for value in [json!(1.5), json!("two"), json!(null), json!([1]), json!(true)] {
            let err = integer_quantity("quantity", &value).unwrap_err();
            assert!(matches!(err, ClaimError::InvalidQuantity(_)), "{value} -> {err:?}");
        }
        let err = integer_quantity("quantity", &json!(u64::MAX)).unwrap_err();
        assert!(matches!(err, ClaimError::InvalidQuantity(_)));
    }

    #[test]
    fn claim_body_accepts_any_quantity_shape() {
        let body: SubmitClaimRequest = serde_json::from_value(json!({
            "claimant_id": ClaimantId::new(),
            "quantity": "two",
        }))
        .unwrap();
        assert_eq!(body.quantity, json!("two"));
        assert!(body.request_key.is_none());
    }
}
