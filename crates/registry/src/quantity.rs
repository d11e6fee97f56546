use core::num::NonZeroU32;

use serde::{Deserialize, Serialize};

use partyplan_core::ValueObject;

use crate::error::ReservationError;

/// A strictly positive unit count (claim size or item target).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct Quantity(NonZeroU32);

impl ValueObject for Quantity {}

impl Quantity {
    pub const ONE: Quantity = Quantity(NonZeroU32::MIN);

    pub fn new(value: u32) -> Result<Self, ReservationError> {
        NonZeroU32::new(value)
            .map(Self)
            .ok_or_else(|| ReservationError::invalid_quantity("quantity must be positive"))
    }

    pub fn get(self) -> u32 {
        self.0.get()
    }
}

impl TryFrom<u32> for Quantity {
    type Error = ReservationError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<i64> for Quantity {
    type Error = ReservationError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        if value <= 0 {
            return Err(ReservationError::invalid_quantity("quantity must be positive"));
        }
        let value = u32::try_from(value)
            .map_err(|_| ReservationError::invalid_quantity("quantity is too large"))?;
        Self::new(value)
    }
}

impl From<Quantity> for u32 {
    fn from(value: Quantity) -> Self {
        value.get()
    }
}

impl core::fmt::Display for Quantity {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_and_negative_are_invalid_quantities() {
        assert!(matches!(Quantity::new(0), Err(ReservationError::InvalidQuantity(_))));
        assert!(matches!(Quantity::try_from(-3i64), Err(ReservationError::InvalidQuantity(_))));
        assert!(matches!(
            Quantity::try_from(i64::from(u32::MAX) + 1),
            Err(ReservationError::InvalidQuantity(_))
        ));
    }

    #[test]
    fn deserializing_zero_fails() {
        assert!(serde_json::from_str::<Quantity>("0").is_err());
        assert_eq!(serde_json::from_str::<Quantity>("4").unwrap().get(), 4);
    }
}
