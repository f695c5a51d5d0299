//! Application Fee Calculation
//!
//! The platform takes a whole-percentage cut of every direct charge. Amounts
//! are integer minor units and the result is floored, so a 10% fee on
//! 1005 × 1 is 100, never 101.

use serde::{Deserialize, Serialize};

use crate::error::{PaymentError, Result};

/// Default platform cut
pub const DEFAULT_FEE_PERCENT: u8 = 10;

/// Platform fee schedule
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeSchedule {
    percent: u8,
}

impl FeeSchedule {
    /// Create a schedule taking `percent` of the gross amount
    pub fn new(percent: u8) -> Result<Self> {
        if percent > 100 {
            return Err(PaymentError::Config(format!(
                "application fee percent must be within 0..=100, got {percent}"
            )));
        }
        Ok(Self { percent })
    }

    pub fn percent(&self) -> u8 {
        self.percent
    }

    /// Fee in minor units for `quantity` items at `base_price` each.
    ///
    /// Both inputs must be positive.
    pub fn application_fee(&self, base_price: i64, quantity: u64) -> Result<i64> {
        if base_price <= 0 {
            return Err(PaymentError::InvalidRequest(format!(
                "base price must be positive, got {base_price}"
            )));
        }
        if quantity == 0 {
            return Err(PaymentError::InvalidRequest(
                "quantity must be at least 1".into(),
            ));
        }

        let quantity = i64::try_from(quantity)
            .map_err(|_| PaymentError::InvalidRequest("quantity is too large".into()))?;

        base_price
            .checked_mul(quantity)
            .and_then(|gross| gross.checked_mul(i64::from(self.percent)))
            .map(|scaled| scaled / 100)
            .ok_or_else(|| PaymentError::InvalidRequest("order total is too large".into()))
    }
}

impl Default for FeeSchedule {
    fn default() -> Self {
        Self { percent: DEFAULT_FEE_PERCENT }
    }
}
