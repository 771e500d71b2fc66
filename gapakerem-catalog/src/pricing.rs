use serde::{Deserialize, Serialize};

use crate::trip::{PrivateTrip, Trip};

/// Tunables for trip pricing
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PricingConfig {
    /// Porters included in a private trip at no extra charge
    pub free_porters: u32,

    /// Flat fee for every porter beyond `free_porters`
    pub porter_surcharge: i64,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            free_porters: 3,
            porter_surcharge: 350_000,
        }
    }
}

/// Breakdown of a computed booking price
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct PriceQuote {
    /// `trip.price * participants`
    pub participants_fee: i64,
    /// `price_per_day * total_days`, zero for open trips
    pub daily_fee: i64,
    /// Surcharge for porters above the free allotment, zero for open trips
    pub porter_fee: i64,
    pub total: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PricingError {
    #[error("Invalid pricing input: {0}")]
    InvalidInput(&'static str),

    #[error("Price exceeds the representable range")]
    Overflow,
}

/// Deterministic price calculator for trip bookings.
///
/// Prices are whole currency units; all arithmetic is checked.
#[derive(Debug, Clone, Default)]
pub struct PricingEngine {
    config: PricingConfig,
}

impl PricingEngine {
    pub fn new(config: PricingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PricingConfig {
        &self.config
    }

    /// Surcharge for `porter_count` porters: `max(0, count - free) * fee`
    pub fn porter_surcharge(&self, porter_count: usize) -> Result<i64, PricingError> {
        let extra = porter_count.saturating_sub(self.config.free_porters as usize);
        let extra = i64::try_from(extra).map_err(|_| PricingError::Overflow)?;
        extra
            .checked_mul(self.config.porter_surcharge)
            .ok_or(PricingError::Overflow)
    }

    /// Open trip: `trip.price * participants`
    pub fn quote_open(&self, trip: &Trip, participants: i32) -> Result<PriceQuote, PricingError> {
        let participants_fee = participants_fee(trip, participants)?;

        Ok(PriceQuote {
            participants_fee,
            daily_fee: 0,
            porter_fee: 0,
            total: participants_fee,
        })
    }

    /// Private trip: participants fee + `price_per_day * total_days` + porter surcharge
    pub fn quote_private(
        &self,
        trip: &Trip,
        private_trip: &PrivateTrip,
        participants: i32,
        total_days: i32,
        porter_count: usize,
    ) -> Result<PriceQuote, PricingError> {
        if total_days <= 0 {
            return Err(PricingError::InvalidInput("total_days must be positive"));
        }
        if private_trip.price_per_day < 0 {
            return Err(PricingError::InvalidInput("price_per_day must not be negative"));
        }

        let participants_fee = participants_fee(trip, participants)?;
        let daily_fee = private_trip
            .price_per_day
            .checked_mul(i64::from(total_days))
            .ok_or(PricingError::Overflow)?;
        let porter_fee = self.porter_surcharge(porter_count)?;

        let total = participants_fee
            .checked_add(daily_fee)
            .and_then(|sum| sum.checked_add(porter_fee))
            .ok_or(PricingError::Overflow)?;

        Ok(PriceQuote {
            participants_fee,
            daily_fee,
            porter_fee,
            total,
        })
    }
}

fn participants_fee(trip: &Trip, participants: i32) -> Result<i64, PricingError> {
    if participants <= 0 {
        return Err(PricingError::InvalidInput("participants must be positive"));
    }
    if trip.price < 0 {
        return Err(PricingError::InvalidInput("trip price must not be negative"));
    }
    trip.price
        .checked_mul(i64::from(participants))
        .ok_or(PricingError::Overflow)
}
