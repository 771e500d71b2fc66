pub mod trip;
pub mod pricing;

pub use trip::{Guide, OpenTrip, Porter, PrivateTrip, Trip, TripType};
pub use pricing::{PriceQuote, PricingConfig, PricingEngine, PricingError};
