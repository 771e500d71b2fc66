use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of trip a mountain listing is sold as
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum TripType {
    /// Shared trip with a fixed guide and porters
    Open,
    /// Custom trip with a chosen guide and porters, billed per day
    Private,
}

impl TripType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TripType::Open => "open",
            TripType::Private => "private",
        }
    }
}

impl fmt::Display for TripType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown trip type: {0}")]
pub struct UnknownTripType(pub String);

impl FromStr for TripType {
    type Err = UnknownTripType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open" => Ok(TripType::Open),
            "private" => Ok(TripType::Private),
            other => Err(UnknownTripType(other.to_string())),
        }
    }
}

/// A bookable mountain trip.
///
/// `total_participants` is the occupancy counter: it only grows, and only when
/// a booking's payment is approved.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Trip {
    pub id: i32,
    pub mountain_name: String,
    pub mountain_photo: Option<String>,
    /// Base price per participant
    pub price: i64,
    pub trip_type: TripType,
    pub total_participants: i32,
    pub equipment: String,
    pub estimation_time: String,
}

/// Open-trip extension of a [`Trip`], keyed by `id_trip`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OpenTrip {
    pub id: i32,
    pub id_trip: i32,
    pub id_guide: Option<i32>,
    pub traveling_time: String,
    pub agenda: String,
}

/// Private-trip extension of a [`Trip`], keyed by `id_trip`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PrivateTrip {
    pub id: i32,
    pub id_trip: i32,
    pub price_per_day: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Guide {
    pub id: i32,
    pub name: String,
    pub photo: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Porter {
    pub id: i32,
    pub name: String,
    pub photo: Option<String>,
}
