use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::search::{PassengerCategory, VehicleCategory};

/// Status of a reservation as reported by the operator.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OperatorBookingStatus {
    Pending,
    Confirmed,
    Cancelled,
    Completed,
    Expired,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BookingPassenger {
    pub first_name: String,
    pub last_name: String,
    pub category: PassengerCategory,
    pub date_of_birth: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BookingVehicle {
    pub category: VehicleCategory,
    pub registration: String,
}

/// Reservation request for a sailing picked from a search result.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BookingRequest {
    /// Platform-side booking id, echoed back by operators that support it.
    pub booking_id: Uuid,
    pub route_id: String,
    pub departure_time: DateTime<Utc>,
    pub passengers: Vec<BookingPassenger>,
    #[serde(default)]
    pub vehicles: Vec<BookingVehicle>,
    pub contact_email: String,
    /// Hold reference returned with the search result, when the operator issued one.
    pub operator_booking_reference: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BookingConfirmation {
    pub operator_code: String,
    pub booking_reference: String,
    pub status: OperatorBookingStatus,
    pub total_price: Option<Decimal>,
    pub currency: Option<String>,
}
