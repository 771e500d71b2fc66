//! Booking transaction engine: creation, payment review, read views,
//! feedback and admin statistics over a [`gapakerem_core::ReferenceStore`].

pub mod coordinator;
pub mod dashboard;
pub mod feedback;
pub mod payments;
pub mod queries;

pub use coordinator::{create_open_booking, create_private_booking};
pub use dashboard::{dashboard_summary, monthly_trip_statistics};
pub use feedback::{average_rating, create_feedback, list_feedback};
pub use payments::{update_payment_status, upload_payment_proof};
pub use queries::{get_booking_by_id, get_my_booking_detail, list_bookings, list_my_bookings};
