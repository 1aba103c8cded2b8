#[cfg(test)]
pub mod memory;
mod postgres;

pub use postgres::PgStore;

use async_trait::async_trait;
use time::Date;

use crate::error::BookingError;
use crate::models::{
    Addon, BookedSlot, Booking, BookingAddon, BookingDetails, BookingFilter, BookingStatus, BookingSummary,
    PricingTier, Setting, Studio,
};

/// Persistence for studios, pricing, add-ons, settings and bookings.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn list_studios(&self, active_only: bool) -> Result<Vec<Studio>, BookingError>;
    async fn get_studio(&self, id: i32) -> Result<Studio, BookingError>;
    async fn set_studio_active(&self, id: i32, active: bool) -> Result<(), BookingError>;

    /// Tiers ordered by duration.
    async fn list_pricing_tiers(&self) -> Result<Vec<PricingTier>, BookingError>;
    async fn upsert_pricing_tier(&self, duration_hours: i32, price: i64) -> Result<(), BookingError>;
    async fn delete_pricing_tier(&self, duration_hours: i32) -> Result<(), BookingError>;

    async fn list_addons(&self, active_only: bool) -> Result<Vec<Addon>, BookingError>;
    async fn create_addon(&self, name: &str, description: Option<&str>, price: i64) -> Result<Addon, BookingError>;
    async fn update_addon(&self, addon: &Addon) -> Result<(), BookingError>;
    async fn delete_addon(&self, id: i32) -> Result<(), BookingError>;

    async fn list_settings(&self) -> Result<Vec<Setting>, BookingError>;
    async fn upsert_setting(&self, key: &str, value: &str) -> Result<(), BookingError>;

    /// Bookings of a studio on a date, minus those in `status_excluding`.
    async fn list_bookings(
        &self,
        studio_id: i32,
        date: Date,
        status_excluding: Option<BookingStatus>,
    ) -> Result<Vec<BookedSlot>, BookingError>;
    async fn get_booking(&self, id: &str) -> Result<BookingDetails, BookingError>;
    /// Newest first, one page of [`BookingFilter::PAGE_SIZE`].
    async fn search_bookings(&self, filter: &BookingFilter) -> Result<Vec<BookingSummary>, BookingError>;
    async fn count_bookings(&self) -> Result<i64, BookingError>;

    /// Persists the booking and its line items together, or nothing.
    ///
    /// Writes for the same studio and date are serialised and the overlap
    /// check is repeated inside that critical section, so a slot taken in the
    /// meantime yields [`BookingError::SlotUnavailable`]. A reused id yields
    /// [`BookingError::DuplicateBookingId`].
    async fn create_booking(&self, booking: &Booking, addons: &[BookingAddon]) -> Result<(), BookingError>;
    async fn update_booking_status(&self, id: &str, status: BookingStatus) -> Result<(), BookingError>;
}
