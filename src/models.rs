use std::{fmt, str::FromStr};

use sqlx::FromRow;
use time::Date;

use crate::clock::{self, ClockTime};
use crate::error::BookingError;

#[derive(Debug, Clone, FromRow)]
pub struct Studio {
    pub id: i32,
    pub name: String,
    pub description: Option<String>,
    pub is_active: bool,
}

#[derive(Debug, Clone, FromRow)]
pub struct PricingTier {
    pub id: i32,
    pub duration_hours: i32,
    pub price: i64,
}

#[derive(Debug, Clone, FromRow)]
pub struct Addon {
    pub id: i32,
    pub name: String,
    pub description: Option<String>,
    pub price: i64,
    pub is_active: bool,
}

#[derive(Debug, Clone, FromRow)]
pub struct Setting {
    pub key: String,
    pub value: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Cancelled,
}

impl BookingStatus {
    pub const ALL: [BookingStatus; 3] = [
        BookingStatus::Pending,
        BookingStatus::Confirmed,
        BookingStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Cancelled => "cancelled",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "🆕 Pending",
            BookingStatus::Confirmed => "✅ Confirmed",
            BookingStatus::Cancelled => "❌ Cancelled",
        }
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BookingStatus {
    type Err = BookingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(BookingStatus::Pending),
            "confirmed" => Ok(BookingStatus::Confirmed),
            "cancelled" => Ok(BookingStatus::Cancelled),
            other => Err(BookingError::InvalidBooking(format!("unknown status {:?}", other))),
        }
    }
}

impl TryFrom<String> for BookingStatus {
    type Error = BookingError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl TryFrom<String> for ClockTime {
    type Error = BookingError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct Booking {
    pub id: String,
    pub studio_id: i32,
    pub booking_date: Date,
    #[sqlx(try_from = "String")]
    pub start_time: ClockTime,
    pub duration_hours: i32,
    pub additional_hour: bool,
    pub customer_name: String,
    pub customer_phone: String,
    pub customer_email: Option<String>,
    pub total_price: i64,
    #[sqlx(try_from = "String")]
    pub status: BookingStatus,
    pub notes: Option<String>,
}

impl Booking {
    pub fn effective_duration(&self) -> i32 {
        effective_duration(self.duration_hours, self.additional_hour)
    }

    pub fn end_time(&self) -> ClockTime {
        clock::end_time(self.start_time, self.effective_duration().max(0) as u32)
    }
}

pub fn effective_duration(duration_hours: i32, additional_hour: bool) -> i32 {
    duration_hours + if additional_hour { 1 } else { 0 }
}

/// Line item linking a booking to an add-on, with the unit price captured
/// when the booking was made.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct BookingAddon {
    pub booking_id: String,
    pub addon_id: i32,
    pub quantity: i32,
    pub price: i64,
}

/// The part of an existing booking the availability checks look at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromRow)]
pub struct BookedSlot {
    #[sqlx(try_from = "String")]
    pub start_time: ClockTime,
    pub duration_hours: i32,
    pub additional_hour: bool,
}

impl BookedSlot {
    pub fn effective_duration(&self) -> i32 {
        effective_duration(self.duration_hours, self.additional_hour)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct BookingLine {
    pub name: String,
    pub quantity: i32,
    pub price: i64,
}

/// A booking joined with its studio's name, as listed on the admin side.
#[derive(Debug, Clone, FromRow)]
pub struct BookingSummary {
    #[sqlx(flatten)]
    pub booking: Booking,
    pub studio_name: String,
}

#[derive(Debug, Clone)]
pub struct BookingDetails {
    pub booking: Booking,
    pub studio_name: String,
    pub addons: Vec<BookingLine>,
}

#[derive(Debug, Clone, Default)]
pub struct BookingFilter {
    pub status: Option<BookingStatus>,
    pub date: Option<Date>,
    /// Zero-based page index.
    pub page: u32,
}

impl BookingFilter {
    pub const PAGE_SIZE: u32 = 20;

    pub fn offset(&self) -> i64 {
        self.page as i64 * Self::PAGE_SIZE as i64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    #[test]
    fn status_parses_case_insensitively() {
        assert_eq!("Confirmed".parse::<BookingStatus>().unwrap(), BookingStatus::Confirmed);
        assert_eq!(" pending ".parse::<BookingStatus>().unwrap(), BookingStatus::Pending);
        assert!("done".parse::<BookingStatus>().is_err());
    }

    #[test]
    fn booking_extent_includes_extra_hour() {
        let booking = Booking {
            id: "HS-X-ABCDE".to_string(),
            studio_id: 1,
            booking_date: date!(2026 - 10 - 20),
            start_time: "10:00".parse().unwrap(),
            duration_hours: 2,
            additional_hour: true,
            customer_name: "Dewi".to_string(),
            customer_phone: "0812".to_string(),
            customer_email: None,
            total_price: 0,
            status: BookingStatus::Pending,
            notes: None,
        };
        assert_eq!(booking.effective_duration(), 3);
        assert_eq!(booking.end_time().to_string(), "13:00");
    }

    #[test]
    fn filter_offset_is_page_based() {
        let filter = BookingFilter { page: 2, ..Default::default() };
        assert_eq!(filter.offset(), 40);
    }
}
