use std::{fmt, str::FromStr};

use crate::error::BookingError;

pub const MINUTES_PER_DAY: u32 = 24 * 60;

/// Wall-clock time of day, single timezone, minute precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ClockTime {
    hour: u8,
    minute: u8,
}

impl ClockTime {
    /// Builds a time from an offset in minutes, wrapping at midnight.
    pub fn from_minutes(minutes: u32) -> Self {
        let minutes = minutes % MINUTES_PER_DAY;
        ClockTime {
            hour: (minutes / 60) as u8,
            minute: (minutes % 60) as u8,
        }
    }

    pub fn minutes(&self) -> u32 {
        to_minutes(self.hour, self.minute)
    }

    /// `9:00 AM` style, used in customer-facing messages.
    pub fn to_12h(&self) -> String {
        let suffix = if self.hour >= 12 { "PM" } else { "AM" };
        let display_hour = match self.hour % 12 {
            0 => 12,
            h => h,
        };
        format!("{}:{:02} {}", display_hour, self.minute, suffix)
    }
}

impl fmt::Display for ClockTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

impl FromStr for ClockTime {
    type Err = BookingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (hour, minute) = parse_clock(s)?;
        Ok(ClockTime { hour, minute })
    }
}

/// Parses a zero-padded 24-hour `HH:MM` string.
pub fn parse_clock(s: &str) -> Result<(u8, u8), BookingError> {
    let malformed = || BookingError::MalformedTime(s.to_string());

    let (h, m) = s.split_once(':').ok_or_else(malformed)?;
    if h.len() != 2 || m.len() != 2 || !h.bytes().chain(m.bytes()).all(|b| b.is_ascii_digit()) {
        return Err(malformed());
    }
    let hour: u8 = h.parse().map_err(|_| malformed())?;
    let minute: u8 = m.parse().map_err(|_| malformed())?;
    if hour > 23 || minute > 59 {
        return Err(malformed());
    }
    Ok((hour, minute))
}

pub fn to_minutes(hour: u8, minute: u8) -> u32 {
    hour as u32 * 60 + minute as u32
}

/// End of a session starting at `start` lasting `duration_hours`.
///
/// The result is reduced modulo 24h, so an end past midnight wraps to an
/// early-morning time. The slot generator never produces such a booking.
pub fn end_time(start: ClockTime, duration_hours: u32) -> ClockTime {
    ClockTime::from_minutes(start.minutes() + duration_hours * 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(s: &str) -> ClockTime {
        s.parse().unwrap()
    }

    #[test]
    fn parses_valid_times() {
        assert_eq!(parse_clock("08:30").unwrap(), (8, 30));
        assert_eq!(parse_clock("00:00").unwrap(), (0, 0));
        assert_eq!(parse_clock("23:59").unwrap(), (23, 59));
    }

    #[test]
    fn rejects_malformed_times() {
        for bad in ["8:30", "24:00", "12:60", "12-30", "ab:cd", "12:30:00", "", "+1:30", "12:3"] {
            assert!(
                matches!(parse_clock(bad), Err(BookingError::MalformedTime(_))),
                "{} should be rejected",
                bad
            );
        }
    }

    #[test]
    fn end_time_adds_hours() {
        assert_eq!(end_time(t("09:00"), 2).to_string(), "11:00");
        assert_eq!(end_time(t("16:30"), 1).to_string(), "17:30");
    }

    #[test]
    fn end_time_wraps_past_midnight() {
        assert_eq!(end_time(t("23:00"), 3).to_string(), "02:00");
        assert_eq!(end_time(t("17:00"), 2).to_string(), "19:00");
    }

    #[test]
    fn twelve_hour_display() {
        assert_eq!(t("09:00").to_12h(), "9:00 AM");
        assert_eq!(t("00:15").to_12h(), "12:15 AM");
        assert_eq!(t("12:00").to_12h(), "12:00 PM");
        assert_eq!(t("17:30").to_12h(), "5:30 PM");
    }

    #[test]
    fn minutes_round_trip() {
        assert_eq!(to_minutes(18, 0), 1080);
        assert_eq!(ClockTime::from_minutes(1080), t("18:00"));
    }
}
