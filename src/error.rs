use thiserror::Error;

#[derive(Debug, Error)]
pub enum BookingError {
    #[error("malformed time: {0:?}")]
    MalformedTime(String),
    #[error("{kind} not found: {key}")]
    RecordNotFound { kind: &'static str, key: String },
    #[error("store read failed: {0}")]
    StoreRead(#[source] sqlx::Error),
    #[error("store write failed: {0}")]
    StoreWrite(#[source] sqlx::Error),
    #[error("requested time slot is no longer available")]
    SlotUnavailable,
    #[error("no price is configured for a {0} hour session")]
    UnknownDuration(i32),
    #[error("invalid booking: {0}")]
    InvalidBooking(String),
    #[error("booking id already exists")]
    DuplicateBookingId,
    #[error("admin session is missing or expired")]
    Unauthorized,
}

impl BookingError {
    pub fn not_found(kind: &'static str, key: impl ToString) -> Self {
        BookingError::RecordNotFound {
            kind,
            key: key.to_string(),
        }
    }

    /// Text shown to the end user. Store failures are never detailed.
    pub fn user_message(&self) -> String {
        match self {
            BookingError::StoreRead(_) | BookingError::StoreWrite(_) | BookingError::DuplicateBookingId => {
                "Operation failed. Please try again.".to_string()
            }
            BookingError::RecordNotFound { kind, .. } => format!("{} not found.", capitalize(kind)),
            other => other.to_string(),
        }
    }
}

pub(crate) fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} not set")]
    Missing(&'static str),
    #[error("{name} has an invalid value: {value:?}")]
    Invalid { name: &'static str, value: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_errors_are_generic_for_users() {
        let err = BookingError::StoreWrite(sqlx::Error::RowNotFound);
        assert_eq!(err.user_message(), "Operation failed. Please try again.");
    }

    #[test]
    fn not_found_names_the_record() {
        let err = BookingError::not_found("booking", "HS-1-ABCDE");
        assert_eq!(err.user_message(), "Booking not found.");
        assert_eq!(err.to_string(), "booking not found: HS-1-ABCDE");
    }
}
