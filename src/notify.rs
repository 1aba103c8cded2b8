use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use time::{macros::format_description, Date};
use url::Url;

use crate::models::BookingDetails;
use crate::pricing::format_currency;

/// Characters left untouched by JavaScript's `encodeURIComponent`.
const MESSAGE_TEXT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeRequest {
    Modify,
    Cancel,
}

impl ChangeRequest {
    fn verb(&self) -> &'static str {
        match self {
            ChangeRequest::Modify => "modify",
            ChangeRequest::Cancel => "cancel",
        }
    }
}

/// Builds prefilled-chat deep links to the studio's messaging contact.
#[derive(Debug, Clone)]
pub struct Messenger {
    base: Url,
    contact_number: String,
}

impl Messenger {
    pub fn new(base: Url, contact_number: impl Into<String>) -> Self {
        Messenger {
            base,
            contact_number: contact_number.into(),
        }
    }

    pub fn has_contact(&self) -> bool {
        !self.contact_number.is_empty()
    }

    pub fn confirmation_link(&self, details: &BookingDetails) -> String {
        self.link(&confirmation_message(details))
    }

    pub fn change_link(&self, details: &BookingDetails, request: ChangeRequest) -> String {
        self.link(&change_message(details, request))
    }

    fn link(&self, message: &str) -> String {
        format!(
            "{}/{}?text={}",
            self.base.as_str().trim_end_matches('/'),
            self.contact_number,
            utf8_percent_encode(message, MESSAGE_TEXT)
        )
    }
}

/// `Monday, January 5, 2026`
pub fn format_long_date(date: Date) -> String {
    let format = format_description!("[weekday], [month repr:long] [day padding:none], [year]");
    date.format(&format).unwrap_or_else(|_| date.to_string())
}

pub fn confirmation_message(details: &BookingDetails) -> String {
    let booking = &details.booking;

    let mut message = String::from("Hi! I would like to confirm my booking:\n\n");
    message += &format!("Booking ID: {}\n", booking.id);
    message += &format!("Studio: {}\n", details.studio_name);
    message += &format!("Date: {}\n", format_long_date(booking.booking_date));
    message += &format!(
        "Time: {} - {}\n",
        booking.start_time.to_12h(),
        booking.end_time().to_12h()
    );
    message += &format!("Duration: {} hours\n", booking.effective_duration());

    if !details.addons.is_empty() {
        message += "\nAdd-ons:\n";
        for addon in &details.addons {
            message += &format!("- {} (x{})\n", addon.name, addon.quantity);
        }
    }

    message += &format!("\nTotal: {}\n", format_currency(booking.total_price));
    message += &format!("\nName: {}\n", booking.customer_name);
    message += &format!("Phone: {}", booking.customer_phone);
    message
}

pub fn change_message(details: &BookingDetails, request: ChangeRequest) -> String {
    let booking = &details.booking;
    format!(
        "Hi! I would like to {} my booking:\n\n\
         Booking ID: {}\n\
         Studio: {}\n\
         Date: {}\n\
         Time: {}\n\
         \nPlease assist me with this request.",
        request.verb(),
        booking.id,
        details.studio_name,
        format_long_date(booking.booking_date),
        booking.start_time.to_12h()
    )
}
