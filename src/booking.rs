use time::Date;

use crate::availability::{available_slots, booked_intervals, BookedInterval};
use crate::booking_id::{self, new_booking_id};
use crate::clock::ClockTime;
use crate::error::BookingError;
use crate::models::{Addon, Booking, BookingAddon, BookingDetails, BookingLine, BookingStatus, PricingTier};
use crate::pricing::{tier_price, total_price, AddonSelection, Settings};
use crate::store::RecordStore;

const MAX_ID_ATTEMPTS: usize = 3;

/// Everything a customer picks from, read in one go.
#[derive(Debug, Clone)]
pub struct Catalog {
    pub tiers: Vec<PricingTier>,
    pub addons: Vec<Addon>,
    pub settings: Settings,
}

impl Catalog {
    pub async fn load(store: &dyn RecordStore) -> Result<Self, BookingError> {
        Ok(Catalog {
            tiers: store.list_pricing_tiers().await?,
            addons: store.list_addons(true).await?,
            settings: Settings::from_rows(&store.list_settings().await?),
        })
    }

    pub fn quote(&self, duration_hours: i32, additional_hour: bool, addons: &AddonSelection) -> i64 {
        total_price(
            duration_hours,
            additional_hour,
            self.settings.additional_hour_price,
            &self.tiers,
            addons,
            &self.addons,
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotView {
    pub available: Vec<ClockTime>,
    pub booked: Vec<BookedInterval>,
}

#[derive(Debug, Clone)]
pub struct BookingRequest {
    pub studio_id: i32,
    pub date: Date,
    pub start_time: ClockTime,
    pub duration_hours: i32,
    pub additional_hour: bool,
    pub addons: AddonSelection,
    pub customer_name: String,
    pub customer_phone: String,
    pub customer_email: Option<String>,
    pub notes: Option<String>,
}

/// Free start times for a studio and date, plus the intervals already taken.
pub async fn slots_for(
    store: &dyn RecordStore,
    studio_id: i32,
    date: Date,
    duration_hours: i32,
    additional_hour: bool,
) -> Result<SlotView, BookingError> {
    let existing = store
        .list_bookings(studio_id, date, Some(BookingStatus::Cancelled))
        .await?;
    Ok(SlotView {
        available: available_slots(&existing, duration_hours, additional_hour),
        booked: booked_intervals(&existing),
    })
}

/// Validates, prices and stores a new pending booking.
pub async fn reserve(store: &dyn RecordStore, request: &BookingRequest) -> Result<BookingDetails, BookingError> {
    if request.customer_name.trim().is_empty() {
        return Err(BookingError::InvalidBooking("customer name is required".to_string()));
    }
    if request.customer_phone.trim().is_empty() {
        return Err(BookingError::InvalidBooking("customer phone is required".to_string()));
    }
    if request.duration_hours <= 0 {
        return Err(BookingError::UnknownDuration(request.duration_hours));
    }

    let studio = store.get_studio(request.studio_id).await?;
    if !studio.is_active {
        return Err(BookingError::InvalidBooking(format!("{} is not taking bookings", studio.name)));
    }

    let tiers = store.list_pricing_tiers().await?;
    if tier_price(&tiers, request.duration_hours).is_none() {
        return Err(BookingError::UnknownDuration(request.duration_hours));
    }
    let addons = store.list_addons(true).await?;
    let settings = Settings::from_rows(&store.list_settings().await?);

    let slots = slots_for(
        store,
        request.studio_id,
        request.date,
        request.duration_hours,
        request.additional_hour,
    )
    .await?;
    if !slots.available.contains(&request.start_time) {
        return Err(BookingError::SlotUnavailable);
    }

    let total = total_price(
        request.duration_hours,
        request.additional_hour,
        settings.additional_hour_price,
        &tiers,
        &request.addons,
        &addons,
    );

    let selected: Vec<(&Addon, i32)> = request
        .addons
        .iter()
        .filter(|(_, quantity)| **quantity > 0)
        .filter_map(|(id, quantity)| addons.iter().find(|a| a.id == *id).map(|a| (a, *quantity)))
        .collect();

    let mut booking = Booking {
        id: new_booking_id(),
        studio_id: request.studio_id,
        booking_date: request.date,
        start_time: request.start_time,
        duration_hours: request.duration_hours,
        additional_hour: request.additional_hour,
        customer_name: request.customer_name.trim().to_string(),
        customer_phone: request.customer_phone.trim().to_string(),
        customer_email: request
            .customer_email
            .as_deref()
            .map(str::trim)
            .filter(|e| !e.is_empty())
            .map(str::to_string),
        total_price: total,
        status: BookingStatus::Pending,
        notes: request.notes.clone(),
    };

    let mut attempt = 1;
    loop {
        let lines: Vec<BookingAddon> = selected
            .iter()
            .map(|(addon, quantity)| BookingAddon {
                booking_id: booking.id.clone(),
                addon_id: addon.id,
                quantity: *quantity,
                price: addon.price,
            })
            .collect();

        match store.create_booking(&booking, &lines).await {
            Ok(()) => break,
            Err(BookingError::DuplicateBookingId) if attempt < MAX_ID_ATTEMPTS => {
                warn!("booking id {} already taken, generating another", booking.id);
                booking.id = new_booking_id();
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }

    info!(
        "booking {} created: studio {} on {} at {} for {}h, total {}",
        booking.id,
        booking.studio_id,
        booking.booking_date,
        booking.start_time,
        booking.effective_duration(),
        booking.total_price
    );

    Ok(BookingDetails {
        addons: selected
            .iter()
            .map(|(addon, quantity)| BookingLine {
                name: addon.name.clone(),
                quantity: *quantity,
                price: addon.price,
            })
            .collect(),
        studio_name: studio.name,
        booking,
    })
}

/// Looks a booking up by the code a customer typed.
pub async fn find_booking(store: &dyn RecordStore, input: &str) -> Result<BookingDetails, BookingError> {
    let id = booking_id::normalize(input);
    if !booking_id::is_well_formed(&id) {
        return Err(BookingError::not_found("booking", id));
    }
    store.get_booking(&id).await
}
