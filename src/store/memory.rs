use async_trait::async_trait;
use time::Date;
use tokio::sync::Mutex;

use crate::availability::is_slot_available;
use crate::error::BookingError;
use crate::models::{
    Addon, BookedSlot, Booking, BookingAddon, BookingDetails, BookingFilter, BookingLine, BookingStatus,
    BookingSummary, PricingTier, Setting, Studio,
};

use super::RecordStore;

#[derive(Default)]
struct State {
    studios: Vec<Studio>,
    tiers: Vec<PricingTier>,
    addons: Vec<Addon>,
    settings: Vec<Setting>,
    bookings: Vec<Booking>,
    lines: Vec<BookingAddon>,
    next_id: i32,
    fail_line_writes: bool,
}

fn as_slot(booking: &Booking) -> BookedSlot {
    BookedSlot {
        start_time: booking.start_time,
        duration_hours: booking.duration_hours,
        additional_hour: booking.additional_hour,
    }
}

/// Live bookings sharing `booking`'s studio and date, other than `booking` itself.
fn taken_slots(bookings: &[Booking], booking: &Booking) -> Vec<BookedSlot> {
    bookings
        .iter()
        .filter(|b| {
            b.id != booking.id
                && b.studio_id == booking.studio_id
                && b.booking_date == booking.booking_date
                && b.status != BookingStatus::Cancelled
        })
        .map(as_slot)
        .collect()
}

/// In-process store used by the tests.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    /// One active and one inactive studio, tiers for 1-4 hours, three
    /// add-ons (one inactive) and both settings.
    pub fn seeded() -> Self {
        let studio = |id, name: &str, is_active| Studio {
            id,
            name: name.to_string(),
            description: None,
            is_active,
        };
        let addon = |id, name: &str, price, is_active| Addon {
            id,
            name: name.to_string(),
            description: None,
            price,
            is_active,
        };
        let setting = |key: &str, value: &str| Setting {
            key: key.to_string(),
            value: value.to_string(),
        };

        let state = State {
            studios: vec![studio(1, "Studio A", true), studio(2, "Studio B", false)],
            tiers: [(1, 175_000), (2, 300_000), (3, 425_000), (4, 550_000)]
                .into_iter()
                .map(|(d, price)| PricingTier { id: d, duration_hours: d, price })
                .collect(),
            addons: vec![
                addon(1, "Backdrop", 50_000, true),
                addon(2, "Lighting kit", 120_000, true),
                addon(3, "Fog machine", 80_000, false),
            ],
            settings: vec![
                setting("additional_hour_price", "150000"),
                setting("whatsapp_number", "628111"),
            ],
            next_id: 100,
            ..State::default()
        };
        MemoryStore { state: Mutex::new(state) }
    }

    pub async fn insert_booking(&self, booking: Booking) {
        self.state.lock().await.bookings.push(booking);
    }

    /// Makes every later add-on line write fail.
    pub async fn fail_line_writes(&self) {
        self.state.lock().await.fail_line_writes = true;
    }

    pub async fn bookings(&self) -> Vec<Booking> {
        self.state.lock().await.bookings.clone()
    }

    pub async fn lines(&self) -> Vec<BookingAddon> {
        self.state.lock().await.lines.clone()
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn list_studios(&self, active_only: bool) -> Result<Vec<Studio>, BookingError> {
        let state = self.state.lock().await;
        Ok(state.studios.iter().filter(|s| s.is_active || !active_only).cloned().collect())
    }

    async fn get_studio(&self, id: i32) -> Result<Studio, BookingError> {
        let state = self.state.lock().await;
        state
            .studios
            .iter()
            .find(|s| s.id == id)
            .cloned()
            .ok_or_else(|| BookingError::not_found("studio", id))
    }

    async fn set_studio_active(&self, id: i32, active: bool) -> Result<(), BookingError> {
        let mut state = self.state.lock().await;
        let studio = state
            .studios
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or_else(|| BookingError::not_found("studio", id))?;
        studio.is_active = active;
        Ok(())
    }

    async fn list_pricing_tiers(&self) -> Result<Vec<PricingTier>, BookingError> {
        let mut tiers = self.state.lock().await.tiers.clone();
        tiers.sort_by_key(|t| t.duration_hours);
        Ok(tiers)
    }

    async fn upsert_pricing_tier(&self, duration_hours: i32, price: i64) -> Result<(), BookingError> {
        let mut state = self.state.lock().await;
        if let Some(tier) = state.tiers.iter_mut().find(|t| t.duration_hours == duration_hours) {
            tier.price = price;
        } else {
            state.next_id += 1;
            let id = state.next_id;
            state.tiers.push(PricingTier { id, duration_hours, price });
        }
        Ok(())
    }

    async fn delete_pricing_tier(&self, duration_hours: i32) -> Result<(), BookingError> {
        let mut state = self.state.lock().await;
        let before = state.tiers.len();
        state.tiers.retain(|t| t.duration_hours != duration_hours);
        if state.tiers.len() == before {
            return Err(BookingError::not_found("pricing tier", duration_hours));
        }
        Ok(())
    }

    async fn list_addons(&self, active_only: bool) -> Result<Vec<Addon>, BookingError> {
        let state = self.state.lock().await;
        let mut addons: Vec<Addon> = state.addons.iter().filter(|a| a.is_active || !active_only).cloned().collect();
        addons.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(addons)
    }

    async fn create_addon(&self, name: &str, description: Option<&str>, price: i64) -> Result<Addon, BookingError> {
        let mut state = self.state.lock().await;
        state.next_id += 1;
        let addon = Addon {
            id: state.next_id,
            name: name.to_string(),
            description: description.map(str::to_string),
            price,
            is_active: true,
        };
        state.addons.push(addon.clone());
        Ok(addon)
    }

    async fn update_addon(&self, addon: &Addon) -> Result<(), BookingError> {
        let mut state = self.state.lock().await;
        let current = state
            .addons
            .iter_mut()
            .find(|a| a.id == addon.id)
            .ok_or_else(|| BookingError::not_found("add-on", addon.id))?;
        *current = addon.clone();
        Ok(())
    }

    async fn delete_addon(&self, id: i32) -> Result<(), BookingError> {
        let mut state = self.state.lock().await;
        if state.lines.iter().any(|l| l.addon_id == id) {
            return Err(BookingError::StoreWrite(sqlx::Error::Protocol(format!(
                "add-on {} is still referenced by booking_addons",
                id
            ))));
        }
        let before = state.addons.len();
        state.addons.retain(|a| a.id != id);
        if state.addons.len() == before {
            return Err(BookingError::not_found("add-on", id));
        }
        Ok(())
    }

    async fn list_settings(&self) -> Result<Vec<Setting>, BookingError> {
        Ok(self.state.lock().await.settings.clone())
    }

    async fn upsert_setting(&self, key: &str, value: &str) -> Result<(), BookingError> {
        let mut state = self.state.lock().await;
        match state.settings.iter_mut().find(|s| s.key == key) {
            Some(setting) => setting.value = value.to_string(),
            None => state.settings.push(Setting {
                key: key.to_string(),
                value: value.to_string(),
            }),
        }
        Ok(())
    }

    async fn list_bookings(
        &self,
        studio_id: i32,
        date: Date,
        status_excluding: Option<BookingStatus>,
    ) -> Result<Vec<BookedSlot>, BookingError> {
        let state = self.state.lock().await;
        let mut slots: Vec<BookedSlot> = state
            .bookings
            .iter()
            .filter(|b| b.studio_id == studio_id && b.booking_date == date)
            .filter(|b| Some(b.status) != status_excluding)
            .map(as_slot)
            .collect();
        slots.sort_by_key(|s| s.start_time);
        Ok(slots)
    }

    async fn get_booking(&self, id: &str) -> Result<BookingDetails, BookingError> {
        let state = self.state.lock().await;
        let booking = state
            .bookings
            .iter()
            .find(|b| b.id == id)
            .cloned()
            .ok_or_else(|| BookingError::not_found("booking", id))?;
        let studio_name = state
            .studios
            .iter()
            .find(|s| s.id == booking.studio_id)
            .map(|s| s.name.clone())
            .unwrap_or_default();
        let addons = state
            .lines
            .iter()
            .filter(|l| l.booking_id == id)
            .filter_map(|l| {
                state.addons.iter().find(|a| a.id == l.addon_id).map(|a| BookingLine {
                    name: a.name.clone(),
                    quantity: l.quantity,
                    price: l.price,
                })
            })
            .collect();
        Ok(BookingDetails {
            booking,
            studio_name,
            addons,
        })
    }

    async fn search_bookings(&self, filter: &BookingFilter) -> Result<Vec<BookingSummary>, BookingError> {
        let state = self.state.lock().await;
        let mut found: Vec<&Booking> = state
            .bookings
            .iter()
            .filter(|b| filter.status.map_or(true, |s| b.status == s))
            .filter(|b| filter.date.map_or(true, |d| b.booking_date == d))
            .collect();
        found.sort_by(|a, b| (b.booking_date, b.start_time).cmp(&(a.booking_date, a.start_time)));
        Ok(found
            .into_iter()
            .skip(filter.offset() as usize)
            .take(BookingFilter::PAGE_SIZE as usize)
            .map(|b| BookingSummary {
                booking: b.clone(),
                studio_name: state
                    .studios
                    .iter()
                    .find(|s| s.id == b.studio_id)
                    .map(|s| s.name.clone())
                    .unwrap_or_default(),
            })
            .collect())
    }

    async fn count_bookings(&self) -> Result<i64, BookingError> {
        Ok(self.state.lock().await.bookings.len() as i64)
    }

    async fn create_booking(&self, booking: &Booking, addons: &[BookingAddon]) -> Result<(), BookingError> {
        let mut state = self.state.lock().await;

        if state.bookings.iter().any(|b| b.id == booking.id) {
            return Err(BookingError::DuplicateBookingId);
        }
        let taken = taken_slots(&state.bookings, booking);
        if !is_slot_available(&taken, booking.start_time, booking.duration_hours, booking.additional_hour) {
            return Err(BookingError::SlotUnavailable);
        }
        if state.fail_line_writes && !addons.is_empty() {
            return Err(BookingError::StoreWrite(sqlx::Error::Protocol(
                "booking_addons insert rejected".to_string(),
            )));
        }

        state.bookings.push(booking.clone());
        state.lines.extend_from_slice(addons);
        Ok(())
    }

    async fn update_booking_status(&self, id: &str, status: BookingStatus) -> Result<(), BookingError> {
        let mut state = self.state.lock().await;
        let index = state
            .bookings
            .iter()
            .position(|b| b.id == id)
            .ok_or_else(|| BookingError::not_found("booking", id))?;

        let booking = &state.bookings[index];
        if booking.status == BookingStatus::Cancelled && status != BookingStatus::Cancelled {
            let taken = taken_slots(&state.bookings, booking);
            if !is_slot_available(&taken, booking.start_time, booking.duration_hours, booking.additional_hour) {
                return Err(BookingError::SlotUnavailable);
            }
        }
        state.bookings[index].status = status;
        Ok(())
    }
}
