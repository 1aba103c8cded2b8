use crate::clock::{self, ClockTime};
use crate::models::{effective_duration, BookedSlot};

pub const OPENING_HOUR: u8 = 8;
pub const CLOSING_HOUR: u8 = 18;
pub const SLOT_STEP_MINUTES: u32 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BookedInterval {
    pub start: ClockTime,
    pub end: ClockTime,
}

/// Checks a candidate session against the bookings already taken for the
/// same studio and date. Cancelled bookings must be filtered out by the caller.
///
/// Returns `true` when the candidate conflicts with none of them.
pub fn is_slot_available(
    existing: &[BookedSlot],
    start: ClockTime,
    duration_hours: i32,
    additional_hour: bool,
) -> bool {
    let new_start = start.minutes() as i64;
    let new_end = new_start + effective_duration(duration_hours, additional_hour) as i64 * 60;

    !existing.iter().any(|booking| {
        let existing_start = booking.start_time.minutes() as i64;
        let existing_end = existing_start + booking.effective_duration() as i64 * 60;

        (new_start >= existing_start && new_start < existing_end)
            || (new_end > existing_start && new_end <= existing_end)
            || (new_start <= existing_start && new_end >= existing_end)
    })
}

/// Start times a session of the given length can take, in ascending order.
///
/// Candidates sit on every half hour from opening up to closing; a candidate
/// is dropped when the session would run past closing or collide with an
/// existing booking.
pub fn available_slots(existing: &[BookedSlot], duration_hours: i32, additional_hour: bool) -> Vec<ClockTime> {
    let total_minutes = effective_duration(duration_hours, additional_hour) as i64 * 60;
    let closing_minutes = clock::to_minutes(CLOSING_HOUR, 0) as i64;

    let mut slots = Vec::new();
    let mut current = clock::to_minutes(OPENING_HOUR, 0);

    while current < clock::to_minutes(CLOSING_HOUR, 0) {
        let candidate = ClockTime::from_minutes(current);
        if current as i64 + total_minutes <= closing_minutes
            && is_slot_available(existing, candidate, duration_hours, additional_hour)
        {
            slots.push(candidate);
        }
        current += SLOT_STEP_MINUTES;
    }

    debug!("{} free slots for a {}h session", slots.len(), total_minutes / 60);
    slots
}

/// Display intervals of existing bookings, for annotating the slot picker.
pub fn booked_intervals(existing: &[BookedSlot]) -> Vec<BookedInterval> {
    existing
        .iter()
        .map(|booking| BookedInterval {
            start: booking.start_time,
            end: clock::end_time(booking.start_time, booking.effective_duration().max(0) as u32),
        })
        .collect()
}
