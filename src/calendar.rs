use chrono::{Datelike, NaiveDate};
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};
use time::{Date, Month};

const WEEKDAYS: [&str; 7] = ["Mo", "Tu", "We", "Th", "Fr", "Sa", "Su"];

/// Month picker; past days are shown crossed out and cannot be picked.
pub fn generate_calendar(month: u32, year: i32, today: NaiveDate) -> InlineKeyboardMarkup {
    let mut keyboard: Vec<Vec<InlineKeyboardButton>> = Vec::new();

    keyboard.push(vec![InlineKeyboardButton::callback(
        format!("📅 {} {}", month_name(month), year),
        "ignore",
    )]);
    keyboard.push(
        WEEKDAYS
            .iter()
            .map(|day| InlineKeyboardButton::callback(day.to_string(), "ignore"))
            .collect(),
    );

    if let Some(first_day) = NaiveDate::from_ymd_opt(year, month, 1) {
        let mut row: Vec<InlineKeyboardButton> = Vec::new();
        for _ in 0..first_day.weekday().num_days_from_monday() {
            row.push(InlineKeyboardButton::callback(" ", "ignore"));
        }

        for day in 1..=days_in_month(month, year) {
            let Some(date) = NaiveDate::from_ymd_opt(year, month, day) else {
                continue;
            };
            if date < today {
                row.push(InlineKeyboardButton::callback(format!("❌ {}", day), "ignore"));
            } else {
                row.push(InlineKeyboardButton::callback(
                    format!("{:2}", day),
                    format!("calendar:select:{}", date),
                ));
            }

            if row.len() == 7 {
                keyboard.push(std::mem::take(&mut row));
            }
        }

        if !row.is_empty() {
            while row.len() < 7 {
                row.push(InlineKeyboardButton::callback(" ", "ignore"));
            }
            keyboard.push(row);
        }
    }

    keyboard.push(vec![
        InlineKeyboardButton::callback("< Month", format!("calendar:prev_month:{}:{}", month, year)),
        InlineKeyboardButton::callback("Month >", format!("calendar:next_month:{}:{}", month, year)),
    ]);
    keyboard.push(vec![InlineKeyboardButton::callback("⟵ Back to studios", "back_to_studios")]);

    InlineKeyboardMarkup::new(keyboard)
}

/// Moves `(month, year)` one month forward or back.
pub fn shift_month(month: u32, year: i32, forward: bool) -> (u32, i32) {
    match (forward, month) {
        (true, 12) => (1, year + 1),
        (true, m) => (m + 1, year),
        (false, 1) => (12, year - 1),
        (false, m) => (m - 1, year),
    }
}

pub fn month_name(month: u32) -> &'static str {
    match month {
        1 => "January", 2 => "February", 3 => "March", 4 => "April",
        5 => "May", 6 => "June", 7 => "July", 8 => "August",
        9 => "September", 10 => "October", 11 => "November", 12 => "December",
        _ => "",
    }
}

pub fn days_in_month(month: u32, year: i32) -> u32 {
    let (next_month, next_year) = shift_month(month, year, true);
    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .and_then(|d| d.pred_opt())
        .map(|d| d.day())
        .unwrap_or(0)
}

pub fn to_store_date(date: NaiveDate) -> Option<Date> {
    let month = Month::try_from(date.month() as u8).ok()?;
    Date::from_calendar_date(date.year(), month, date.day() as u8).ok()
}

/// Parses `YYYY-MM-DD`.
pub fn parse_iso_date(s: &str) -> Option<Date> {
    s.trim().parse::<NaiveDate>().ok().and_then(to_store_date)
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    fn callbacks(markup: &InlineKeyboardMarkup) -> Vec<String> {
        markup
            .inline_keyboard
            .iter()
            .flatten()
            .filter_map(|b| match &b.kind {
                teloxide::types::InlineKeyboardButtonKind::CallbackData(data) => Some(data.clone()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn month_lengths() {
        assert_eq!(days_in_month(2, 2028), 29);
        assert_eq!(days_in_month(2, 2026), 28);
        assert_eq!(days_in_month(12, 2026), 31);
        assert_eq!(days_in_month(4, 2026), 30);
    }

    #[test]
    fn shifting_wraps_years() {
        assert_eq!(shift_month(12, 2026, true), (1, 2027));
        assert_eq!(shift_month(1, 2026, false), (12, 2025));
        assert_eq!(shift_month(6, 2026, true), (7, 2026));
    }

    #[test]
    fn past_days_are_not_selectable() {
        let today = NaiveDate::from_ymd_opt(2026, 10, 19).unwrap();
        let data = callbacks(&generate_calendar(10, 2026, today));
        assert!(!data.contains(&"calendar:select:2026-10-18".to_string()));
        assert!(data.contains(&"calendar:select:2026-10-19".to_string()));
        assert!(data.contains(&"calendar:select:2026-10-31".to_string()));
        assert!(data.contains(&"calendar:next_month:10:2026".to_string()));
    }

    #[test]
    fn rows_hold_a_week() {
        let today = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
        let markup = generate_calendar(2, 2026, today);
        // title, weekdays, five week rows (Feb 2026 starts on a Sunday), switcher, back
        let day_rows = &markup.inline_keyboard[2..markup.inline_keyboard.len() - 2];
        assert!(day_rows.iter().all(|row| row.len() == 7));
        assert_eq!(day_rows.len(), 5);
    }

    #[test]
    fn iso_dates() {
        assert_eq!(parse_iso_date("2026-10-20"), Some(date!(2026 - 10 - 20)));
        assert_eq!(parse_iso_date("2026-02-30"), None);
        assert_eq!(parse_iso_date("tomorrow"), None);
    }
}
