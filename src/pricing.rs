use std::collections::BTreeMap;

use crate::models::{Addon, PricingTier, Setting};

pub const ADDITIONAL_HOUR_PRICE_KEY: &str = "additional_hour_price";
pub const CONTACT_NUMBER_KEY: &str = "whatsapp_number";
pub const DEFAULT_ADDITIONAL_HOUR_PRICE: i64 = 150_000;

/// Add-on id to selected quantity.
pub type AddonSelection = BTreeMap<i32, i32>;

/// The two settings the booking flow reads. Unknown keys are ignored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub additional_hour_price: i64,
    pub contact_number: String,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            additional_hour_price: DEFAULT_ADDITIONAL_HOUR_PRICE,
            contact_number: String::new(),
        }
    }
}

impl Settings {
    pub fn from_rows(rows: &[Setting]) -> Self {
        let mut settings = Settings::default();
        for row in rows {
            match row.key.as_str() {
                ADDITIONAL_HOUR_PRICE_KEY => match row.value.trim().parse::<i64>() {
                    Ok(price) if price >= 0 => settings.additional_hour_price = price,
                    _ => warn!("ignoring unparseable {} value {:?}", ADDITIONAL_HOUR_PRICE_KEY, row.value),
                },
                CONTACT_NUMBER_KEY => settings.contact_number = row.value.trim().to_string(),
                _ => {}
            }
        }
        settings
    }
}

pub fn tier_price(tiers: &[PricingTier], duration_hours: i32) -> Option<i64> {
    tiers
        .iter()
        .find(|tier| tier.duration_hours == duration_hours)
        .map(|tier| tier.price)
}

/// Total price in the smallest currency unit.
///
/// A duration without a tier contributes nothing and add-on ids missing from
/// the catalogue are skipped; callers that need a priced duration must check
/// [`tier_price`] first.
pub fn total_price(
    duration_hours: i32,
    additional_hour: bool,
    additional_hour_price: i64,
    tiers: &[PricingTier],
    selected_addons: &AddonSelection,
    catalog: &[Addon],
) -> i64 {
    let mut total = tier_price(tiers, duration_hours).unwrap_or(0);

    if additional_hour {
        total += additional_hour_price;
    }

    for (addon_id, quantity) in selected_addons {
        if *quantity <= 0 {
            continue;
        }
        if let Some(addon) = catalog.iter().find(|a| a.id == *addon_id) {
            total += addon.price * *quantity as i64;
        }
    }

    total
}

/// `Rp 1.250.000`
pub fn format_currency(amount: i64) -> String {
    let digits = amount.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(c);
    }
    if amount < 0 {
        format!("Rp -{}", grouped)
    } else {
        format!("Rp {}", grouped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tiers() -> Vec<PricingTier> {
        vec![
            PricingTier { id: 1, duration_hours: 1, price: 175_000 },
            PricingTier { id: 2, duration_hours: 2, price: 300_000 },
            PricingTier { id: 3, duration_hours: 4, price: 550_000 },
        ]
    }

    fn catalog() -> Vec<Addon> {
        vec![
            Addon { id: 7, name: "Backdrop".into(), description: None, price: 50_000, is_active: true },
            Addon { id: 8, name: "Lighting kit".into(), description: None, price: 120_000, is_active: true },
        ]
    }

    #[test]
    fn sums_tier_extra_hour_and_addons() {
        let selected = AddonSelection::from([(7, 2)]);
        let total = total_price(2, true, 150_000, &tiers(), &selected, &catalog());
        assert_eq!(total, 550_000);
    }

    #[test]
    fn extra_hour_is_strictly_additive() {
        let selected = AddonSelection::from([(7, 1), (8, 3)]);
        for price in [0, 1, 150_000, 999_999] {
            for duration in [1, 2, 3, 4] {
                let with = total_price(duration, true, price, &tiers(), &selected, &catalog());
                let without = total_price(duration, false, price, &tiers(), &selected, &catalog());
                assert_eq!(with, without + price);
            }
        }
    }

    #[test]
    fn unknown_duration_contributes_nothing() {
        let total = total_price(3, false, 150_000, &tiers(), &AddonSelection::new(), &catalog());
        assert_eq!(total, 0);
        assert_eq!(tier_price(&tiers(), 3), None);
    }

    #[test]
    fn zero_quantities_and_unknown_addons_are_skipped() {
        let selected = AddonSelection::from([(7, 0), (8, -1), (99, 4)]);
        assert_eq!(total_price(1, false, 0, &tiers(), &selected, &catalog()), 175_000);
    }

    #[test]
    fn settings_fall_back_to_defaults() {
        assert_eq!(Settings::from_rows(&[]), Settings::default());

        let rows = vec![
            Setting { key: "whatsapp_number".into(), value: " 628123 ".into() },
            Setting { key: "additional_hour_price".into(), value: "200000".into() },
            Setting { key: "theme".into(), value: "dark".into() },
        ];
        let settings = Settings::from_rows(&rows);
        assert_eq!(settings.additional_hour_price, 200_000);
        assert_eq!(settings.contact_number, "628123");

        let bad = vec![Setting { key: "additional_hour_price".into(), value: "a lot".into() }];
        assert_eq!(Settings::from_rows(&bad).additional_hour_price, DEFAULT_ADDITIONAL_HOUR_PRICE);
    }

    #[test]
    fn currency_uses_dot_grouping() {
        assert_eq!(format_currency(0), "Rp 0");
        assert_eq!(format_currency(950), "Rp 950");
        assert_eq!(format_currency(1_000), "Rp 1.000");
        assert_eq!(format_currency(550_000), "Rp 550.000");
        assert_eq!(format_currency(12_345_678), "Rp 12.345.678");
    }
}
