use std::time::{SystemTime, UNIX_EPOCH};

use rand::Rng;

const PREFIX: &str = "HS";
const RANDOM_LEN: usize = 5;
const BASE36: &[u8; 36] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Public booking handle: `HS-<base36 millis>-<5 random base36 chars>`.
///
/// Uniqueness is probabilistic; the store's primary key rejects a repeat.
pub fn new_booking_id() -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default();
    with_timestamp(millis, &mut rand::thread_rng())
}

fn with_timestamp<R: Rng + ?Sized>(millis: u64, rng: &mut R) -> String {
    let random: String = (0..RANDOM_LEN)
        .map(|_| BASE36[rng.gen_range(0..BASE36.len())] as char)
        .collect();
    format!("{}-{}-{}", PREFIX, to_base36(millis), random)
}

fn to_base36(mut value: u64) -> String {
    if value == 0 {
        return "0".to_string();
    }
    let mut digits = Vec::new();
    while value > 0 {
        digits.push(BASE36[(value % 36) as usize]);
        value /= 36;
    }
    digits.reverse();
    String::from_utf8_lossy(&digits).into_owned()
}

/// Normalises user input for a lookup: trimmed and upper-cased.
pub fn normalize(input: &str) -> String {
    input.trim().to_uppercase()
}

pub fn is_well_formed(id: &str) -> bool {
    let mut parts = id.split('-');
    let (Some(prefix), Some(stamp), Some(random), None) = (parts.next(), parts.next(), parts.next(), parts.next()) else {
        return false;
    };
    let base36 = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit() || b.is_ascii_uppercase());
    prefix == PREFIX && base36(stamp) && random.len() == RANDOM_LEN && base36(random)
}
