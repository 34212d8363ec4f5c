// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Plan price → charging duration.

const SECONDS_PER_MINUTE: u64 = 60;
const SECONDS_PER_HOUR: u64 = 3600;

/// Seconds to authorize for a plan with the given price and label.
///
/// Rules, first match wins:
/// 1. price 1 → 5 seconds
/// 2. price 2 → 10 seconds
/// 3. label contains `<n> minute[s]` or `<n> hour[s]` (any case, optional
///    whitespace before the unit) → n minutes / n hours
/// 4. otherwise price × 60
///
/// Never fails; overflowing products saturate at `u64::MAX`.
pub fn amount_to_seconds(price: u64, label: &str) -> u64 {
    match price {
        1 => 5,
        2 => 10,
        _ => match parse_duration_label(label) {
            Some((n, DurationUnit::Minutes)) => n.saturating_mul(SECONDS_PER_MINUTE),
            Some((n, DurationUnit::Hours)) => n.saturating_mul(SECONDS_PER_HOUR),
            None => price.saturating_mul(SECONDS_PER_MINUTE),
        },
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DurationUnit {
    Minutes,
    Hours,
}

/// Find the first `<digits><ws>*<unit>` in `label`.
fn parse_duration_label(label: &str) -> Option<(u64, DurationUnit)> {
    let bytes = label.as_bytes();
    let mut i = 0;

    while i < bytes.len() {
        if !bytes[i].is_ascii_digit() {
            i += 1;
            continue;
        }

        let start = i;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        let digits = &label[start..i];

        let rest = label[i..].trim_start();
        if let Some(unit) = leading_unit(rest) {
            // Digits-only, so the only failure is overflow.
            let n = digits.parse::<u64>().unwrap_or(u64::MAX);
            return Some((n, unit));
        }
    }

    None
}

fn leading_unit(s: &str) -> Option<DurationUnit> {
    let starts_with = |word: &str| {
        s.len() >= word.len()
            && s.as_bytes()[..word.len()].eq_ignore_ascii_case(word.as_bytes())
    };

    if starts_with("minute") {
        Some(DurationUnit::Minutes)
    } else if starts_with("hour") {
        Some(DurationUnit::Hours)
    } else {
        None
    }
}
