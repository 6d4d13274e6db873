// SPDX-FileCopyrightText: 2026 Harambee Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Phone number formats accepted by the bot and the mobile-money gateway.
//!
//! Three shapes may be stored against a user: international `+<digits>`,
//! national `07XXXXXXXX`, and gateway-native `2547XXXXXXXX`. Payers type the
//! national form; the gateway is always handed the `2547...` form.

/// Returns true if `phone` is in one of the stored formats.
pub fn is_valid_phone(phone: &str) -> bool {
    if let Some(rest) = phone.strip_prefix('+') {
        return !rest.is_empty() && all_digits(rest);
    }
    is_national(phone) || is_gateway_native(phone)
}

/// Returns true if `phone` is a national mobile number (`07XXXXXXXX`).
///
/// This is the only format accepted from payers at donation time.
pub fn is_national(phone: &str) -> bool {
    phone.len() == 10 && phone.starts_with("07") && all_digits(phone)
}

fn is_gateway_native(phone: &str) -> bool {
    phone.len() == 12 && phone.starts_with("2547") && all_digits(phone)
}

/// Converts a stored phone number into the form the gateway expects.
///
/// Returns `None` if the input is not in an accepted format.
pub fn to_international(phone: &str) -> Option<String> {
    if is_national(phone) {
        return Some(format!("254{}", &phone[1..]));
    }
    if is_gateway_native(phone) {
        return Some(phone.to_string());
    }
    match phone.strip_prefix('+') {
        Some(rest) if !rest.is_empty() && all_digits(rest) => Some(rest.to_string()),
        _ => None,
    }
}

fn all_digits(s: &str) -> bool {
    s.bytes().all(|b| b.is_ascii_digit())
}
