//! Product-name normalization used to decide whether two listings describe the
//! same product.
//!
//! The singularization is intentionally naive and its quirks are part of the
//! marketplace contract: changing it changes which listings merge.

/// Strips a plural suffix: `...oes` loses two characters (`potatoes` ->
/// `potato`), any other trailing `s` not preceded by `s` loses one (`beans` ->
/// `bean`, `glass` unchanged). Suffix checks are case-insensitive; the
/// returned text keeps the caller's casing.
pub fn singularize(name: &str) -> String {
    let lowered = name.to_lowercase();
    let lowered_len = lowered.chars().count();

    if lowered.ends_with("oes") && lowered_len > 3 {
        return drop_last_chars(name, 2);
    }
    if lowered.ends_with('s') && !lowered.ends_with("ss") && lowered_len > 2 {
        return drop_last_chars(name, 1);
    }
    name.to_string()
}

/// Uppercases the first letter of every alphabetic run and lowercases the
/// rest (`"green CHILLI"` -> `"Green Chilli"`).
pub fn title_case(value: &str) -> String {
    let mut output = String::with_capacity(value.len());
    let mut previous_is_letter = false;

    for ch in value.chars() {
        if ch.is_alphabetic() {
            if previous_is_letter {
                output.extend(ch.to_lowercase());
            } else {
                output.extend(ch.to_uppercase());
            }
            previous_is_letter = true;
        } else {
            output.push(ch);
            previous_is_letter = false;
        }
    }

    output
}

/// Display name stored on a listing.
pub fn listing_name(name: &str) -> String {
    title_case(&singularize(name.trim()))
}

/// Comparison key: two listings merge when their keys are equal.
pub fn match_key(name: &str) -> String {
    singularize(name.trim()).to_lowercase()
}

pub fn same_product(left: &str, right: &str) -> bool {
    match_key(left) == match_key(right)
}

fn drop_last_chars(value: &str, count: usize) -> String {
    let keep = value.chars().count().saturating_sub(count);
    value.chars().take(keep).collect()
}
