/// Canonicalizes inbound phone numbers into the single digit-string key form
/// used to index requests (South African numbering: country code 27, no
/// symbols). Every store write and lookup goes through this, so formatting
/// drift between `082…`, `2782…` and `+2782…` can never split a conversation
/// across records.
pub fn canonicalize(raw: &str) -> String {
    let cleaned: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();

    if cleaned.starts_with('0') && cleaned.len() == 10 {
        return format!("27{}", &cleaned[1..]);
    }

    if cleaned.starts_with("27") && (cleaned.len() == 11 || cleaned.len() == 12) {
        return cleaned;
    }

    if cleaned.len() == 9 {
        return format!("27{cleaned}");
    }

    cleaned
}
