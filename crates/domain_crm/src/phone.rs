//! Phone number normalization for lookups and stored contact info

/// Country calling code substituted for a domestic trunk prefix
pub const DEFAULT_COUNTRY_CODE: &str = "+420";

const SEPARATORS: [char; 6] = [' ', '-', '(', ')', '/', '.'];

/// Strips separators and rewrites a domestic `0` + 9 digits number to
/// `+420` + those 9 digits
///
/// Any other shape, including numbers already in international form, is
/// returned with separators removed and otherwise unchanged.
pub fn normalize_phone(raw: &str) -> String {
    let compact: String = raw
        .trim()
        .chars()
        .filter(|c| !c.is_whitespace() && !SEPARATORS.contains(c))
        .collect();

    let is_domestic = compact.len() == 10
        && compact.starts_with('0')
        && compact.chars().all(|c| c.is_ascii_digit());

    if is_domestic {
        format!("{}{}", DEFAULT_COUNTRY_CODE, &compact[1..])
    } else {
        compact
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_domestic_number_rewritten() {
        assert_eq!(normalize_phone("0691 234 456"), "+420691234456");
        assert_eq!(normalize_phone("069-123-4567"), "+420691234567");
        assert_eq!(normalize_phone("(069) 123/45.67"), "+420691234567");
    }

    #[test]
    fn test_other_formats_pass_through() {
        assert_eq!(normalize_phone("+420 777 123 456"), "+420777123456");
        assert_eq!(normalize_phone("777 123 456"), "777123456");
        assert_eq!(normalize_phone("00420777123456"), "00420777123456");
        assert_eq!(normalize_phone(""), "");
    }

    #[test]
    fn test_leading_zero_with_eight_digits_is_not_rewritten() {
        assert_eq!(normalize_phone("069 123 456"), "069123456");
    }

    proptest! {
        #[test]
        fn prop_domestic_numbers_get_country_code(digits in "[0-9]{9}") {
            let raw = format!("0{} {} {}", &digits[..3], &digits[3..6], &digits[6..]);
            prop_assert_eq!(normalize_phone(&raw), format!("+420{}", digits));
        }

        #[test]
        fn prop_normalization_is_idempotent(raw in "[0-9 +()/.-]{0,16}") {
            let once = normalize_phone(&raw);
            prop_assert_eq!(normalize_phone(&once), once.clone());
        }
    }
}
