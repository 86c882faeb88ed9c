//! Phone number → WhatsApp chat address.

/// Suffix of a one-to-one chat address.
pub const USER_SUFFIX: &str = "@c.us";

/// Suffix of a group chat address.
pub const GROUP_SUFFIX: &str = "@g.us";

/// Normalise a user-supplied phone number into a `<digits>@c.us` address.
///
/// Non-digits are stripped, a leading `0` becomes `country_code`, and the
/// user suffix is appended. Group addresses and input without any digits
/// are returned unchanged. Formatting a formatted address is a no-op.
pub fn format_phone_number(input: &str, country_code: &str) -> String {
    if input.ends_with(GROUP_SUFFIX) {
        return input.to_string();
    }

    let digits: String = input.chars().filter(char::is_ascii_digit).collect();
    if digits.is_empty() {
        return input.to_string();
    }

    let mut formatted = match digits.strip_prefix('0') {
        Some(rest) => format!("{country_code}{rest}"),
        None => digits,
    };
    formatted.push_str(USER_SUFFIX);
    formatted
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_number_gets_country_code() {
        assert_eq!(
            format_phone_number("081234567890", "62"),
            "6281234567890@c.us"
        );
    }

    #[test]
    fn strips_formatting_characters() {
        assert_eq!(
            format_phone_number("+62 812-3456-7890", "62"),
            "6281234567890@c.us"
        );
    }

    #[test]
    fn canonical_address_is_unchanged() {
        let canonical = "6281234567890@c.us";
        assert_eq!(format_phone_number(canonical, "62"), canonical);
        let twice = format_phone_number(&format_phone_number("0812 345", "62"), "62");
        assert_eq!(twice, "62812345@c.us");
    }

    #[test]
    fn custom_country_code() {
        assert_eq!(format_phone_number("0612345678", "31"), "31612345678@c.us");
    }

    #[test]
    fn group_address_passes_through() {
        let group = "120363025555555555@g.us";
        assert_eq!(format_phone_number(group, "62"), group);
    }

    #[test]
    fn input_without_digits_passes_through() {
        assert_eq!(format_phone_number("not a number", "62"), "not a number");
        assert_eq!(format_phone_number("", "62"), "");
    }
}
