//! Contact identifier normalization
//!
//! Phone numbers arrive as "(75) 99999-0000", "+55 75 99999 0000" and so on.
//! Only the digits are compared.

use crate::error::{CatalogError, CatalogResult};

pub fn normalize_contact(raw: &str) -> String {
    raw.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// Longest normalized contact the stores accept
pub const MAX_CONTACT_DIGITS: usize = 32;

/// Normalize and reject identifiers without any digit or with too many
pub fn require_contact(raw: &str) -> CatalogResult<String> {
    let contact = normalize_contact(raw);
    if contact.is_empty() {
        return Err(CatalogError::invalid(
            "contact identifier must contain digits",
        ));
    }
    if contact.len() > MAX_CONTACT_DIGITS {
        return Err(CatalogError::invalid(format!(
            "contact identifier must not exceed {} digits",
            MAX_CONTACT_DIGITS
        )));
    }
    Ok(contact)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_strips_punctuation() {
        assert_eq!(normalize_contact("(75) 99999-0000"), "75999990000");
        assert_eq!(normalize_contact("75999990000"), "75999990000");
        assert_eq!(normalize_contact("+55 (75) 9.8888-7777"), "5575988887777");
    }

    #[test]
    fn test_require_contact() {
        assert!(require_contact("() -").is_err());
        assert_eq!(require_contact(" 7 5 ").unwrap(), "75");
    }

    #[test]
    fn test_require_contact_length_bound() {
        let longest = "9".repeat(MAX_CONTACT_DIGITS);
        assert_eq!(require_contact(&longest).unwrap(), longest);

        let too_long = "9".repeat(40);
        assert!(matches!(
            require_contact(&too_long),
            Err(CatalogError::InvalidInput(_))
        ));
        assert!(require_contact(&format!("+{}", "1-".repeat(33))).is_err());
    }
}
