// Normalization rules for entity types, names and CSV headers
//
// "Person Name", " person   name " → PERSON_NAME
// "Via  Roma 1"                     → via_roma_1

/// Normalize an entity type label (also used for CSV headers)
///
/// Trimmed, uppercased, internal whitespace runs collapsed to `_`.
pub fn normalize_type(raw: &str) -> String {
    collapse_whitespace(&raw.to_uppercase())
}

/// Normalize a raw cell value into the entity identity key
///
/// Trimmed, lowercased, internal whitespace runs collapsed to `_`.
pub fn normalize_name(raw: &str) -> String {
    collapse_whitespace(&raw.to_lowercase())
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join("_")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_type() {
        assert_eq!(normalize_type("Person"), "PERSON");
        assert_eq!(normalize_type("  person   name "), "PERSON_NAME");
        assert_eq!(normalize_type("e-mail\taddress"), "E-MAIL_ADDRESS");
    }

    #[test]
    fn test_normalize_name() {
        assert_eq!(normalize_name("Rome"), "rome");
        assert_eq!(normalize_name("  Via  Roma\t1 "), "via_roma_1");
        assert_eq!(normalize_name("ROME"), normalize_name(" rome "));
    }

    #[test]
    fn test_normalize_blank() {
        assert_eq!(normalize_name("   "), "");
        assert_eq!(normalize_type(""), "");
    }
}
