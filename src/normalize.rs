/// Lowercases `value` and drops everything outside `[a-z0-9]`.
pub fn normalize_name(value: &str) -> String {
    value
        .chars()
        .flat_map(char::to_lowercase)
        .filter(|ch| ch.is_ascii_lowercase() || ch.is_ascii_digit())
        .collect()
}

pub fn names_equal(left: &str, right: &str) -> bool {
    normalize_name(left) == normalize_name(right)
}

/// True when the normalized `needle` occurs inside the normalized `haystack`.
pub fn name_contains(haystack: &str, needle: &str) -> bool {
    normalize_name(haystack).contains(&normalize_name(needle))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_separators_and_case() {
        assert_eq!(normalize_name("New Delhi"), "newdelhi");
        assert_eq!(
            normalize_name("DEL_ND_NewDelhi.Intl.AP.432950_TMYx.zip"),
            "delndnewdelhiintlap432950tmyxzip"
        );
        assert_eq!(normalize_name(""), "");
    }

    #[test]
    fn drops_non_ascii_letters() {
        assert_eq!(normalize_name("São Paulo"), "sopaulo");
        assert_eq!(normalize_name("Zürich-2"), "zrich2");
    }

    #[test]
    fn is_idempotent() {
        for value in ["New Delhi", "  St. John's ", "İstanbul", "a_b-c.d", "", "ÀÉÎ123"] {
            let once = normalize_name(value);
            assert_eq!(normalize_name(&once), once);
        }
    }

    #[test]
    fn containment_uses_normalized_forms() {
        assert!(name_contains("MUM_MH_Mumbai.430030_TMYx.zip", "mumbai"));
        assert!(name_contains("DEL_ND_NewDelhi.432950_TMYx.zip", "New  Delhi"));
        assert!(!name_contains("MUM_MH_Mumbai.430030_TMYx.zip", "Pune"));
        assert!(names_equal("New-Delhi", "new delhi"));
    }
}
