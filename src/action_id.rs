//! Action identifiers.
//!
//! An action is keyed by the single run of ASCII digits embedded in a type or
//! file name: `Demo2000` and `demo_2000.rs` both name action `2000`. Names
//! with no digits or with several separate digit runs (`v2_demo_3`) do not
//! name an action.

use regex::Regex;
use std::cmp::Ordering;
use std::sync::LazyLock;

static NUMERIC_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("[0-9]+").expect("numeric run pattern is valid"));

/// Returns every maximal run of digits in `name`, in order.
pub fn numeric_runs(name: &str) -> Vec<&str> {
    NUMERIC_RUN.find_iter(name).map(|m| m.as_str()).collect()
}

/// Extracts the action id from a name holding exactly one numeric run.
pub fn extract_action_id(name: &str) -> Option<String> {
    match numeric_runs(name).as_slice() {
        [only] => Some((*only).to_string()),
        _ => None,
    }
}

/// Orders two action ids by numeric value.
///
/// Ids of any length are compared without overflow: leading zeros are
/// ignored, a shorter digit string is smaller, equal lengths compare
/// lexically. Ids that are numerically equal fall back to their raw text so
/// the order stays total.
pub fn compare_action_ids(a: &str, b: &str) -> Ordering {
    let a_digits = a.trim_start_matches('0');
    let b_digits = b.trim_start_matches('0');
    a_digits
        .len()
        .cmp(&b_digits.len())
        .then_with(|| a_digits.cmp(b_digits))
        .then_with(|| a.cmp(b))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_single_run() {
        assert_eq!(extract_action_id("Demo2000"), Some("2000".to_string()));
        assert_eq!(extract_action_id("demo_10002"), Some("10002".to_string()));
    }

    #[test]
    fn test_reject_zero_or_many_runs() {
        assert_eq!(extract_action_id("DemoLoginParams"), None);
        assert_eq!(extract_action_id("v2_demo_3"), None);
        assert_eq!(extract_action_id(""), None);
    }

    #[test]
    fn test_numeric_order_not_lexical() {
        let mut ids = vec!["2", "10", "1"];
        ids.sort_by(|a, b| compare_action_ids(a, b));
        assert_eq!(ids, vec!["1", "2", "10"]);
    }

    #[test]
    fn test_order_beyond_u64() {
        let big = "123456789012345678901234567890";
        assert_eq!(compare_action_ids("9", big), Ordering::Less);
        assert_eq!(compare_action_ids("007", "7"), Ordering::Less);
        assert_eq!(compare_action_ids("10", "010"), Ordering::Greater);
    }
}
