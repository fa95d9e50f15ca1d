//! Canonical finishing routes for common remaining scores.

/// Highest score that can be checked out with three darts.
pub const MAX_CHECKOUT: u32 = 170;

/// Suggested darts to finish from `score`, or `None` when no route is tabulated.
///
/// This is a lookup of the usual finishes, not a solver: most scores between
/// 2 and 170 have no entry.
pub fn checkout_hint(score: u32) -> Option<Vec<String>> {
    if !(2..=MAX_CHECKOUT).contains(&score) {
        return None;
    }

    let route: &[&str] = match score {
        170 => &["T20", "T20", "Bull"],
        160 => &["T20", "T20", "D20"],
        120 => &["T20", "S20", "D20"],
        100 => &["T20", "D20"],
        80 => &["T20", "D10"],
        60 => &["S20", "D20"],
        40 => &["D20"],
        32 => &["D16"],
        20 => &["D10"],
        16 => &["D8"],
        8 => &["D4"],
        4 => &["D2"],
        2 => &["D1"],
        _ => return None,
    };

    Some(route.iter().map(|dart| dart.to_string()).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maximum_checkout_route() {
        assert_eq!(
            checkout_hint(170),
            Some(vec!["T20".to_string(), "T20".to_string(), "Bull".to_string()])
        );
    }

    #[test]
    fn out_of_range_scores_have_no_hint() {
        assert_eq!(checkout_hint(171), None);
        assert_eq!(checkout_hint(501), None);
        assert_eq!(checkout_hint(1), None);
        assert_eq!(checkout_hint(0), None);
    }

    #[test]
    fn unmapped_scores_have_no_hint() {
        assert_eq!(checkout_hint(169), None);
        assert_eq!(checkout_hint(41), None);
        assert_eq!(checkout_hint(40), Some(vec!["D20".to_string()]));
        assert_eq!(checkout_hint(2), Some(vec!["D1".to_string()]));
    }
}
