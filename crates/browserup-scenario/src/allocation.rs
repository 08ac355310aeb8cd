//! Profile allocation defaulting.
//!
//! Explicit allocations are kept as authored. The remainder up to 100% is
//! divided evenly among profiles with no allocation; the integer remainder
//! of that division goes to the first unallocated profile encountered, so
//! the final percentages always sum to exactly 100.

use crate::error::{ConfigError, Result};
use crate::model::{parse_percent, Profile};

/// Fills in missing allocations and derives concrete user counts.
///
/// # Errors
///
/// Returns [`ConfigError::BadPercent`] for a malformed allocation value and
/// [`ConfigError::BadAllocationTotal`] when explicit allocations exceed
/// 100% or leave nothing to split while not already summing to 100%.
pub fn populate_allocations(profiles: &mut [Profile], total_users: u32) -> Result<()> {
    let mut explicit_total: u32 = 0;
    let mut unallocated: u32 = 0;

    for profile in profiles.iter() {
        match profile.allocation.as_deref() {
            Some(value) => {
                let percent = parse_percent(value).ok_or_else(|| ConfigError::BadPercent {
                    value: value.to_string(),
                })?;
                explicit_total += percent;
            }
            None => unallocated += 1,
        }
    }

    if explicit_total > 100 || (unallocated == 0 && explicit_total != 100) {
        return Err(ConfigError::BadAllocationTotal {
            total: explicit_total,
        });
    }

    if unallocated > 0 {
        let remaining = 100 - explicit_total;
        let share = remaining / unallocated;
        let mut remainder = remaining % unallocated;
        for profile in profiles.iter_mut() {
            if profile.allocation.is_none() {
                profile.allocation = Some(format!("{}%", share + remainder));
                remainder = 0;
            }
        }
    }

    for profile in profiles.iter_mut() {
        let percent = profile
            .allocation
            .as_deref()
            .and_then(parse_percent)
            .unwrap_or(0);
        let actual = (f64::from(total_users) * f64::from(percent) / 100.0).round() as u32;
        profile.allocation_actual = Some(actual);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(name: &str, allocation: Option<&str>) -> Profile {
        serde_yaml::from_str::<Profile>(&format!(
            "name: {name}\nartifact_dir: .\n{}",
            allocation.map_or(String::new(), |a| format!("allocation: \"{a}\"")),
        ))
        .expect("parse profile")
    }

    fn percents(profiles: &[Profile]) -> Vec<u32> {
        profiles
            .iter()
            .map(|p| parse_percent(p.allocation.as_deref().expect("allocated")).expect("percent"))
            .collect()
    }

    #[test]
    fn unallocated_profiles_split_remainder_to_exactly_100() {
        let mut profiles = vec![
            profile("a", Some("40%")),
            profile("b", None),
            profile("c", None),
            profile("d", None),
        ];
        populate_allocations(&mut profiles, 100).expect("populate");

        let got = percents(&profiles);
        assert_eq!(got.iter().sum::<u32>(), 100);
        // 60 / 3 = 20 each, no remainder
        assert_eq!(got, vec![40, 20, 20, 20]);
    }

    #[test]
    fn integer_remainder_goes_to_first_unallocated_profile() {
        let mut profiles = vec![
            profile("a", Some("30%")),
            profile("b", None),
            profile("c", None),
            profile("d", None),
        ];
        populate_allocations(&mut profiles, 100).expect("populate");

        // 70 = 3 * 23 + 1; the extra point lands on the first unallocated
        assert_eq!(percents(&profiles), vec![30, 24, 23, 23]);
        assert_eq!(percents(&profiles).iter().sum::<u32>(), 100);
    }

    #[test]
    fn two_profiles_forty_and_unallocated_against_ten_users() {
        let mut profiles = vec![profile("a", Some("40%")), profile("b", None)];
        populate_allocations(&mut profiles, 10).expect("populate");

        assert_eq!(profiles[0].allocation_actual, Some(4));
        assert_eq!(profiles[1].allocation.as_deref(), Some("60%"));
        assert_eq!(profiles[1].allocation_actual, Some(6));
    }

    #[test]
    fn explicit_allocations_over_100_are_rejected() {
        let mut profiles = vec![profile("a", Some("80%")), profile("b", Some("30%"))];
        let err = populate_allocations(&mut profiles, 10);
        assert!(matches!(
            err,
            Err(ConfigError::BadAllocationTotal { total: 110 })
        ));
    }

    #[test]
    fn fully_explicit_allocations_must_sum_to_100() {
        let mut profiles = vec![profile("a", Some("50%")), profile("b", Some("30%"))];
        let err = populate_allocations(&mut profiles, 10);
        assert!(matches!(
            err,
            Err(ConfigError::BadAllocationTotal { total: 80 })
        ));
    }

    #[test]
    fn malformed_allocation_is_rejected() {
        let mut profiles = vec![profile("a", Some("lots"))];
        let err = populate_allocations(&mut profiles, 10);
        assert!(matches!(err, Err(ConfigError::BadPercent { .. })));
    }
}
