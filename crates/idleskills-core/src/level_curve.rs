//! Experience curve: level requirements and level-up resolution.
//!
//! XP required to advance from level `L` to `L + 1` is
//! `floor(base_xp * scaling_factor^(L - 1))`. With the defaults (10, 1.1)
//! level 1 needs 10 XP, level 2 needs 11, level 3 needs 12, and so on.
//!
//! Applying a large XP delta may cross several thresholds at once; every
//! crossed requirement is subtracted and any surplus is kept.

use idleskills_types::{STARTING_LEVEL, Skill};

use crate::config::LevelCurveConfig;

/// Errors that can occur while applying experience.
#[derive(Debug, thiserror::Error)]
pub enum LevelCurveError {
    /// XP or level counter would overflow.
    #[error("arithmetic overflow applying xp to {skill}: {context}")]
    Overflow {
        /// Skill being updated.
        skill: String,
        /// What was being computed.
        context: &'static str,
    },
}

/// Pure, stateless XP curve.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LevelCurve {
    base_xp: u64,
    scaling_factor: f64,
}

impl LevelCurve {
    /// Create a curve from explicit constants.
    ///
    /// A `base_xp` of 0 is raised to 1 and a `scaling_factor` below 1.0 (or
    /// non-finite) is treated as 1.0, so requirements are always positive and
    /// never shrink as the level grows.
    pub fn new(base_xp: u64, scaling_factor: f64) -> Self {
        let scaling_factor = if scaling_factor.is_finite() && scaling_factor >= 1.0 {
            scaling_factor
        } else {
            1.0
        };
        Self {
            base_xp: base_xp.max(1),
            scaling_factor,
        }
    }

    /// Create a curve from the `level_curve` configuration section.
    pub fn from_config(config: &LevelCurveConfig) -> Self {
        Self::new(config.base_xp, config.scaling_factor)
    }

    /// XP needed to go from `level` to `level + 1`.
    ///
    /// Levels below 1 are treated as level 1.
    pub fn xp_for_next_level(&self, level: u32) -> u64 {
        let exponent = i32::try_from(level.saturating_sub(1)).unwrap_or(i32::MAX);
        #[allow(clippy::cast_precision_loss)]
        let base = self.base_xp as f64;
        let required = (base * self.scaling_factor.powi(exponent)).floor();
        // `as` saturates at u64::MAX for huge values; the floor keeps it
        // integral and the max keeps it positive.
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let required = required as u64;
        required.max(1)
    }

    /// Add `xp_delta` to `skill` and resolve every level-up it triggers.
    ///
    /// Returns a skill equal to the input when no threshold is crossed and
    /// the delta is zero. The returned XP is always below the requirement of
    /// the returned level.
    pub fn apply_xp(&self, skill: &Skill, xp_delta: u64) -> Result<Skill, LevelCurveError> {
        let overflow = |context| LevelCurveError::Overflow {
            skill: skill.name.clone(),
            context,
        };

        let mut level = skill.level.max(STARTING_LEVEL);
        let mut xp = skill
            .xp
            .checked_add(xp_delta)
            .ok_or_else(|| overflow("xp total"))?;

        loop {
            let required = self.xp_for_next_level(level);
            if xp < required {
                break;
            }
            xp = xp
                .checked_sub(required)
                .ok_or_else(|| overflow("xp subtraction"))?;
            level = level
                .checked_add(1)
                .ok_or_else(|| overflow("level increment"))?;
        }

        Ok(Skill {
            name: skill.name.clone(),
            level,
            xp,
        })
    }

    /// Total XP needed to reach `target_level` from level 1 with no XP.
    pub fn total_xp_for_level(&self, target_level: u32) -> u64 {
        (STARTING_LEVEL..target_level)
            .map(|level| self.xp_for_next_level(level))
            .fold(0_u64, u64::saturating_add)
    }

    /// Fraction of the way from the skill's level to the next, in `[0, 1)`.
    pub fn level_progress(&self, skill: &Skill) -> f64 {
        let required = self.xp_for_next_level(skill.level);
        #[allow(clippy::cast_precision_loss)]
        let fraction = skill.xp as f64 / required as f64;
        fraction.clamp(0.0, 1.0)
    }
}

impl Default for LevelCurve {
    fn default() -> Self {
        Self::from_config(&LevelCurveConfig::default())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn skill(level: u32, xp: u64) -> Skill {
        Skill {
            name: String::from("Woodcutting"),
            level,
            xp,
        }
    }

    #[test]
    fn requirements_follow_the_curve() {
        let curve = LevelCurve::default();
        assert_eq!(curve.xp_for_next_level(1), 10);
        assert_eq!(curve.xp_for_next_level(2), 11);
        assert_eq!(curve.xp_for_next_level(3), 12);
        assert_eq!(curve.xp_for_next_level(4), 13);
    }

    #[test]
    fn requirements_are_positive_and_non_decreasing() {
        let curve = LevelCurve::default();
        let mut previous = 0;
        for level in 1..=300 {
            let required = curve.xp_for_next_level(level);
            assert!(required > 0, "level {level} requires nothing");
            assert!(required >= previous, "level {level} shrank");
            previous = required;
        }
    }

    #[test]
    fn huge_levels_saturate() {
        let curve = LevelCurve::default();
        assert_eq!(curve.xp_for_next_level(u32::MAX), u64::MAX);
    }

    #[test]
    fn zero_delta_is_identity() {
        let curve = LevelCurve::default();
        let before = skill(7, 3);
        assert_eq!(curve.apply_xp(&before, 0).unwrap(), before);
    }

    #[test]
    fn below_threshold_only_adds_xp() {
        let curve = LevelCurve::default();
        let after = curve.apply_xp(&skill(1, 0), 9).unwrap();
        assert_eq!(after, skill(1, 9));
    }

    #[test]
    fn exact_threshold_levels_up_with_no_surplus() {
        let curve = LevelCurve::default();
        let after = curve.apply_xp(&skill(1, 4), 6).unwrap();
        assert_eq!(after, skill(2, 0));
    }

    #[test]
    fn cascading_level_ups() {
        let curve = LevelCurve::default();
        // 21 = 10 (level 1) + 11 (level 2)
        let after = curve.apply_xp(&skill(1, 0), 21).unwrap();
        assert_eq!(after, skill(3, 0));

        let after = curve.apply_xp(&skill(1, 0), 25).unwrap();
        assert_eq!(after, skill(3, 4));
    }

    #[test]
    fn result_is_always_normalized() {
        let curve = LevelCurve::default();
        for delta in [0, 1, 9, 10, 11, 100, 1_000, 123_456] {
            let before = skill(3, 5);
            let after = curve.apply_xp(&before, delta).unwrap();
            assert!(after.level >= before.level);
            assert!(after.xp < curve.xp_for_next_level(after.level));
        }
    }

    #[test]
    fn overflow_is_reported() {
        let curve = LevelCurve::default();
        let err = curve.apply_xp(&skill(1, u64::MAX), 1).unwrap_err();
        assert!(err.to_string().contains("Woodcutting"));
    }

    #[test]
    fn total_xp_sums_requirements() {
        let curve = LevelCurve::default();
        assert_eq!(curve.total_xp_for_level(1), 0);
        assert_eq!(curve.total_xp_for_level(2), 10);
        assert_eq!(curve.total_xp_for_level(3), 21);
        assert_eq!(curve.total_xp_for_level(4), 33);
    }

    #[test]
    fn total_xp_round_trips_through_apply() {
        let curve = LevelCurve::default();
        let total = curve.total_xp_for_level(20);
        let after = curve.apply_xp(&skill(1, 0), total).unwrap();
        assert_eq!(after, skill(20, 0));
    }

    #[test]
    fn invalid_constants_are_clamped() {
        let curve = LevelCurve::new(0, 0.5);
        assert_eq!(curve.xp_for_next_level(1), 1);
        assert_eq!(curve.xp_for_next_level(50), 1);
    }

    #[test]
    fn level_progress_is_a_fraction() {
        let curve = LevelCurve::default();
        let progress = curve.level_progress(&skill(1, 5));
        assert!((progress - 0.5).abs() < f64::EPSILON);
    }
}
