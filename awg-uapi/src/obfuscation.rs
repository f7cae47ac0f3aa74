//! AmneziaWG obfuscation parameters

use crate::error::{Error, Result};

/// Traffic-shape obfuscation tuning.
///
/// A zero integer or empty string means "not set": the field is left out of
/// the control stream and the engine default applies.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObfuscationParams {
    /// Junk packet count
    pub jc: u32,
    /// Minimum junk packet size
    pub jmin: u32,
    /// Maximum junk packet size
    pub jmax: u32,
    /// Init packet junk size
    pub s1: u32,
    /// Response packet junk size
    pub s2: u32,
    /// Init packet magic header
    pub h1: String,
    /// Response packet magic header
    pub h2: String,
    /// Cookie reply packet magic header
    pub h3: String,
    /// Transport packet magic header
    pub h4: String,
}

impl ObfuscationParams {
    /// Check the junk size range.
    ///
    /// Only fails when both bounds are set and `jmin >= jmax`.
    pub fn validate(&self) -> Result<()> {
        if self.jmin != 0 && self.jmax != 0 && self.jmin >= self.jmax {
            return Err(Error::JunkRange {
                jmin: self.jmin,
                jmax: self.jmax,
            });
        }
        Ok(())
    }

    /// True when no field is set
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn junk(jmin: u32, jmax: u32) -> ObfuscationParams {
        ObfuscationParams {
            jmin,
            jmax,
            ..Default::default()
        }
    }

    #[test]
    fn test_unset_or_single_bound_is_valid() {
        assert!(junk(0, 0).validate().is_ok());
        assert!(junk(50, 0).validate().is_ok());
        assert!(junk(0, 50).validate().is_ok());
        assert!(ObfuscationParams::default().is_empty());
    }

    #[test]
    fn test_ordered_range_is_valid() {
        assert!(junk(40, 70).validate().is_ok());
        assert!(junk(1, 2).validate().is_ok());
    }

    #[test]
    fn test_inverted_or_equal_range_fails() {
        for (jmin, jmax) in [(70, 40), (50, 50), (2, 1)] {
            let err = junk(jmin, jmax).validate().unwrap_err();
            let msg = err.to_string();
            assert!(msg.contains(&jmin.to_string()), "{msg}");
            assert!(msg.contains(&jmax.to_string()), "{msg}");
        }
    }

    #[test]
    fn test_range_property_exhaustive_small() {
        for jmin in 0..16u32 {
            for jmax in 0..16u32 {
                let should_fail = jmin != 0 && jmax != 0 && jmin >= jmax;
                assert_eq!(junk(jmin, jmax).validate().is_err(), should_fail, "{jmin}/{jmax}");
            }
        }
    }
}
