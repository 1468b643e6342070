//! GPA performance bands.
//!
//! The list filter and the statistics use different splits and both are
//! kept: the filter has three bands, the dashboard and chart have four.

use rust_decimal::Decimal;
use serde::Serialize;

/// 3.50
pub const EXCELLENT_MIN: Decimal = Decimal::from_parts(350, 0, 0, false, 2);
/// 3.00
pub const GOOD_MIN: Decimal = Decimal::from_parts(300, 0, 0, false, 2);
/// 2.00
pub const AVERAGE_MIN: Decimal = Decimal::from_parts(200, 0, 0, false, 2);

/// List-filter band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PerformanceBand {
    Excellent,
    Good,
    NeedsImprovement,
}

impl PerformanceBand {
    pub fn of(gpa: Decimal) -> Self {
        if gpa >= EXCELLENT_MIN {
            Self::Excellent
        } else if gpa >= GOOD_MIN {
            Self::Good
        } else {
            Self::NeedsImprovement
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "excellent" => Some(Self::Excellent),
            "good" => Some(Self::Good),
            "needs_improvement" => Some(Self::NeedsImprovement),
            _ => None,
        }
    }

    /// Inclusive lower bound and exclusive upper bound.
    pub fn bounds(self) -> (Option<Decimal>, Option<Decimal>) {
        match self {
            Self::Excellent => (Some(EXCELLENT_MIN), None),
            Self::Good => (Some(GOOD_MIN), Some(EXCELLENT_MIN)),
            Self::NeedsImprovement => (None, Some(GOOD_MIN)),
        }
    }

    pub fn contains(self, gpa: Decimal) -> bool {
        let (lower, upper) = self.bounds();
        lower.map_or(true, |l| gpa >= l) && upper.map_or(true, |u| gpa < u)
    }
}

/// Statistics band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StatsBand {
    Excellent,
    Good,
    Average,
    Poor,
}

impl StatsBand {
    pub const ALL: [StatsBand; 4] = [Self::Excellent, Self::Good, Self::Average, Self::Poor];

    pub fn of(gpa: Decimal) -> Self {
        if gpa >= EXCELLENT_MIN {
            Self::Excellent
        } else if gpa >= GOOD_MIN {
            Self::Good
        } else if gpa >= AVERAGE_MIN {
            Self::Average
        } else {
            Self::Poor
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Excellent => "Excellent",
            Self::Good => "Good",
            Self::Average => "Average",
            Self::Poor => "Poor",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gpa(hundredths: i64) -> Decimal {
        Decimal::new(hundredths, 2)
    }

    #[test]
    fn constants_have_expected_values() {
        assert_eq!(EXCELLENT_MIN.to_string(), "3.50");
        assert_eq!(GOOD_MIN.to_string(), "3.00");
        assert_eq!(AVERAGE_MIN.to_string(), "2.00");
    }

    #[test]
    fn filter_band_boundaries() {
        assert_eq!(PerformanceBand::of(gpa(350)), PerformanceBand::Excellent);
        assert_eq!(PerformanceBand::of(gpa(349)), PerformanceBand::Good);
        assert_eq!(PerformanceBand::of(gpa(300)), PerformanceBand::Good);
        assert_eq!(PerformanceBand::of(gpa(299)), PerformanceBand::NeedsImprovement);
        assert_eq!(PerformanceBand::of(gpa(0)), PerformanceBand::NeedsImprovement);
    }

    #[test]
    fn stats_band_boundaries() {
        assert_eq!(StatsBand::of(gpa(400)), StatsBand::Excellent);
        assert_eq!(StatsBand::of(gpa(320)), StatsBand::Good);
        assert_eq!(StatsBand::of(gpa(200)), StatsBand::Average);
        assert_eq!(StatsBand::of(gpa(199)), StatsBand::Poor);
    }

    #[test]
    fn contains_agrees_with_of() {
        for h in [0, 150, 199, 200, 250, 299, 300, 349, 350, 400] {
            let g = gpa(h);
            for band in [
                PerformanceBand::Excellent,
                PerformanceBand::Good,
                PerformanceBand::NeedsImprovement,
            ] {
                assert_eq!(band.contains(g), PerformanceBand::of(g) == band, "gpa {g}");
            }
        }
    }

    #[test]
    fn parse_accepts_only_known_names() {
        assert_eq!(PerformanceBand::parse("good"), Some(PerformanceBand::Good));
        assert_eq!(
            PerformanceBand::parse("needs_improvement"),
            Some(PerformanceBand::NeedsImprovement)
        );
        assert_eq!(PerformanceBand::parse("average"), None);
        assert_eq!(PerformanceBand::parse("Excellent"), None);
    }
}
