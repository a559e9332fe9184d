//! Percentile-rank letter grading.
//!
//! A row is graded against the site's historical engagement rates, not
//! an absolute scale, so a channel that is improving relative to its
//! own past earns it. Empty history is the cold-start case and grades
//! everything C.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Grade {
    A,
    B,
    C,
    D,
    F,
}

impl Grade {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Grade::A => "A",
            Grade::B => "B",
            Grade::C => "C",
            Grade::D => "D",
            Grade::F => "F",
        }
    }
}

impl std::fmt::Display for Grade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fraction of historical rates strictly below `rate`, in `[0, 1]`.
/// A rate above every historical rate ranks 1.0.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn percentile_rank(rate: f32, history: &[f32]) -> f32 {
    if history.is_empty() {
        return 0.0;
    }
    let below = history.iter().filter(|&&h| h < rate).count();
    below as f32 / history.len() as f32
}

/// Grades one engagement rate against the historical population.
#[must_use]
pub fn grade_rate(rate: f32, history: &[f32]) -> Grade {
    if history.is_empty() {
        return Grade::C;
    }
    let percentile = percentile_rank(rate, history);
    if percentile >= 0.8 {
        Grade::A
    } else if percentile >= 0.6 {
        Grade::B
    } else if percentile >= 0.4 {
        Grade::C
    } else if percentile >= 0.2 {
        Grade::D
    } else {
        Grade::F
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn history() -> Vec<f32> {
        (1..=10).map(|i| i as f32 / 100.0).collect()
    }

    #[test]
    fn empty_history_grades_c() {
        assert_eq!(grade_rate(0.0, &[]), Grade::C);
        assert_eq!(grade_rate(0.9, &[]), Grade::C);
    }

    #[test]
    fn best_ever_rate_grades_a() {
        let history = history();
        assert_eq!(grade_rate(0.99, &history), Grade::A);
    }

    #[test]
    fn worst_ever_rate_grades_f() {
        let history = history();
        assert_eq!(grade_rate(0.001, &history), Grade::F);
    }

    #[test]
    fn percentile_bands_map_to_letters() {
        let history = history();
        // 0.095 sits above 9 of 10 rates: 90th percentile
        assert_eq!(grade_rate(0.095, &history), Grade::A);
        // above 6 of 10: 60th
        assert_eq!(grade_rate(0.065, &history), Grade::B);
        // above 4 of 10: 40th
        assert_eq!(grade_rate(0.045, &history), Grade::C);
        // above 2 of 10: 20th
        assert_eq!(grade_rate(0.025, &history), Grade::D);
    }

    #[test]
    fn percentile_rank_is_strictly_below() {
        let history = vec![0.05, 0.05, 0.05];
        // equal to every historical rate ranks at zero
        assert!(percentile_rank(0.05, &history).abs() < f32::EPSILON);
        assert!((percentile_rank(0.06, &history) - 1.0).abs() < f32::EPSILON);
    }
}
