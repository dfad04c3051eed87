use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Weight of the newest sample in the smoothed solve time.
const SMOOTHING: f32 = 0.3;
/// Fraction of the budget the smoothed time must stay under before quality is raised.
const RAISE_BELOW: f32 = 0.6;
/// Consecutive comfortable steps required before raising quality by one notch.
const RAISE_AFTER: u32 = 30;

/// Substep and iteration counts for one step.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct QualityLevel {
    pub substeps: u32,
    pub iterations: u32,
}

impl QualityLevel {
    /// One notch cheaper: drop an iteration, or when none can go, trade a
    /// substep for a full set of iterations. `None` at the floor.
    fn lowered(self, floor: QualityLevel, ceiling: QualityLevel) -> Option<Self> {
        if self.iterations > floor.iterations {
            Some(Self {
                iterations: self.iterations - 1,
                ..self
            })
        } else if self.substeps > floor.substeps {
            Some(Self {
                substeps: self.substeps - 1,
                iterations: ceiling.iterations,
            })
        } else {
            None
        }
    }

    /// One notch dearer, undoing [`Self::lowered`]. `None` at the ceiling.
    fn raised(self, floor: QualityLevel, ceiling: QualityLevel) -> Option<Self> {
        if self.iterations < ceiling.iterations {
            Some(Self {
                iterations: self.iterations + 1,
                ..self
            })
        } else if self.substeps < ceiling.substeps {
            Some(Self {
                substeps: self.substeps + 1,
                iterations: floor.iterations,
            })
        } else {
            None
        }
    }
}

/// Adaptive quality controller.
///
/// Smooths measured solve times and steps down a ladder of
/// [`QualityLevel`]s while over budget: iterations first, then substeps.
/// Quality climbs back one notch at a time after a run of comfortable steps.
#[derive(Clone, Debug)]
pub struct AdaptiveQuality {
    /// Target solve time per step in milliseconds.
    pub budget_ms: f32,
    pub enabled: bool,
    floor: QualityLevel,
    /// The configured level.
    ceiling: QualityLevel,
    current: QualityLevel,
    smoothed_ms: f32,
    comfortable_steps: u32,
}

impl AdaptiveQuality {
    pub fn new(substeps: u32, iterations: u32) -> Self {
        let ceiling = QualityLevel {
            substeps: substeps.max(1),
            iterations: iterations.max(1),
        };
        Self {
            budget_ms: 4.0,
            enabled: false,
            floor: QualityLevel {
                substeps: 1,
                iterations: 1,
            },
            ceiling,
            current: ceiling,
            smoothed_ms: 0.0,
            comfortable_steps: 0,
        }
    }

    /// Level to run the next step at. Always the configured level while disabled.
    pub fn level(&self) -> QualityLevel {
        if self.enabled {
            self.current
        } else {
            self.ceiling
        }
    }

    pub fn substeps(&self) -> u32 {
        self.level().substeps
    }

    pub fn iterations(&self) -> u32 {
        self.level().iterations
    }

    /// Jump back to the configured level and forget the timing history.
    pub fn restore_full(&mut self) {
        self.current = self.ceiling;
        self.smoothed_ms = 0.0;
        self.comfortable_steps = 0;
    }

    /// Feed the latest measured solve time in milliseconds.
    pub fn update(&mut self, solve_ms: f32) {
        if !self.enabled || !solve_ms.is_finite() {
            return;
        }
        self.smoothed_ms += (solve_ms - self.smoothed_ms) * SMOOTHING;

        if self.smoothed_ms > self.budget_ms {
            self.comfortable_steps = 0;
            if let Some(next) = self.current.lowered(self.floor, self.ceiling) {
                self.current = next;
                warn!(
                    smoothed_ms = self.smoothed_ms,
                    budget_ms = self.budget_ms,
                    substeps = next.substeps,
                    iterations = next.iterations,
                    "solver over budget, lowering quality"
                );
            }
            return;
        }

        if self.smoothed_ms >= self.budget_ms * RAISE_BELOW {
            // Inside budget but without headroom: hold the level.
            self.comfortable_steps = self.comfortable_steps.min(RAISE_AFTER / 2);
            return;
        }

        self.comfortable_steps += 1;
        if self.comfortable_steps > RAISE_AFTER {
            self.comfortable_steps = 0;
            if let Some(next) = self.current.raised(self.floor, self.ceiling) {
                self.current = next;
                debug!(
                    substeps = next.substeps,
                    iterations = next.iterations,
                    "raising solver quality"
                );
            }
        }
    }
}

/// Snapshot of solver state after the latest step.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SolverStats {
    pub particle_count: u32,
    pub active_particle_count: u32,
    pub constraint_count: u32,
    pub active_constraint_count: u32,
    pub broken_constraint_count: u32,
    /// Wall time of the latest step in milliseconds (0 where no clock is available).
    pub last_solve_time_ms: f32,
    pub last_iterations_used: u32,
    pub last_substeps_used: u32,
    /// Times the body was reset after diverging.
    pub divergence_resets: u32,
    /// Particles rolled back after going non-finite.
    pub nan_recoveries: u32,
    pub is_fractured: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn enabled(substeps: u32, iterations: u32, budget_ms: f32) -> AdaptiveQuality {
        let mut aq = AdaptiveQuality::new(substeps, iterations);
        aq.enabled = true;
        aq.budget_ms = budget_ms;
        aq
    }

    #[test]
    fn test_over_budget_lowers_iterations_first() {
        let mut aq = enabled(4, 8, 1.0);
        for _ in 0..3 {
            aq.update(50.0);
        }
        assert_eq!(aq.substeps(), 4, "substeps held while iterations remain");
        assert_eq!(aq.iterations(), 5);
    }

    #[test]
    fn test_substep_drop_refills_iterations() {
        let mut aq = enabled(3, 2, 1.0);
        aq.update(50.0);
        assert_eq!(aq.level(), QualityLevel { substeps: 3, iterations: 1 });
        aq.update(50.0);
        assert_eq!(aq.level(), QualityLevel { substeps: 2, iterations: 2 });
    }

    #[test]
    fn test_floor_is_one_and_one() {
        let mut aq = enabled(4, 3, 4.0);
        for _ in 0..100 {
            aq.update(100.0);
        }
        assert_eq!(aq.level(), QualityLevel { substeps: 1, iterations: 1 });
    }

    #[test]
    fn test_quality_recovers_under_budget() {
        let mut aq = enabled(4, 3, 8.0);
        for _ in 0..5 {
            aq.update(100.0);
        }

        // The smoothed time lags the load: it keeps lowering for a few fast
        // samples and sits in the hold band before any raise.
        for _ in 0..20 {
            aq.update(1.0);
        }
        let settled = aq.level();
        assert_eq!(settled, QualityLevel { substeps: 1, iterations: 1 });

        for _ in 0..200 {
            aq.update(1.0);
        }
        let recovered = aq.level();
        assert!(
            recovered.substeps > settled.substeps,
            "quality should climb back: {:?} -> {:?}",
            settled,
            recovered
        );
    }

    #[test]
    fn test_disabled_ignores_timing() {
        let mut aq = AdaptiveQuality::new(4, 3);
        assert!(!aq.enabled);
        for _ in 0..20 {
            aq.update(1000.0);
        }
        assert_eq!(aq.level(), QualityLevel { substeps: 4, iterations: 3 });
    }

    #[test]
    fn test_non_finite_samples_are_skipped() {
        let mut aq = enabled(4, 3, 4.0);
        aq.update(f32::NAN);
        aq.update(f32::INFINITY);
        assert_eq!(aq.level(), QualityLevel { substeps: 4, iterations: 3 });
    }

    #[test]
    fn test_restore_full() {
        let mut aq = enabled(4, 3, 4.0);
        for _ in 0..100 {
            aq.update(100.0);
        }
        aq.restore_full();
        assert_eq!(aq.level(), QualityLevel { substeps: 4, iterations: 3 });
    }
}
