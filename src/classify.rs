use crate::models::{BehaviorFlags, ZScores};

const BURST_DAYS_CEILING: f64 = 0.2;

/// Assigns the four behavior archetypes. The thresholds are fixed and the
/// flags are independent; NaN scores fail every comparison.
pub fn classify(z: &ZScores, teacher_support: u8) -> BehaviorFlags {
    let stable = z.hours > 0.0 && z.days > 0.0;

    BehaviorFlags {
        burst: z.days < BURST_DAYS_CEILING && z.points > 0.0,
        stable,
        selflearn: stable && teacher_support == 0,
        passive: z.hours < 0.0 && z.points < 0.0,
    }
}
