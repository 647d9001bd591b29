//! Decomposition of a loading program into signed segments.

use crate::error::{AnalyzeError, Result};

/// Remainders at or below this fraction of `max_step` are rounding slivers.
const SLIVER_RATIO: f64 = 1e-9;

/// Plans `count` equal segments of length `step` (time-history runs).
pub fn plan_uniform(step: f64, count: usize) -> Vec<f64> {
    vec![step; count]
}

/// Plans a displacement-control protocol.
///
/// Each leg runs from the previous target (zero for the first) to the next
/// one and is cut into full `max_step` segments carrying the leg's sign,
/// followed by one remainder. A leg that is an exact multiple of `max_step`
/// ends with a full segment. Zero-length legs produce nothing, and a remainder
/// that is only floating point residue is folded into the segment before it,
/// so no zero-magnitude segment is ever planned.
///
/// The first target is expected to be positive; this is logged, not enforced.
/// NaN or infinite values are rejected before anything is planned.
pub fn plan_protocol(max_step: f64, targets: &[f64]) -> Result<Vec<f64>> {
    if !(max_step > 0.0) {
        return Err(AnalyzeError::non_positive("max_step", max_step));
    }
    if !max_step.is_finite() {
        return Err(AnalyzeError::NonFiniteValue {
            context: "max_step",
            value: max_step,
        });
    }
    let Some(&first) = targets.first() else {
        return Err(AnalyzeError::EmptyProtocol);
    };
    if let Some(&target) = targets.iter().find(|target| !target.is_finite()) {
        return Err(AnalyzeError::NonFiniteValue {
            context: "displacement target",
            value: target,
        });
    }
    if !(first > 0.0) {
        log::warn!("first displacement target {first} is not positive");
    }

    let mut segments = Vec::new();
    let mut previous = 0.0_f64;
    for &target in targets {
        let section = target - previous;
        previous = target;
        plan_leg(section, max_step, &mut segments);
    }
    Ok(segments)
}

fn plan_leg(section: f64, max_step: f64, segments: &mut Vec<f64>) {
    if section == 0.0 {
        return;
    }

    let sign = section.signum();
    let distance = section.abs();
    let leg_start = segments.len();

    let mut full = 0usize;
    while distance - full as f64 * max_step > max_step {
        segments.push(sign * max_step);
        full += 1;
    }

    let remainder = section - sign * full as f64 * max_step;
    if remainder.abs() > max_step * SLIVER_RATIO || segments.len() == leg_start {
        segments.push(remainder);
    } else if let Some(last) = segments.last_mut() {
        *last += remainder;
    }
}

/// Signed net distance of every leg of `targets`.
pub fn leg_distances(targets: &[f64]) -> Vec<f64> {
    let mut previous = 0.0_f64;
    targets
        .iter()
        .map(|&target| {
            let section = target - previous;
            previous = target;
            section
        })
        .collect()
}
