//! Field visit masking

use crate::models::{Flag, Reading, VisitWindow};
use tracing::info;

/// Flag readings handled during field visits as `Visit`
///
/// The current window overrides every flag, `Missing` included. The previous
/// window leaves `Missing` rows alone. Returns the number of rows flagged.
pub fn apply_visits(
    readings: &mut [Reading],
    current: Option<&VisitWindow>,
    previous: Option<&VisitWindow>,
) -> usize {
    let mut flagged = 0;

    for reading in readings.iter_mut() {
        let in_current = current.is_some_and(|w| w.contains(reading.timestamp));
        let in_previous = previous.is_some_and(|w| w.contains(reading.timestamp))
            && reading.flag != Flag::Missing;

        if in_current || in_previous {
            reading.flag = Flag::Visit;
            flagged += 1;
        }
    }

    if let Some(window) = current {
        info!("Current visit {} to {}", window.start, window.end);
    }
    if let Some(window) = previous {
        info!("Previous visit {} to {}", window.start, window.end);
    }
    info!("Flagged {} readings as field visit", flagged);

    flagged
}
