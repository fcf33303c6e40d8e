//! Fold parsed samples into a [`DashboardState`].

use crate::families::MetricFamilies;
use crate::types::{DashboardState, Sample};

/// Aggregate samples into the dashboard snapshot.
///
/// Request samples are summed by status label, so the counts do not depend
/// on sample order. Gauges are point-in-time: the last matching sample in
/// iteration order wins. Samples from any other family, or requests with a
/// status the dashboard does not surface, contribute nothing.
pub fn aggregate<'a, I>(samples: I, families: &MetricFamilies) -> DashboardState
where
    I: IntoIterator<Item = &'a Sample>,
{
    let mut state = DashboardState::default();

    for sample in samples {
        if sample.name == families.requests {
            match sample.label(&families.status_label) {
                Some(status) if status == families.honest_status => {
                    state.honest_count += sample.value;
                }
                Some(status) if status == families.deceptive_status => {
                    state.deceptive_count += sample.value;
                }
                _ => {}
            }
        } else if sample.name == families.active_sessions {
            state.active_sessions = sample.value;
        } else if sample.name == families.crypto_errors {
            state.crypto_errors = sample.value;
        }
    }

    state
}
