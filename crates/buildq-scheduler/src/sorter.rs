//! Target-switch-minimizing ordering of queued requests.
//!
//! The ordering is greedy: requests that run on the active target (or have no
//! preference) go first, the rest are grouped by target. It does not try to
//! find the cheapest order between the remaining groups.

use crate::queue::JobRequest;
use buildq_core::TargetId;
use std::cmp::Ordering;

/// Compare two requests given the currently active target.
pub fn compare(a: &JobRequest, b: &JobRequest, active: &TargetId) -> Ordering {
    if a.required_target == b.required_target {
        return Ordering::Equal;
    }

    match (a.runs_on(active), b.runs_on(active)) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        // Both need a switch, so both carry a target.
        (false, false) => a.required_target.cmp(&b.required_target),
    }
}

/// Sort requests in place. The sort is stable, so requests that compare equal
/// keep their submission order.
pub fn sort_for_target(requests: &mut [JobRequest], active: &TargetId) {
    requests.sort_by(|a, b| compare(a, b, active));
}

/// Number of target switches needed to run unfinished `requests` in order
/// starting from `active`, including the switch back at the end.
pub fn count_switches(requests: &[JobRequest], active: &TargetId) -> usize {
    let mut current = active;
    let mut switches = 0;

    for request in requests.iter().filter(|r| !r.finished) {
        if let Some(required) = &request.required_target {
            if required != current {
                switches += 1;
                current = required;
            }
        }
    }

    if current != active {
        switches += 1;
    }

    switches
}
