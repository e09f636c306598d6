//! Neighbor-kernel-weighted aggregate of activity.

use crate::grid::NeighborList;

use super::Activity;

/// Superactivity of the cell owning `neighbors`.
///
/// - Own term: `w0.pos * pos + w0.neg * neg` when the cell holds memories,
///   otherwise the empty-cell baseline `w0.pos * (k2 - k0)`.
/// - Every other listed neighbor adds `w.pos * pos + w.neg * neg` only when
///   it holds memories. Empty neighbors add nothing; only the cell itself
///   gets the baseline.
///
/// `activity_of` must already hold the activity of every listed neighbor.
/// Returns `None` for a cell outside the working region (empty list).
pub fn compute<F>(neighbors: &NeighborList, activity_of: F, k0: f32, k2: f32) -> Option<f32>
where
    F: Fn(usize) -> Activity,
{
    let own = neighbors.own()?;
    let own_activity = activity_of(own.cell);

    let mut total = if own_activity.count > 0 {
        own.pos * own_activity.pos + own.neg * own_activity.neg
    } else {
        own.pos * (k2 - k0)
    };

    for n in neighbors.others() {
        let a = activity_of(n.cell);
        if a.count > 0 {
            total += n.pos * a.pos + n.neg * a.neg;
        }
    }
    Some(total)
}
