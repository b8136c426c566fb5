use crate::protocol::{Error, Result};

/// Occupancy grid with the snapshot last delivered to the server.
///
/// The first send carries the full grid. After that only indices whose value
/// differs from the delivered snapshot are sent; the diff is recomputed
/// lazily, so any number of updates between sends collapse into one.
#[derive(Debug, Clone)]
pub(crate) struct OccupancyTracker {
    current: Vec<bool>,
    sent: Vec<bool>,
    full_sent: bool,
    changed: Vec<u32>,
    stale: bool,
}

impl OccupancyTracker {
    pub(crate) fn new(cells: usize) -> Self {
        Self::with_grid(vec![false; cells])
    }

    pub(crate) fn with_grid(grid: Vec<bool>) -> Self {
        Self {
            sent: vec![false; grid.len()],
            current: grid,
            full_sent: false,
            changed: Vec::new(),
            stale: false,
        }
    }

    pub(crate) fn current(&self) -> &[bool] {
        &self.current
    }

    pub(crate) const fn full_sent(&self) -> bool {
        self.full_sent
    }

    /// Replace the grid. The length must match the cell count.
    pub(crate) fn update(&mut self, grid: Vec<bool>) -> Result<()> {
        if grid.len() != self.current.len() {
            return Err(Error::SizeMismatch {
                what: "occupancy",
                expected: self.current.len(),
                got: grid.len(),
            });
        }
        self.current = grid;
        self.stale = true;
        Ok(())
    }

    /// Indices changed since the delivered snapshot; empty before the first full send.
    pub(crate) fn changed(&mut self) -> &[u32] {
        if self.stale && self.full_sent {
            self.changed.clear();
            self.changed.extend(
                self.current
                    .iter()
                    .zip(&self.sent)
                    .enumerate()
                    .filter(|(_, (now, then))| now != then)
                    .filter_map(|(index, _)| u32::try_from(index).ok()),
            );
        }
        self.stale = false;
        &self.changed
    }

    /// Diff as last computed by [`Self::changed`].
    pub(crate) fn pending_changes(&self) -> &[u32] {
        &self.changed
    }

    /// The full grid reached the server.
    pub(crate) fn commit_full(&mut self) {
        self.sent.clone_from(&self.current);
        self.full_sent = true;
        self.changed.clear();
        self.stale = false;
    }

    /// The pending diff reached the server.
    pub(crate) fn commit_changes(&mut self) {
        for &index in &self.changed {
            let index = index as usize;
            self.sent[index] = self.current[index];
        }
        self.changed.clear();
        self.stale = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_no_diff_before_full_send() {
        let mut tracker = OccupancyTracker::new(4);
        let mut grid = vec![false; 4];
        grid[2] = true;
        tracker.update(grid).unwrap();
        assert!(!tracker.full_sent());
        assert!(tracker.changed().is_empty());
    }

    #[test]
    fn test_diff_after_full_send() {
        let mut tracker = OccupancyTracker::new(64);
        tracker.commit_full();

        let mut grid = vec![false; 64];
        grid[5] = true;
        tracker.update(grid).unwrap();
        assert_eq!(tracker.changed(), &[5]);

        tracker.commit_changes();
        assert!(tracker.changed().is_empty());
    }

    #[test]
    fn test_toggling_back_cancels_change() {
        let mut tracker = OccupancyTracker::new(8);
        tracker.commit_full();

        let mut grid = vec![false; 8];
        grid[1] = true;
        tracker.update(grid.clone()).unwrap();
        grid[1] = false;
        tracker.update(grid).unwrap();
        assert!(tracker.changed().is_empty());
    }

    #[test]
    fn test_rejects_wrong_length() {
        let mut tracker = OccupancyTracker::new(8);
        let err = tracker.update(vec![true; 7]).unwrap_err();
        assert!(matches!(err, Error::SizeMismatch { expected: 8, got: 7, .. }));
        assert_eq!(tracker.current().len(), 8);
    }

    proptest! {
        #[test]
        fn test_diff_is_exact_symmetric_difference(
            pair in (1usize..256).prop_flat_map(|n| {
                (prop::collection::vec(any::<bool>(), n), prop::collection::vec(any::<bool>(), n))
            })
        ) {
            let (a, b) = pair;
            let mut tracker = OccupancyTracker::with_grid(a.clone());
            tracker.commit_full();
            tracker.update(b.clone()).unwrap();

            let expected: Vec<u32> = (0..a.len())
                .filter(|&i| a[i] != b[i])
                .map(|i| i as u32)
                .collect();
            prop_assert_eq!(tracker.changed(), expected.as_slice());

            tracker.commit_changes();
            prop_assert!(tracker.changed().is_empty());
        }
    }
}
