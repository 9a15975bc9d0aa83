//! Detection of disconnected and degenerate object regions.
//!
//! An object whose pixels form more than one 8-connected group is a mask
//! defect ("disconnected region"). Objects with very few pixels are usually
//! segmentation noise ("dead pixels"). Both are reported with one centroid
//! per connected component so a reviewer can jump to each part.

use std::collections::BTreeMap;

use ndarray::Array2;

use crate::constants::DEFAULT_DEAD_PIXEL_THRESHOLD;
use crate::data::LabelMask;
use crate::model::{DecisionState, ObjectId};
use crate::review::AnnotationLedger;

/// 8-connectivity neighbourhood as (row, col) offsets.
const NEIGHBOURS: [(isize, isize); 8] = [
    (-1, 0),
    (1, 0),
    (0, -1),
    (0, 1),
    (-1, -1),
    (-1, 1),
    (1, -1),
    (1, 1),
];

/// One 8-connected group of cells sharing an object id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Component {
    /// Object id of the component's cells.
    pub object_id: ObjectId,
    /// Number of cells in the component.
    pub pixel_count: u64,
    /// Representative point `(x, y)`, always a member cell.
    pub centroid: (usize, usize),
}

/// Defect summary for one object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionDefect {
    /// Number of connected components, at least 1.
    pub component_count: usize,
    /// One `(x, y)` point per component, in component-label order.
    pub centroids: Vec<(usize, usize)>,
    /// Total pixels of the object.
    pub pixel_count: u64,
    /// Whether the object is at or below the dead-pixel threshold.
    pub dead_pixel: bool,
}

impl RegionDefect {
    /// Whether the object is split into several regions.
    pub fn is_disconnected(&self) -> bool {
        self.component_count > 1
    }

    /// Reviewer-facing explanation, used as the ledger note.
    pub fn describe(&self) -> String {
        let mut reasons = Vec::new();
        if self.is_disconnected() {
            reasons.push(format!(
                "disconnected region: {} parts",
                self.component_count
            ));
        }
        if self.dead_pixel {
            reasons.push(format!("dead pixel: {} pixels", self.pixel_count));
        }
        reasons.join("; ")
    }
}

/// Objects flagged by [`RegionConnectivityAnalyzer`], keyed by id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectivityReport {
    entries: BTreeMap<ObjectId, RegionDefect>,
}

impl ConnectivityReport {
    /// Defect entry for `id`, if flagged.
    pub fn get(&self, id: ObjectId) -> Option<&RegionDefect> {
        self.entries.get(&id)
    }

    /// Flagged objects in ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = (ObjectId, &RegionDefect)> {
        self.entries.iter().map(|(&id, defect)| (id, defect))
    }

    /// Number of flagged objects.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing was flagged.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Ids whose pixels form several regions.
    pub fn disconnected_ids(&self) -> Vec<ObjectId> {
        self.iter()
            .filter(|(_, d)| d.is_disconnected())
            .map(|(id, _)| id)
            .collect()
    }

    /// Ids at or below the dead-pixel threshold.
    pub fn dead_pixel_ids(&self) -> Vec<ObjectId> {
        self.iter()
            .filter(|(_, d)| d.dead_pixel)
            .map(|(id, _)| id)
            .collect()
    }

    /// Pre-populate `ledger` with a "No" decision for every flagged object
    /// that has not been decided yet. Returns how many objects were flagged.
    pub fn flag_into(&self, ledger: &mut AnnotationLedger) -> usize {
        let mut flagged = 0;
        for (id, defect) in self.iter() {
            if ledger.state_of(id).is_decided() {
                continue;
            }
            ledger.record_decision(id, DecisionState::No, defect.describe());
            flagged += 1;
        }
        log::info!("Pre-flagged {} defective objects", flagged);
        flagged
    }
}

/// Connected-component analysis over a label mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegionConnectivityAnalyzer {
    dead_pixel_threshold: u64,
}

impl Default for RegionConnectivityAnalyzer {
    fn default() -> Self {
        Self::new(DEFAULT_DEAD_PIXEL_THRESHOLD)
    }
}

impl RegionConnectivityAnalyzer {
    /// Analyzer flagging objects with at most `dead_pixel_threshold` pixels.
    pub fn new(dead_pixel_threshold: u64) -> Self {
        Self {
            dead_pixel_threshold,
        }
    }

    /// Label every 8-connected component of `mask`.
    ///
    /// Returns the component label grid (0 for background, labels start at
    /// 1 and follow raster scan order) and one [`Component`] per label.
    pub fn label_components(&self, mask: &LabelMask) -> (Array2<u32>, Vec<Component>) {
        let cells = mask.view();
        let (height, width) = cells.dim();
        let mut labels = Array2::<u32>::zeros((height, width));
        let mut components = Vec::new();

        let mut stack: Vec<(usize, usize)> = Vec::new();
        let mut members: Vec<(usize, usize)> = Vec::new();

        for row in 0..height {
            for col in 0..width {
                let id = cells[(row, col)];
                if id == 0 || labels[(row, col)] != 0 {
                    continue;
                }

                let label = components.len() as u32 + 1;
                labels[(row, col)] = label;
                stack.push((row, col));
                members.clear();
                members.push((row, col));

                while let Some((r, c)) = stack.pop() {
                    for (dr, dc) in NEIGHBOURS {
                        let (Some(nr), Some(nc)) =
                            (r.checked_add_signed(dr), c.checked_add_signed(dc))
                        else {
                            continue;
                        };
                        if nr >= height || nc >= width {
                            continue;
                        }
                        if labels[(nr, nc)] == 0 && cells[(nr, nc)] == id {
                            labels[(nr, nc)] = label;
                            stack.push((nr, nc));
                            members.push((nr, nc));
                        }
                    }
                }

                components.push(Component {
                    object_id: id,
                    pixel_count: members.len() as u64,
                    centroid: snapped_centroid(&members),
                });
            }
        }

        (labels, components)
    }

    /// Find disconnected and dead-pixel objects in `mask`.
    pub fn analyze(&self, mask: &LabelMask) -> ConnectivityReport {
        let (_, components) = self.label_components(mask);

        let mut by_object: BTreeMap<ObjectId, RegionDefect> = BTreeMap::new();
        for component in &components {
            let entry = by_object
                .entry(component.object_id)
                .or_insert_with(|| RegionDefect {
                    component_count: 0,
                    centroids: Vec::new(),
                    pixel_count: 0,
                    dead_pixel: false,
                });
            entry.component_count += 1;
            entry.centroids.push(component.centroid);
            entry.pixel_count += component.pixel_count;
        }

        let entries: BTreeMap<ObjectId, RegionDefect> = by_object
            .into_iter()
            .filter_map(|(id, mut defect)| {
                defect.dead_pixel = defect.pixel_count <= self.dead_pixel_threshold;
                (defect.is_disconnected() || defect.dead_pixel).then_some((id, defect))
            })
            .collect();

        log::debug!(
            "Connectivity analysis: {} components, {} flagged objects",
            components.len(),
            entries.len()
        );
        ConnectivityReport { entries }
    }
}

/// Rounded mean of `members`, moved to the nearest member cell.
///
/// Ties keep the member that was labeled first. Returned as `(x, y)`.
fn snapped_centroid(members: &[(usize, usize)]) -> (usize, usize) {
    let n = members.len() as f64;
    let (sum_row, sum_col) = members
        .iter()
        .fold((0.0, 0.0), |(sr, sc), &(r, c)| (sr + r as f64, sc + c as f64));
    let mean_row = (sum_row / n).round();
    let mean_col = (sum_col / n).round();

    let mut best = members[0];
    let mut best_dist = f64::INFINITY;
    for &(r, c) in members {
        let dr = r as f64 - mean_row;
        let dc = c as f64 - mean_col;
        let dist = dr * dr + dc * dc;
        if dist < best_dist {
            best_dist = dist;
            best = (r, c);
        }
    }
    (best.1, best.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// One id drawn as two 3x3 blocks separated by background.
    fn split_mask() -> LabelMask {
        let mut rows = vec![vec![0u32; 9]; 5];
        for r in 1..4 {
            for c in 0..3 {
                rows[r][c] = 7;
            }
            for c in 6..9 {
                rows[r][c] = 7;
            }
        }
        LabelMask::from_rows(&rows).unwrap()
    }

    #[test]
    fn test_two_blocks_are_two_components() {
        let mask = split_mask();
        let report = RegionConnectivityAnalyzer::new(0).analyze(&mask);
        let defect = report.get(7).expect("split object must be reported");

        assert_eq!(defect.component_count, 2);
        assert_eq!(defect.centroids.len(), 2);
        assert_eq!(defect.centroids[0], (1, 2));
        assert_eq!(defect.centroids[1], (7, 2));
        for &(x, y) in &defect.centroids {
            assert_eq!(mask.get(y, x), Some(7));
        }
        assert!(defect.centroids[0].0 < 3);
        assert!(defect.centroids[1].0 >= 6);
    }

    #[test]
    fn test_contiguous_block_not_reported() {
        let mask = LabelMask::from_rows(&[
            [0, 0, 0, 0],
            [0, 3, 3, 3],
            [0, 3, 3, 3],
            [0, 3, 3, 3],
            [0, 3, 3, 3],
        ])
        .unwrap();
        let report = RegionConnectivityAnalyzer::default().analyze(&mask);
        assert!(report.is_empty());
    }

    #[test]
    fn test_small_object_is_dead_pixel() {
        let mask = LabelMask::from_rows(&[[0, 4, 4], [0, 0, 0]]).unwrap();
        let report = RegionConnectivityAnalyzer::default().analyze(&mask);
        let defect = report.get(4).unwrap();
        assert!(defect.dead_pixel);
        assert!(!defect.is_disconnected());
        assert_eq!(report.dead_pixel_ids(), vec![4]);
        assert!(report.disconnected_ids().is_empty());
    }

    #[test]
    fn test_diagonal_touch_is_connected() {
        let mask = LabelMask::from_rows(&[[5, 0], [0, 5]]).unwrap();
        let (labels, components) = RegionConnectivityAnalyzer::new(0).label_components(&mask);
        assert_eq!(components.len(), 1);
        assert_eq!(labels[(0, 0)], labels[(1, 1)]);
    }

    #[test]
    fn test_touching_ids_stay_separate() {
        let mask = LabelMask::from_rows(&[[1, 1, 2, 2]]).unwrap();
        let (labels, components) = RegionConnectivityAnalyzer::new(0).label_components(&mask);
        assert_eq!(components.len(), 2);
        assert_eq!(labels.row(0).to_vec(), vec![1, 1, 2, 2]);
    }

    #[test]
    fn test_centroid_snaps_into_ring() {
        // Mean of a ring lies in its hole; the snapped point must not.
        let mask = LabelMask::from_rows(&[[9, 9, 9], [9, 0, 9], [9, 9, 9]]).unwrap();
        let (_, components) = RegionConnectivityAnalyzer::new(0).label_components(&mask);
        let (x, y) = components[0].centroid;
        assert_eq!(mask.get(y, x), Some(9));
    }

    #[test]
    fn test_large_region_does_not_overflow_stack() {
        let mask = LabelMask::new(Array2::from_elem((512, 512), 1));
        let (_, components) = RegionConnectivityAnalyzer::default().label_components(&mask);
        assert_eq!(components.len(), 1);
        assert_eq!(components[0].pixel_count, 512 * 512);
    }

    #[test]
    fn test_flag_into_skips_decided_objects() {
        let mask = LabelMask::from_rows(&[[1, 0, 1, 0, 2, 0, 3]]).unwrap();
        let report = RegionConnectivityAnalyzer::default().analyze(&mask);
        let mut ledger = AnnotationLedger::new();
        ledger.record_decision(2, DecisionState::Yes, "");

        let flagged = report.flag_into(&mut ledger);

        assert_eq!(flagged, 2);
        assert_eq!(ledger.state_of(1), DecisionState::No);
        assert_eq!(ledger.state_of(2), DecisionState::Yes);
        assert_eq!(ledger.state_of(3), DecisionState::No);
        assert!(ledger.note_of(1).unwrap().contains("disconnected region: 2 parts"));
        assert!(ledger.note_of(3).unwrap().contains("dead pixel: 1 pixels"));
    }
}
