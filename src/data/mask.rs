//! Immutable raster of object identifiers.

use ndarray::{Array2, ArrayView2};

use crate::model::{BoundingBox, ObjectId};

use super::loader::LoaderError;

/// H×W grid of object ids, `0` being background.
///
/// Cells are stored row-major and indexed `[row, col]`. A mask is read-only
/// once constructed; sessions share it with the overlay worker behind an
/// `Arc`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelMask {
    cells: Array2<u32>,
}

impl LabelMask {
    /// Wrap an existing id array.
    pub fn new(cells: Array2<u32>) -> Self {
        Self { cells }
    }

    /// Build a mask from row-major cell values.
    pub fn from_vec(height: usize, width: usize, cells: Vec<u32>) -> Result<Self, LoaderError> {
        let cells = Array2::from_shape_vec((height, width), cells).map_err(|e| {
            LoaderError::Shape {
                message: format!("{}x{} mask: {}", width, height, e),
            }
        })?;
        Ok(Self { cells })
    }

    /// Build a mask from nested rows. Convenient for small fixtures.
    pub fn from_rows<R: AsRef<[u32]>>(rows: &[R]) -> Result<Self, LoaderError> {
        let height = rows.len();
        let width = rows.first().map_or(0, |r| r.as_ref().len());
        if let Some(bad) = rows.iter().position(|r| r.as_ref().len() != width) {
            return Err(LoaderError::Shape {
                message: format!("row {} has a different length than row 0", bad),
            });
        }
        let cells = rows
            .iter()
            .flat_map(|r| r.as_ref().iter().copied())
            .collect();
        Self::from_vec(height, width, cells)
    }

    /// Number of rows.
    pub fn height(&self) -> usize {
        self.cells.nrows()
    }

    /// Number of columns.
    pub fn width(&self) -> usize {
        self.cells.ncols()
    }

    /// Total number of cells (H×W).
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Whether the mask has no cells at all.
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Read-only view of the id array.
    pub fn view(&self) -> ArrayView2<'_, u32> {
        self.cells.view()
    }

    /// Cell value at `(row, col)`, or `None` outside the grid.
    pub fn get(&self, row: usize, col: usize) -> Option<u32> {
        self.cells.get((row, col)).copied()
    }

    /// Object under a (possibly off-grid) coordinate.
    ///
    /// Returns `None` for background cells and for coordinates outside the
    /// mask, including negative ones coming from pointer positions.
    pub fn object_at(&self, row: i64, col: i64) -> Option<ObjectId> {
        let row = usize::try_from(row).ok()?;
        let col = usize::try_from(col).ok()?;
        self.get(row, col).filter(|&id| id != 0)
    }

    /// Number of background cells.
    pub fn background_count(&self) -> u64 {
        self.cells.iter().filter(|&&v| v == 0).count() as u64
    }

    /// Tight bounding box of `id`, recomputed from the raster.
    ///
    /// Returns `None` when the id does not occur (including id 0).
    pub fn bounding_box_of(&self, id: ObjectId) -> Option<BoundingBox> {
        if id == 0 {
            return None;
        }
        let mut bbox: Option<BoundingBox> = None;
        for ((row, col), &value) in self.cells.indexed_iter() {
            if value != id {
                continue;
            }
            match bbox.as_mut() {
                Some(b) => b.include(row, col),
                None => bbox = Some(BoundingBox::at(row, col)),
            }
        }
        bbox
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_mask() -> LabelMask {
        LabelMask::from_rows(&[[0, 0, 3, 3], [0, 5, 3, 0], [5, 5, 0, 0]]).unwrap()
    }

    #[test]
    fn test_dimensions() {
        let mask = sample_mask();
        assert_eq!(mask.height(), 3);
        assert_eq!(mask.width(), 4);
        assert_eq!(mask.len(), 12);
    }

    #[test]
    fn test_from_vec_rejects_bad_shape() {
        assert!(LabelMask::from_vec(2, 3, vec![0; 5]).is_err());
    }

    #[test]
    fn test_from_rows_rejects_ragged_rows() {
        let rows: Vec<Vec<u32>> = vec![vec![0, 1], vec![1]];
        assert!(LabelMask::from_rows(&rows).is_err());
    }

    #[test]
    fn test_object_at_handles_background_and_off_grid() {
        let mask = sample_mask();
        assert_eq!(mask.object_at(0, 2), Some(3));
        assert_eq!(mask.object_at(0, 0), None);
        assert_eq!(mask.object_at(-1, 0), None);
        assert_eq!(mask.object_at(0, 4), None);
        assert_eq!(mask.object_at(3, 0), None);
    }

    #[test]
    fn test_bounding_box_of() {
        let mask = sample_mask();
        let bbox = mask.bounding_box_of(5).unwrap();
        assert_eq!(
            bbox,
            BoundingBox {
                min_row: 1,
                max_row: 2,
                min_col: 0,
                max_col: 1
            }
        );
        assert!(mask.bounding_box_of(42).is_none());
        assert!(mask.bounding_box_of(0).is_none());
    }

    #[test]
    fn test_background_count() {
        assert_eq!(sample_mask().background_count(), 6);
    }
}
