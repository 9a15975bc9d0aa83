//! Per-object metadata derived from a label mask.

use std::collections::BTreeMap;
use std::ops::RangeInclusive;

use thiserror::Error;

use crate::color_utils::object_color;
use crate::data::LabelMask;

/// Identifier of an object in a label mask. `0` is reserved for background.
pub type ObjectId = u32;

/// Tight, inclusive rectangle around an object's cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundingBox {
    /// First row containing the object.
    pub min_row: usize,
    /// Last row containing the object.
    pub max_row: usize,
    /// First column containing the object.
    pub min_col: usize,
    /// Last column containing the object.
    pub max_col: usize,
}

impl BoundingBox {
    /// Box covering a single cell.
    pub fn at(row: usize, col: usize) -> Self {
        Self {
            min_row: row,
            max_row: row,
            min_col: col,
            max_col: col,
        }
    }

    /// Grow the box so it covers `(row, col)`.
    pub fn include(&mut self, row: usize, col: usize) {
        self.min_row = self.min_row.min(row);
        self.max_row = self.max_row.max(row);
        self.min_col = self.min_col.min(col);
        self.max_col = self.max_col.max(col);
    }

    /// Row span.
    pub fn rows(&self) -> RangeInclusive<usize> {
        self.min_row..=self.max_row
    }

    /// Column span.
    pub fn cols(&self) -> RangeInclusive<usize> {
        self.min_col..=self.max_col
    }

    /// Number of columns covered.
    pub fn width(&self) -> usize {
        self.max_col - self.min_col + 1
    }

    /// Number of rows covered.
    pub fn height(&self) -> usize {
        self.max_row - self.min_row + 1
    }

    /// Check if a cell lies inside the box.
    pub fn contains(&self, row: usize, col: usize) -> bool {
        self.rows().contains(&row) && self.cols().contains(&col)
    }
}

/// Metadata for one object of a mask.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectRecord {
    /// Mask value of the object.
    pub id: ObjectId,
    /// Number of cells holding `id`. Always greater than zero.
    pub pixel_count: u64,
    /// Display color, derived from `id` alone (see [`object_color`]), so the
    /// same object is drawn identically across sessions.
    pub color: [u8; 3],
    /// Tight rectangle around the object's cells.
    pub bounding_box: Option<BoundingBox>,
}

impl ObjectRecord {
    /// Text shown for this object in an object list.
    pub fn list_label(&self) -> String {
        format!("Object {}: {} pixels", self.id, self.pixel_count)
    }
}

/// Errors raised while extracting objects.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    /// The mask holds no nonzero value.
    #[error("Mask contains no objects")]
    EmptyMask,
}

/// Ascending-by-id sequence of the objects of a mask.
///
/// The position of a record is its object index, used for next/previous
/// navigation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectRegistry {
    records: Vec<ObjectRecord>,
}

impl ObjectRegistry {
    /// Registry without objects.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Extract every object of `mask` in one pass.
    pub fn from_mask(mask: &LabelMask) -> Result<Self, RegistryError> {
        let mut stats: BTreeMap<ObjectId, (u64, BoundingBox)> = BTreeMap::new();

        for ((row, col), &id) in mask.view().indexed_iter() {
            if id == 0 {
                continue;
            }
            stats
                .entry(id)
                .and_modify(|(count, bbox)| {
                    *count += 1;
                    bbox.include(row, col);
                })
                .or_insert((1, BoundingBox::at(row, col)));
        }

        if stats.is_empty() {
            return Err(RegistryError::EmptyMask);
        }

        let records: Vec<ObjectRecord> = stats
            .into_iter()
            .map(|(id, (pixel_count, bbox))| ObjectRecord {
                id,
                pixel_count,
                color: object_color(id),
                bounding_box: Some(bbox),
            })
            .collect();

        log::debug!("Extracted {} objects from mask", records.len());
        Ok(Self { records })
    }

    /// Number of objects.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the registry holds no objects.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// All records in ascending id order.
    pub fn records(&self) -> &[ObjectRecord] {
        &self.records
    }

    /// Ids in ascending order.
    pub fn ids(&self) -> impl Iterator<Item = ObjectId> + '_ {
        self.records.iter().map(|r| r.id)
    }

    /// Object index of `id`.
    pub fn index_of(&self, id: ObjectId) -> Option<usize> {
        self.records.binary_search_by_key(&id, |r| r.id).ok()
    }

    /// Record for `id`.
    pub fn get(&self, id: ObjectId) -> Option<&ObjectRecord> {
        self.index_of(id).map(|i| &self.records[i])
    }

    /// Record at an object index.
    pub fn by_index(&self, index: usize) -> Option<&ObjectRecord> {
        self.records.get(index)
    }

    /// Check if `id` is a known object.
    pub fn contains(&self, id: ObjectId) -> bool {
        self.index_of(id).is_some()
    }

    /// Pixel count of `id`, 0 for unknown ids.
    pub fn pixel_count(&self, id: ObjectId) -> u64 {
        self.get(id).map_or(0, |r| r.pixel_count)
    }

    /// Bounding box of `id`, `None` if the id is unknown.
    pub fn bounding_box_of(&self, id: ObjectId) -> Option<BoundingBox> {
        self.get(id).and_then(|r| r.bounding_box)
    }

    /// Sum of all object pixel counts.
    pub fn total_pixels(&self) -> u64 {
        self.records.iter().map(|r| r.pixel_count).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_mask() -> LabelMask {
        LabelMask::from_rows(&[
            [0, 0, 9, 9, 0],
            [2, 0, 9, 0, 0],
            [2, 2, 0, 0, 40],
            [0, 0, 0, 40, 40],
        ])
        .unwrap()
    }

    #[test]
    fn test_ids_strictly_ascending() {
        let registry = ObjectRegistry::from_mask(&sample_mask()).unwrap();
        let ids: Vec<ObjectId> = registry.ids().collect();
        assert_eq!(ids, vec![2, 9, 40]);
        assert!(ids.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_pixel_counts_cover_mask() {
        let mask = sample_mask();
        let registry = ObjectRegistry::from_mask(&mask).unwrap();
        assert_eq!(registry.pixel_count(2), 3);
        assert_eq!(registry.pixel_count(9), 3);
        assert_eq!(registry.pixel_count(40), 3);
        assert_eq!(
            registry.total_pixels() + mask.background_count(),
            mask.len() as u64
        );
    }

    #[test]
    fn test_bounding_boxes() {
        let registry = ObjectRegistry::from_mask(&sample_mask()).unwrap();
        let bbox = registry.bounding_box_of(40).unwrap();
        assert_eq!(bbox.rows(), 2..=3);
        assert_eq!(bbox.cols(), 3..=4);
        assert_eq!(bbox.width(), 2);
        assert_eq!(bbox.height(), 2);
        assert!(registry.bounding_box_of(7).is_none());
    }

    #[test]
    fn test_empty_mask_is_error() {
        let mask = LabelMask::from_rows(&[[0, 0], [0, 0]]).unwrap();
        assert_eq!(ObjectRegistry::from_mask(&mask), Err(RegistryError::EmptyMask));
    }

    #[test]
    fn test_lookup_by_index_and_id() {
        let registry = ObjectRegistry::from_mask(&sample_mask()).unwrap();
        assert_eq!(registry.index_of(9), Some(1));
        assert_eq!(registry.by_index(2).map(|r| r.id), Some(40));
        assert!(registry.contains(2));
        assert!(!registry.contains(3));
        assert_eq!(registry.pixel_count(3), 0);
    }

    #[test]
    fn test_colors_match_policy() {
        let registry = ObjectRegistry::from_mask(&sample_mask()).unwrap();
        for record in registry.records() {
            assert_eq!(record.color, object_color(record.id));
        }
    }

    #[test]
    fn test_list_label() {
        let registry = ObjectRegistry::from_mask(&sample_mask()).unwrap();
        assert_eq!(registry.get(9).unwrap().list_label(), "Object 9: 3 pixels");
    }
}
