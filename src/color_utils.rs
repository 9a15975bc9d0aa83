//! Color utility functions shared across the review engine.
//!
//! Object colors come from a generator seeded with the object id, so the same
//! mask always renders with the same palette, in every session.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::model::ObjectId;

/// Marker color for objects accepted by the reviewer.
pub const ACCEPTED_MARKER: [u8; 3] = [0, 128, 0];

/// Marker color for objects rejected by the reviewer.
pub const REJECTED_MARKER: [u8; 3] = [255, 0, 0];

/// Deterministic RGB color for an object id.
///
/// Two distinct ids may map to the same color; the palette exists for visual
/// separation only.
pub fn object_color(id: ObjectId) -> [u8; 3] {
    let mut rng = StdRng::seed_from_u64(u64::from(id));
    [rng.random(), rng.random(), rng.random()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_color_is_stable() {
        assert_eq!(object_color(7), object_color(7));
        assert_eq!(object_color(123_456), object_color(123_456));
    }

    #[test]
    fn test_object_color_varies_between_ids() {
        let colors: Vec<[u8; 3]> = (1..=16).map(object_color).collect();
        let distinct = colors
            .iter()
            .filter(|c| **c != colors[0])
            .count();
        assert!(distinct > 0);
    }
}
