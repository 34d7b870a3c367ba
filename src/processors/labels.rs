//! Label reduction for datasets where class 0 means "background".

use crate::core::{IGNORE_LABEL, LabelMap};

/// Shifts all class ids down by one and marks background pixels as ignored.
///
/// Background (`0`) becomes [`IGNORE_LABEL`], every other id `k` becomes
/// `k - 1`. A pixel that was already `255` would land on `254` and is mapped
/// back to `255` so the ignore marker survives the shift.
pub fn reduce_zero_label(map: &LabelMap) -> LabelMap {
    map.mapv(|label| {
        let label = if label == 0 { IGNORE_LABEL } else { label };
        let shifted = label - 1;
        if shifted == IGNORE_LABEL - 1 {
            IGNORE_LABEL
        } else {
            shifted
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_reduce_zero_label_mapping() {
        let map = array![[0, 1, 2], [150, 255, 254]];
        let reduced = reduce_zero_label(&map);
        assert_eq!(reduced, array![[255, 0, 1], [149, 255, 253]]);
    }

    #[test]
    fn test_reduce_zero_label_keeps_shape() {
        let map = LabelMap::from_elem((4, 7), 3);
        let reduced = reduce_zero_label(&map);
        assert_eq!(reduced.dim(), (4, 7));
        assert!(reduced.iter().all(|&v| v == 2));
    }
}
