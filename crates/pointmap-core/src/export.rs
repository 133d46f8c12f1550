//! Export of the point sequence to portable JSON

use crate::store::Point;

/// Serialize the ordered point sequence to pretty-printed JSON, the form the
/// export button places on the clipboard.
pub fn points_to_json(points: &[Point]) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(points)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::PointStore;

    #[test]
    fn test_empty_store_exports_empty_array() {
        let store = PointStore::new();
        assert_eq!(points_to_json(store.points()).unwrap(), "[]");
    }

    #[test]
    fn test_export_preserves_order_and_fields() {
        let mut store = PointStore::new();
        store.add([1.0, 2.0, 3.0], "hinge", "left door hinge");
        store.add([4.0, 5.0, 6.0], "vent", "rear vent");

        let json = points_to_json(store.points()).unwrap();
        let parsed: Vec<Point> = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, store.points());
        assert!(json.find("hinge").unwrap() < json.find("vent").unwrap());
    }
}
