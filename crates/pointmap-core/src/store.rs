//! The ordered collection of annotated points

use serde::{Deserialize, Serialize};

/// A named annotation anchored to a position on the model surface
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// 1-based rank of the point in the store. Renumbered on every delete so
    /// ids always form the contiguous range 1..=N.
    pub id: u32,
    /// Anchor position in model space, captured from a raycast hit
    pub position: [f32; 3],
    pub name: String,
    pub description: String,
}

/// Ordered point store. Single-writer; ids double as display rank.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PointStore {
    points: Vec<Point>,
}

impl PointStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a new point with the next id (`current count + 1`).
    /// Returns the assigned id.
    pub fn add(
        &mut self,
        position: [f32; 3],
        name: impl Into<String>,
        description: impl Into<String>,
    ) -> u32 {
        let id = self.points.len() as u32 + 1;
        self.points.push(Point {
            id,
            position,
            name: name.into(),
            description: description.into(),
        });
        tracing::debug!(id, "point added");
        id
    }

    /// Replace name and description of the matching record, preserving its id
    /// and position. Unknown ids are ignored.
    pub fn update(&mut self, id: u32, name: impl Into<String>, description: impl Into<String>) {
        match self.points.iter_mut().find(|p| p.id == id) {
            Some(point) => {
                point.name = name.into();
                point.description = description.into();
            }
            None => tracing::debug!(id, "update for unknown point id ignored"),
        }
    }

    /// Delete the matching record and renumber the remaining points to their
    /// 1-based rank in the surviving order. Unknown ids are ignored.
    pub fn remove(&mut self, id: u32) {
        let before = self.points.len();
        self.points.retain(|p| p.id != id);
        if self.points.len() == before {
            tracing::debug!(id, "remove for unknown point id ignored");
            return;
        }
        for (index, point) in self.points.iter_mut().enumerate() {
            point.id = index as u32 + 1;
        }
        tracing::debug!(id, remaining = self.points.len(), "point removed");
    }

    /// The full ordered record sequence.
    pub fn points(&self) -> &[Point] {
        &self.points
    }

    pub fn get(&self, id: u32) -> Option<&Point> {
        self.points.iter().find(|p| p.id == id)
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_assigns_sequential_ids() {
        let mut store = PointStore::new();
        assert_eq!(store.add([0.0, 0.0, 0.0], "A", "first"), 1);
        assert_eq!(store.add([1.0, 0.0, 0.0], "B", "second"), 2);
        assert_eq!(store.add([2.0, 0.0, 0.0], "C", "third"), 3);
    }

    #[test]
    fn test_remove_renumbers_to_contiguous_range() {
        let mut store = PointStore::new();
        for name in ["A", "B", "C", "D"] {
            store.add([0.0, 0.0, 0.0], name, "desc");
        }
        store.remove(2);

        let ids: Vec<u32> = store.points().iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        let names: Vec<&str> = store.points().iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["A", "C", "D"]);
    }

    #[test]
    fn test_remove_first_then_survivor_takes_id_one() {
        let mut store = PointStore::new();
        store.add([0.0, 0.0, 0.0], "A", "first");
        store.add([1.0, 0.0, 0.0], "B", "second");
        store.remove(1);

        assert_eq!(store.len(), 1);
        let survivor = &store.points()[0];
        assert_eq!(survivor.id, 1);
        assert_eq!(survivor.name, "B");
    }

    #[test]
    fn test_ids_stay_contiguous_across_mixed_mutations() {
        let mut store = PointStore::new();
        for i in 0..6 {
            store.add([i as f32, 0.0, 0.0], format!("p{i}"), "desc");
        }
        store.remove(3);
        store.remove(1);
        store.add([9.0, 0.0, 0.0], "late", "desc");
        store.remove(2);

        let ids: Vec<u32> = store.points().iter().map(|p| p.id).collect();
        let expected: Vec<u32> = (1..=store.len() as u32).collect();
        assert_eq!(ids, expected);
    }

    #[test]
    fn test_update_touches_only_matching_record() {
        let mut store = PointStore::new();
        store.add([0.0, 1.0, 2.0], "A", "first");
        store.add([3.0, 4.0, 5.0], "B", "second");
        let untouched = store.points()[1].clone();

        store.update(1, "renamed", "rewritten");

        let updated = &store.points()[0];
        assert_eq!(updated.id, 1);
        assert_eq!(updated.name, "renamed");
        assert_eq!(updated.description, "rewritten");
        assert_eq!(updated.position, [0.0, 1.0, 2.0]);
        assert_eq!(store.points()[1], untouched);
    }

    #[test]
    fn test_update_and_remove_ignore_unknown_ids() {
        let mut store = PointStore::new();
        store.add([0.0, 0.0, 0.0], "A", "first");
        store.update(42, "ghost", "ghost");
        store.remove(42);

        assert_eq!(store.len(), 1);
        assert_eq!(store.points()[0].name, "A");
    }

    #[test]
    fn test_get_finds_by_id() {
        let mut store = PointStore::new();
        store.add([0.0, 0.0, 0.0], "A", "first");
        store.add([1.0, 0.0, 0.0], "B", "second");

        assert_eq!(store.get(2).map(|p| p.name.as_str()), Some("B"));
        assert!(store.get(3).is_none());
    }
}
