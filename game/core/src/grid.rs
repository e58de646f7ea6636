use crate::math::Vec2;
use crate::objects::ObjectManager;
use flint::ObjectId;
use hashbrown::HashMap;
use indexmap::IndexSet;

/// Uniform spatial grid over live objects. `add`/`remove`/`update` are
/// O(1); range queries visit only the cells intersecting the circle's
/// bounding box.
///
/// Invariant: every live object is referenced by exactly the cell that
/// claims its current position.
pub struct SpatialGrid {
    cell_size: f32,
    cells: HashMap<(i32, i32), IndexSet<ObjectId>>,
}

impl SpatialGrid {
    pub fn new(cell_size: f32) -> SpatialGrid {
        SpatialGrid {
            cell_size,
            cells: HashMap::new(),
        }
    }

    #[inline]
    fn cell_of(&self, pos: Vec2) -> (i32, i32) {
        (
            (pos.x / self.cell_size).floor() as i32,
            (pos.y / self.cell_size).floor() as i32,
        )
    }

    pub fn add(&mut self, id: ObjectId, pos: Vec2) {
        self.cells.entry(self.cell_of(pos)).or_default().insert(id);
    }

    pub fn remove(&mut self, id: ObjectId, pos: Vec2) {
        let cell = self.cell_of(pos);
        if let Some(ids) = self.cells.get_mut(&cell) {
            ids.shift_remove(&id);
            if ids.is_empty() {
                self.cells.remove(&cell);
            }
        }
    }

    /// Moves `id` between cells when the position change crosses a cell
    /// boundary; no-op otherwise.
    pub fn update(&mut self, id: ObjectId, old_pos: Vec2, new_pos: Vec2) {
        let old_cell = self.cell_of(old_pos);
        let new_cell = self.cell_of(new_pos);
        if old_cell == new_cell {
            return;
        }

        if let Some(ids) = self.cells.get_mut(&old_cell) {
            ids.shift_remove(&id);
            if ids.is_empty() {
                self.cells.remove(&old_cell);
            }
        }
        self.cells.entry(new_cell).or_default().insert(id);
    }

    /// Ids of live objects within `radius` of `center`, filtered on exact
    /// squared distance after the coarse cell pass.
    pub fn query_range(&self, center: Vec2, radius: f32, objects: &ObjectManager) -> Vec<ObjectId> {
        let mut found = Vec::new();

        let min = self.cell_of(center - Vec2::new(radius, radius));
        let max = self.cell_of(center + Vec2::new(radius, radius));
        let radius_sq = radius * radius;

        for cx in min.0..=max.0 {
            for cy in min.1..=max.1 {
                let Some(ids) = self.cells.get(&(cx, cy)) else {
                    continue;
                };

                for &id in ids {
                    if let Some(object) = objects.get(id) {
                        if Vec2::distance_sq(object.pos, center) <= radius_sq {
                            found.push(id);
                        }
                    }
                }
            }
        }

        found
    }

    /// Clears and re-inserts everything. Used after bulk changes and in
    /// tests; the steady-state path is `update`.
    pub fn rebuild<I: IntoIterator<Item = (ObjectId, Vec2)>>(&mut self, objects: I) {
        self.cells.clear();
        for (id, pos) in objects {
            self.add(id, pos);
        }
    }

    pub fn occupied_cells(&self) -> usize {
        self.cells.len()
    }

    /// Total references across all cells. Equals the live object count
    /// whenever the grid invariant holds.
    pub fn reference_count(&self) -> usize {
        self.cells.values().map(IndexSet::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::objects::{GameObject, ObjectKind};

    fn manager_with(positions: &[(ObjectId, Vec2)]) -> ObjectManager {
        let mut manager = ObjectManager::new(None);
        for &(id, pos) in positions {
            manager.add_object(GameObject::new(id, ObjectKind::Monster, 1, pos, 30));
        }
        manager
    }

    #[test]
    fn test_insert_and_query() {
        let positions = [
            (1, Vec2::new(50.0, 50.0)),
            (2, Vec2::new(150.0, 50.0)),
            (3, Vec2::new(60.0, 60.0)),
        ];
        let manager = manager_with(&positions);

        let mut grid = SpatialGrid::new(100.0);
        grid.rebuild(positions.iter().copied());

        let found = grid.query_range(Vec2::new(50.0, 50.0), 20.0, &manager);

        assert_eq!(found.len(), 2);
        assert!(found.contains(&1));
        assert!(found.contains(&3));
    }

    #[test]
    fn test_update_crosses_cells() {
        let mut manager = manager_with(&[(1, Vec2::new(10.0, 10.0))]);
        let mut grid = SpatialGrid::new(100.0);
        grid.add(1, Vec2::new(10.0, 10.0));

        let new_pos = Vec2::new(250.0, 250.0);
        grid.update(1, Vec2::new(10.0, 10.0), new_pos);
        manager.get_mut(1).unwrap().pos = new_pos;

        assert!(grid.query_range(Vec2::new(10.0, 10.0), 50.0, &manager).is_empty());
        assert_eq!(grid.query_range(new_pos, 50.0, &manager), vec![1]);
        // Exactly one cell holds exactly one reference.
        assert_eq!(grid.reference_count(), 1);
    }

    #[test]
    fn test_update_within_cell_keeps_single_reference() {
        let mut grid = SpatialGrid::new(100.0);
        grid.add(1, Vec2::new(10.0, 10.0));

        grid.update(1, Vec2::new(10.0, 10.0), Vec2::new(90.0, 90.0));
        assert_eq!(grid.reference_count(), 1);
        assert_eq!(grid.occupied_cells(), 1);
    }

    #[test]
    fn test_remove() {
        let manager = manager_with(&[(1, Vec2::new(50.0, 50.0))]);
        let mut grid = SpatialGrid::new(100.0);
        grid.add(1, Vec2::new(50.0, 50.0));

        assert_eq!(grid.query_range(Vec2::new(50.0, 50.0), 10.0, &manager).len(), 1);

        grid.remove(1, Vec2::new(50.0, 50.0));
        assert!(grid.query_range(Vec2::new(50.0, 50.0), 10.0, &manager).is_empty());
        assert_eq!(grid.occupied_cells(), 0);
    }

    #[test]
    fn test_negative_coordinates() {
        let positions = [(1, Vec2::new(-50.0, -50.0)), (2, Vec2::new(-150.0, -50.0))];
        let manager = manager_with(&positions);

        let mut grid = SpatialGrid::new(100.0);
        grid.rebuild(positions.iter().copied());

        let found = grid.query_range(Vec2::new(-50.0, -50.0), 20.0, &manager);
        assert_eq!(found, vec![1]);
    }

    #[test]
    fn test_query_spanning_many_cells() {
        let positions: Vec<(ObjectId, Vec2)> = (0..10)
            .map(|i| (i, Vec2::new(i as f32 * 100.0, 0.0)))
            .collect();
        let manager = manager_with(&positions);

        let mut grid = SpatialGrid::new(100.0);
        grid.rebuild(positions.iter().copied());

        let found = grid.query_range(Vec2::new(450.0, 0.0), 175.0, &manager);
        // 300, 400, 500, 600 are within 175 of 450.
        assert_eq!(found.len(), 4);
    }
}
