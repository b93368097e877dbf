use std::ops::Range;

use eframe::egui::Vec2;

const LEAF_BODIES: usize = 12;
const MAX_SPLITS: usize = 10;

/// Axis-aligned square region of the plane.
#[derive(Clone, Copy, Debug)]
pub(super) struct Square {
    pub(super) center: Vec2,
    pub(super) half: f32,
}

impl Square {
    /// Smallest padded square around `points`, or `None` when empty or non-finite.
    fn enclosing(points: &[Vec2]) -> Option<Self> {
        let (&first, rest) = points.split_first()?;
        let (low, high) = rest
            .iter()
            .fold((first, first), |(low, high), &point| (low.min(point), high.max(point)));
        if !low.is_finite() || !high.is_finite() {
            return None;
        }

        Some(Self {
            center: (low + high) * 0.5,
            half: (high - low).max_elem().max(1.0) * 0.5 + 1.0,
        })
    }

    pub(super) fn contains(self, point: Vec2) -> bool {
        let offset = (point - self.center).abs();
        offset.x <= self.half && offset.y <= self.half
    }

    pub(super) fn side(self) -> f32 {
        self.half * 2.0
    }

    /// Quadrant index: bit 0 set right of center, bit 1 set below it.
    fn quadrant_of(self, point: Vec2) -> u8 {
        u8::from(point.x >= self.center.x) | (u8::from(point.y >= self.center.y) << 1)
    }

    fn quarter(self, quadrant: u8) -> Self {
        let half = self.half * 0.5;
        let sign = |bit: u8| if quadrant & bit == 0 { -half } else { half };
        Self {
            center: self.center + Vec2::new(sign(1), sign(2)),
            half,
        }
    }
}

/// One region of the tree with the body count and centroid of everything in it.
#[derive(Debug)]
pub(super) struct Cell {
    pub(super) square: Square,
    pub(super) centroid: Vec2,
    pub(super) weight: f32,
    bodies: Range<usize>,
    children: Range<usize>,
}

impl Cell {
    pub(super) fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

/// Barnes-Hut tree stored flat: cells in one arena, bodies permuted so each
/// cell owns a contiguous run of them.
#[derive(Debug)]
pub(super) struct BarnesHutTree {
    cells: Vec<Cell>,
    order: Vec<usize>,
}

impl BarnesHutTree {
    pub(super) fn build(positions: &[Vec2]) -> Option<Self> {
        let square = Square::enclosing(positions)?;
        let mut tree = Self {
            cells: Vec::new(),
            order: (0..positions.len()).collect(),
        };
        tree.push_cell(square, 0..positions.len(), positions);
        tree.subdivide(0, positions, 0);
        Some(tree)
    }

    pub(super) fn root(&self) -> &Cell {
        &self.cells[0]
    }

    pub(super) fn children(&self, cell: &Cell) -> &[Cell] {
        &self.cells[cell.children.clone()]
    }

    /// Body indices held by `cell`. Only leaves are visited for exact sums.
    pub(super) fn bodies(&self, cell: &Cell) -> &[usize] {
        &self.order[cell.bodies.clone()]
    }

    fn push_cell(&mut self, square: Square, bodies: Range<usize>, positions: &[Vec2]) {
        let weight = bodies.len() as f32;
        let sum = self.order[bodies.clone()]
            .iter()
            .fold(Vec2::ZERO, |sum, &body| sum + positions[body]);
        self.cells.push(Cell {
            square,
            centroid: if weight > 0.0 { sum / weight } else { sum },
            weight,
            bodies,
            children: 0..0,
        });
    }

    fn subdivide(&mut self, cell: usize, positions: &[Vec2], depth: usize) {
        let square = self.cells[cell].square;
        let bodies = self.cells[cell].bodies.clone();
        if depth >= MAX_SPLITS || bodies.len() <= LEAF_BODIES {
            return;
        }

        self.order[bodies.clone()].sort_unstable_by_key(|&body| square.quadrant_of(positions[body]));

        let mut groups = Vec::with_capacity(4);
        let mut start = bodies.start;
        for quadrant in 0..4 {
            let len = self.order[start..bodies.end]
                .iter()
                .take_while(|&&body| square.quadrant_of(positions[body]) == quadrant)
                .count();
            if len > 0 {
                groups.push((quadrant, start..start + len));
            }
            start += len;
        }
        // Coincident or tightly packed bodies: splitting again would not separate them.
        if groups.len() <= 1 {
            return;
        }

        let first = self.cells.len();
        for (quadrant, group) in groups {
            self.push_cell(square.quarter(quadrant), group, positions);
        }
        let last = self.cells.len();
        self.cells[cell].children = first..last;

        for child in first..last {
            self.subdivide(child, positions, depth + 1);
        }
    }
}

#[cfg(test)]
mod tests {
    use eframe::egui::vec2;

    use super::*;

    fn leaf_bodies(tree: &BarnesHutTree, cell: &Cell) -> usize {
        if cell.is_leaf() {
            return tree.bodies(cell).len();
        }
        tree.children(cell)
            .iter()
            .map(|child| leaf_bodies(tree, child))
            .sum()
    }

    #[test]
    fn empty_input_has_no_tree() {
        assert!(BarnesHutTree::build(&[]).is_none());
    }

    #[test]
    fn small_sets_stay_in_one_leaf() {
        let positions = (0..5).map(|i| vec2(i as f32, 0.0)).collect::<Vec<_>>();
        let tree = BarnesHutTree::build(&positions).expect("tree");

        assert!(tree.root().is_leaf());
        assert_eq!(tree.root().weight, 5.0);
        assert!((tree.root().centroid - vec2(2.0, 0.0)).length() < 1e-5);
    }

    #[test]
    fn large_sets_split_and_keep_every_body() {
        let positions = (0..200)
            .map(|i| vec2((i % 20) as f32 * 10.0, (i / 20) as f32 * 10.0))
            .collect::<Vec<_>>();
        let tree = BarnesHutTree::build(&positions).expect("tree");

        assert!(!tree.root().is_leaf());
        assert_eq!(leaf_bodies(&tree, tree.root()), 200);
        for position in &positions {
            assert!(tree.root().square.contains(*position));
        }
    }

    #[test]
    fn children_cover_their_bodies() {
        let positions = (0..100)
            .map(|i| vec2((i * 37 % 101) as f32, (i * 53 % 97) as f32))
            .collect::<Vec<_>>();
        let tree = BarnesHutTree::build(&positions).expect("tree");

        for child in tree.children(tree.root()) {
            for &body in tree.bodies(child) {
                assert!(child.square.contains(positions[body]));
            }
        }
    }

    #[test]
    fn stacked_bodies_stay_in_one_leaf() {
        let positions = vec![vec2(3.0, 3.0); 40];
        let tree = BarnesHutTree::build(&positions).expect("tree");

        assert!(tree.root().is_leaf());
        assert_eq!(tree.bodies(tree.root()).len(), 40);
    }

    #[test]
    fn non_finite_positions_are_rejected() {
        assert!(BarnesHutTree::build(&[vec2(f32::NAN, 0.0)]).is_none());
    }
}
