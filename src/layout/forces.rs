use eframe::egui::Vec2;

use crate::util::separation_direction;

use super::quadtree::{BarnesHutTree, Cell};

#[derive(Clone, Copy, Debug)]
pub(super) struct RepulsionParams {
    pub(super) strength: f32,
    pub(super) min_distance_sq: f32,
    pub(super) theta: f32,
}

/// Push on body `index` away from body `other`, inverse-square in distance.
fn repulsion_between(
    index: usize,
    other: usize,
    positions: &[Vec2],
    params: RepulsionParams,
) -> Vec2 {
    let delta = positions[index] - positions[other];
    let distance_sq = delta.length_sq();
    let direction = if distance_sq > 1e-8 {
        delta / distance_sq.sqrt()
    } else {
        separation_direction(other, index)
    };
    direction * (params.strength / distance_sq.max(params.min_distance_sq))
}

/// Adds the push on body `index` from everything inside `cell`, treating
/// distant cells as one body at their centroid.
pub(super) fn accumulate_repulsion(
    tree: &BarnesHutTree,
    cell: &Cell,
    index: usize,
    positions: &[Vec2],
    params: RepulsionParams,
    force: &mut Vec2,
) {
    if cell.weight <= 0.0 {
        return;
    }

    let point = positions[index];

    if cell.is_leaf() {
        for &other in tree.bodies(cell) {
            if other != index {
                *force += repulsion_between(index, other, positions, params);
            }
        }
        return;
    }

    let delta = point - cell.centroid;
    let distance_sq = delta.length_sq().max(params.min_distance_sq);
    let distance = distance_sq.sqrt();
    let far_enough = !cell.square.contains(point) && cell.square.side() / distance < params.theta;

    if far_enough && cell.weight > 1.0 {
        *force += (delta / distance) * (params.strength * cell.weight / distance_sq);
        return;
    }

    for child in tree.children(cell) {
        accumulate_repulsion(tree, child, index, positions, params, force);
    }
}
