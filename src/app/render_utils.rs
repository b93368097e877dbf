use eframe::egui::{Color32, Painter, Pos2, Rect, Stroke, Vec2};

pub(super) const INTERNAL_COLOR: Color32 = Color32::from_rgb(86, 156, 214);
pub(super) const EXTERNAL_COLOR: Color32 = Color32::from_rgb(232, 140, 72);
pub(super) const SELECTED_COLOR: Color32 = Color32::from_rgb(245, 206, 93);

pub(super) fn blend_color(base: Color32, overlay: Color32, amount: f32) -> Color32 {
    let amount = amount.clamp(0.0, 1.0);
    let inverse = 1.0 - amount;
    let mix = |a: u8, b: u8| ((a as f32 * inverse) + (b as f32 * amount)) as u8;

    Color32::from_rgba_unmultiplied(
        mix(base.r(), overlay.r()),
        mix(base.g(), overlay.g()),
        mix(base.b(), overlay.b()),
        mix(base.a(), overlay.a()),
    )
}

pub(super) fn dim_color(color: Color32, factor: f32) -> Color32 {
    let factor = factor.clamp(0.0, 1.0);
    Color32::from_rgba_unmultiplied(
        (color.r() as f32 * factor) as u8,
        (color.g() as f32 * factor) as u8,
        (color.b() as f32 * factor) as u8,
        (color.a() as f32 * (0.45 + (factor * 0.55))) as u8,
    )
}

pub(super) fn node_color(external: bool) -> Color32 {
    if external { EXTERNAL_COLOR } else { INTERNAL_COLOR }
}

pub(super) fn draw_background(painter: &Painter, rect: Rect, pan: Vec2, zoom: f32) {
    painter.rect_filled(rect, 0.0, Color32::from_rgb(19, 23, 29));

    let step = (56.0 * zoom.clamp(0.6, 1.8)).max(20.0);
    let origin = rect.center() + pan;
    let stroke = Stroke::new(1.0, Color32::from_rgba_unmultiplied(60, 70, 80, 70));

    let mut x = rect.left() + (origin.x - rect.left()).rem_euclid(step);
    while x < rect.right() {
        painter.line_segment([Pos2::new(x, rect.top()), Pos2::new(x, rect.bottom())], stroke);
        x += step;
    }

    let mut y = rect.top() + (origin.y - rect.top()).rem_euclid(step);
    while y < rect.bottom() {
        painter.line_segment([Pos2::new(rect.left(), y), Pos2::new(rect.right(), y)], stroke);
        y += step;
    }
}

pub(super) fn circle_visible(rect: Rect, position: Pos2, radius: f32) -> bool {
    !(position.x + radius < rect.left()
        || position.x - radius > rect.right()
        || position.y + radius < rect.top()
        || position.y - radius > rect.bottom())
}

/// Cheap test for an edge that may cross the view while both endpoints are
/// outside it.
pub(super) fn edge_visible(rect: Rect, start: Pos2, end: Pos2, padding: f32) -> bool {
    let bounds = Rect::from_two_pos(start, end).expand(padding);
    if !bounds.intersects(rect) {
        return false;
    }

    if rect.contains(start) || rect.contains(end) {
        return true;
    }

    let corners = [
        rect.left_top(),
        rect.right_top(),
        rect.right_bottom(),
        rect.left_bottom(),
    ];
    (0..4).any(|side| segments_intersect(start, end, corners[side], corners[(side + 1) % 4]))
}

fn segments_intersect(a1: Pos2, a2: Pos2, b1: Pos2, b2: Pos2) -> bool {
    fn cross(o: Pos2, a: Pos2, b: Pos2) -> f32 {
        let oa = a - o;
        let ob = b - o;
        (oa.x * ob.y) - (oa.y * ob.x)
    }

    fn straddles(c1: f32, c2: f32) -> bool {
        c1 <= 0.0 && c2 >= 0.0 || c1 >= 0.0 && c2 <= 0.0
    }

    straddles(cross(a1, a2, b1), cross(a1, a2, b2)) && straddles(cross(b1, b2, a1), cross(b1, b2, a2))
}

pub(super) fn world_to_screen(rect: Rect, pan: Vec2, zoom: f32, world: Vec2) -> Pos2 {
    rect.center() + pan + world * zoom
}

pub(super) fn screen_to_world(rect: Rect, pan: Vec2, zoom: f32, screen: Pos2) -> Vec2 {
    (screen - rect.center() - pan) / zoom
}

/// Log-scaled position of `degree` in `[0, max]`.
fn normalize_degree(degree: u32, max: u32) -> f32 {
    if max <= 1 {
        return 0.0;
    }
    ((degree as f32).ln_1p() / (max as f32).ln_1p()).clamp(0.0, 1.0)
}

/// World-space radius. Hubs with many links are drawn larger.
pub(super) fn node_radius(degree: u32, max_degree: u32) -> f32 {
    4.0 + (normalize_degree(degree, max_degree) * 10.0)
}

#[cfg(test)]
mod tests {
    use eframe::egui::{pos2, vec2};

    use super::*;

    #[test]
    fn edge_through_view_is_visible() {
        let rect = Rect::from_min_max(pos2(0.0, 0.0), pos2(100.0, 100.0));
        assert!(edge_visible(rect, pos2(-50.0, 50.0), pos2(150.0, 50.0), 0.0));
        assert!(!edge_visible(rect, pos2(-50.0, -10.0), pos2(150.0, -10.0), 0.0));
    }

    #[test]
    fn screen_mapping_inverts_at_any_zoom() {
        let rect = Rect::from_min_max(pos2(0.0, 0.0), pos2(800.0, 600.0));
        let world = vec2(-42.0, 17.5);
        let screen = world_to_screen(rect, vec2(30.0, -12.0), 2.5, world);
        let back = screen_to_world(rect, vec2(30.0, -12.0), 2.5, screen);
        assert!((back - world).length() < 1e-3);
    }

    #[test]
    fn hubs_are_larger_than_leaves() {
        assert_eq!(node_radius(0, 0), node_radius(5, 0));
        assert!(node_radius(40, 40) > node_radius(1, 40));
        assert!(node_radius(40, 40) <= 14.0);
    }
}
