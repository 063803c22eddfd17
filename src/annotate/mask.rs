use crate::annotate::model::{PixelBuffer, Rgba, Shape};
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::sync::Mutex;

/// Renders the committed shape set as a binary mask at the base image's
/// native dimensions: black background, every shape solid white. On-screen
/// markup styling never enters here, so the mask is white by construction.
/// Returns `None` when nothing is marked.
pub fn render_mask(base: &PixelBuffer, shapes: &[Shape]) -> Option<PixelBuffer> {
    if shapes.is_empty() {
        return None;
    }
    let mut mask = PixelBuffer::new(base.width, base.height, Rgba::BLACK);
    for shape in shapes {
        match shape {
            Shape::Stroke { points, width, .. } => {
                stamp_polyline(points, *width, &mut mask);
            }
            Shape::Rect { x, y, w, h } => {
                fill_rect(*x, *y, *w, *h, &mut mask);
            }
        }
    }
    Some(mask)
}

fn stamp_polyline(points: &[(f32, f32)], width: f32, mask: &mut PixelBuffer) {
    let stroke_width = (width.round() as i32).max(1) as u32;
    let points: Vec<(i32, i32)> = points
        .iter()
        .map(|&(x, y)| (x.round() as i32, y.round() as i32))
        .collect();

    match points.as_slice() {
        [] => {}
        [single] => stamp_disc(*single, stroke_width, mask),
        _ => {
            for segment in points.windows(2) {
                stamp_segment(segment[0], segment[1], stroke_width, mask);
            }
        }
    }
}

/// Bresenham walk stamping a disc at every step, so joints between
/// segments are rounded rather than gapped.
fn stamp_segment(start: (i32, i32), end: (i32, i32), stroke_width: u32, mask: &mut PixelBuffer) {
    let mut x0 = start.0;
    let mut y0 = start.1;
    let x1 = end.0;
    let y1 = end.1;

    let dx = (x1 - x0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let dy = -(y1 - y0).abs();
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;

    loop {
        stamp_disc((x0, y0), stroke_width, mask);
        if x0 == x1 && y0 == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x0 += sx;
        }
        if e2 <= dx {
            err += dx;
            y0 += sy;
        }
    }
}

#[derive(Clone)]
struct DiscRows {
    rows: Vec<(i32, i32, i32)>,
}

static DISC_CACHE: Lazy<Mutex<HashMap<u32, DiscRows>>> = Lazy::new(|| Mutex::new(HashMap::new()));

fn disc_rows(stroke_width: u32) -> DiscRows {
    if let Ok(cache) = DISC_CACHE.lock() {
        if let Some(mask) = cache.get(&stroke_width) {
            return mask.clone();
        }
    }

    let radius = (stroke_width.saturating_sub(1) / 2) as i32;
    let radius_sq = radius * radius;
    let mut rows = Vec::with_capacity((radius * 2 + 1) as usize);
    for dy in -radius..=radius {
        let mut min_dx = i32::MAX;
        let mut max_dx = i32::MIN;
        for dx in -radius..=radius {
            if dx * dx + dy * dy <= radius_sq {
                min_dx = min_dx.min(dx);
                max_dx = max_dx.max(dx);
            }
        }
        if min_dx <= max_dx {
            rows.push((dy, min_dx, max_dx));
        }
    }
    let mask = DiscRows { rows };

    if let Ok(mut cache) = DISC_CACHE.lock() {
        cache.insert(stroke_width, mask.clone());
    }
    mask
}

fn stamp_disc(center: (i32, i32), stroke_width: u32, mask: &mut PixelBuffer) {
    let width = mask.width as i32;
    let height = mask.height as i32;
    for &(dy, min_dx, max_dx) in &disc_rows(stroke_width).rows {
        let y = center.1 + dy;
        if y < 0 || y >= height {
            continue;
        }
        let x0 = (center.0 + min_dx).max(0);
        let x1 = (center.0 + max_dx).min(width - 1);
        if x0 > x1 {
            continue;
        }
        let row_base = (y as u32 * mask.width * 4) as usize;
        for x in x0..=x1 {
            let idx = row_base + (x as usize * 4);
            mask.pixels[idx] = 255;
            mask.pixels[idx + 1] = 255;
            mask.pixels[idx + 2] = 255;
            mask.pixels[idx + 3] = 255;
        }
    }
}

fn fill_rect(x: f32, y: f32, w: f32, h: f32, mask: &mut PixelBuffer) {
    let x0 = (x.round() as i32).max(0);
    let y0 = (y.round() as i32).max(0);
    let x1 = ((x + w).round() as i32).min(mask.width as i32 - 1);
    let y1 = ((y + h).round() as i32).min(mask.height as i32 - 1);
    if x0 > x1 || y0 > y1 {
        return;
    }
    for row in y0..=y1 {
        let row_base = (row as u32 * mask.width * 4) as usize;
        for col in x0..=x1 {
            let idx = row_base + (col as usize * 4);
            mask.pixels[idx] = 255;
            mask.pixels[idx + 1] = 255;
            mask.pixels[idx + 2] = 255;
            mask.pixels[idx + 3] = 255;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotate::model::MarkKind;

    fn base(width: u32, height: u32) -> PixelBuffer {
        PixelBuffer::new(width, height, Rgba::rgba(120, 130, 140, 255))
    }

    #[test]
    fn no_shapes_yields_no_mask() {
        assert!(render_mask(&base(8, 8), &[]).is_none());
    }

    #[test]
    fn mask_matches_base_dimensions() {
        let shapes = [Shape::Rect {
            x: 1.0,
            y: 1.0,
            w: 2.0,
            h: 2.0,
        }];
        let mask = render_mask(&base(17, 9), &shapes).unwrap();
        assert_eq!(mask.width, 17);
        assert_eq!(mask.height, 9);
    }

    #[test]
    fn rect_region_is_white_rest_is_black() {
        let shapes = [Shape::Rect {
            x: 2.0,
            y: 2.0,
            w: 3.0,
            h: 2.0,
        }];
        let mask = render_mask(&base(8, 8), &shapes).unwrap();

        assert_eq!(mask.pixel(2, 2), Rgba::WHITE);
        assert_eq!(mask.pixel(5, 4), Rgba::WHITE);
        assert_eq!(mask.pixel(3, 3), Rgba::WHITE);
        assert_eq!(mask.pixel(1, 2), Rgba::BLACK);
        assert_eq!(mask.pixel(2, 1), Rgba::BLACK);
        assert_eq!(mask.pixel(6, 4), Rgba::BLACK);
        assert_eq!(mask.pixel(0, 0), Rgba::BLACK);
    }

    #[test]
    fn thin_stroke_paints_exact_path_pixels() {
        let shapes = [Shape::Stroke {
            points: vec![(0.0, 1.0), (2.0, 1.0)],
            width: 1.0,
            kind: MarkKind::Paint,
        }];
        let mask = render_mask(&base(3, 3), &shapes).unwrap();

        for x in 0..3 {
            assert_eq!(mask.pixel(x, 1), Rgba::WHITE, "x={x}");
            assert_eq!(mask.pixel(x, 0), Rgba::BLACK, "x={x}");
            assert_eq!(mask.pixel(x, 2), Rgba::BLACK, "x={x}");
        }
    }

    #[test]
    fn wide_stroke_covers_its_radius() {
        let shapes = [Shape::Stroke {
            points: vec![(10.0, 10.0)],
            width: 9.0,
            kind: MarkKind::Paint,
        }];
        let mask = render_mask(&base(21, 21), &shapes).unwrap();

        // Radius is (9 - 1) / 2 = 4.
        assert_eq!(mask.pixel(10, 10), Rgba::WHITE);
        assert_eq!(mask.pixel(14, 10), Rgba::WHITE);
        assert_eq!(mask.pixel(10, 6), Rgba::WHITE);
        assert_eq!(mask.pixel(15, 10), Rgba::BLACK);
        assert_eq!(mask.pixel(14, 14), Rgba::BLACK);
    }

    #[test]
    fn off_canvas_geometry_is_clipped_safely() {
        let shapes = [
            Shape::Stroke {
                points: vec![(-50.0, -50.0), (2.0, 2.0)],
                width: 7.0,
                kind: MarkKind::Paint,
            },
            Shape::Rect {
                x: -10.0,
                y: -10.0,
                w: 12.0,
                h: 12.0,
            },
            Shape::Rect {
                x: 100.0,
                y: 100.0,
                w: 50.0,
                h: 50.0,
            },
        ];
        let mask = render_mask(&base(4, 4), &shapes).unwrap();
        assert_eq!(mask.pixel(2, 2), Rgba::WHITE);
        assert_eq!(mask.pixel(0, 0), Rgba::WHITE);
    }

    #[test]
    fn multiple_shapes_union_into_one_mask() {
        let shapes = [
            Shape::Rect {
                x: 0.0,
                y: 0.0,
                w: 1.0,
                h: 1.0,
            },
            Shape::Rect {
                x: 6.0,
                y: 6.0,
                w: 1.0,
                h: 1.0,
            },
        ];
        let mask = render_mask(&base(8, 8), &shapes).unwrap();
        assert_eq!(mask.pixel(0, 0), Rgba::WHITE);
        assert_eq!(mask.pixel(7, 7), Rgba::WHITE);
        assert_eq!(mask.pixel(3, 3), Rgba::BLACK);
    }
}
