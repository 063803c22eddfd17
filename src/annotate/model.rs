use crate::error::{Result, RetouchError};
use base64::{engine::general_purpose, Engine as _};
use image::codecs::png::PngEncoder;
use image::{ColorType, ImageEncoder};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const BLACK: Self = Self::rgba(0, 0, 0, 255);
    pub const WHITE: Self = Self::rgba(255, 255, 255, 255);

    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }
}

/// Tightly packed RGBA8 pixels. The shared representation for base images,
/// mask output and source output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl PixelBuffer {
    pub fn new(width: u32, height: u32, fill: Rgba) -> Self {
        let mut pixels = vec![0u8; (width * height * 4) as usize];
        for chunk in pixels.chunks_exact_mut(4) {
            chunk[0] = fill.r;
            chunk[1] = fill.g;
            chunk[2] = fill.b;
            chunk[3] = fill.a;
        }
        Self {
            width,
            height,
            pixels,
        }
    }

    pub fn from_pixels(width: u32, height: u32, pixels: Vec<u8>) -> Self {
        assert_eq!(pixels.len(), (width * height * 4) as usize);
        Self {
            width,
            height,
            pixels,
        }
    }

    pub fn pixel(&self, x: u32, y: u32) -> Rgba {
        let idx = ((y * self.width + x) * 4) as usize;
        Rgba {
            r: self.pixels[idx],
            g: self.pixels[idx + 1],
            b: self.pixels[idx + 2],
            a: self.pixels[idx + 3],
        }
    }

    pub fn encode_png(&self) -> Result<Vec<u8>> {
        let mut bytes = Vec::new();
        PngEncoder::new(&mut bytes)
            .write_image(&self.pixels, self.width, self.height, ColorType::Rgba8)
            .map_err(|e| RetouchError::Decode(format!("png encode failed: {e}")))?;
        Ok(bytes)
    }

    pub fn decode_png(bytes: &[u8]) -> Result<Self> {
        let image = image::load_from_memory(bytes)
            .map_err(|e| RetouchError::Decode(format!("png decode failed: {e}")))?;
        let rgba = image.to_rgba8();
        let (width, height) = rgba.dimensions();
        Ok(Self::from_pixels(width, height, rgba.into_raw()))
    }

    pub fn to_data_url(&self) -> Result<String> {
        let png = self.encode_png()?;
        Ok(format!(
            "data:image/png;base64,{}",
            general_purpose::STANDARD.encode(png)
        ))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkKind {
    Paint,
    Erase,
}

/// A committed drawn mark, stored in base-image pixel coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum Shape {
    Stroke {
        points: Vec<(f32, f32)>,
        width: f32,
        kind: MarkKind,
    },
    Rect {
        x: f32,
        y: f32,
        w: f32,
        h: f32,
    },
}

impl Shape {
    /// Normalized rectangle from a drag gesture; well-formed regardless of
    /// drag direction.
    pub fn rect_from_drag(anchor: (f32, f32), current: (f32, f32)) -> Self {
        let x = anchor.0.min(current.0);
        let y = anchor.1.min(current.1);
        let w = (anchor.0 - current.0).abs();
        let h = (anchor.1 - current.1).abs();
        Self::Rect { x, y, w, h }
    }

    pub fn contains(&self, point: (f32, f32)) -> bool {
        match self {
            Shape::Stroke { .. } => false,
            Shape::Rect { x, y, w, h } => {
                point.0 >= *x && point.0 <= x + w && point.1 >= *y && point.1 <= y + h
            }
        }
    }

    pub fn translate(&mut self, dx: f32, dy: f32) {
        match self {
            Shape::Stroke { points, .. } => {
                for point in points.iter_mut() {
                    point.0 += dx;
                    point.1 += dy;
                }
            }
            Shape::Rect { x, y, .. } => {
                *x += dx;
                *y += dy;
            }
        }
    }

    /// Whether a swept path (a polyline with the given sweep radius) touches
    /// this shape anywhere.
    pub fn intersects_path(&self, path: &[(f32, f32)], radius: f32) -> bool {
        if path.is_empty() {
            return false;
        }
        match self {
            Shape::Stroke { points, width, .. } => {
                let reach = radius + width * 0.5;
                let reach_sq = reach * reach;
                for_each_segment(path, |p0, p1| {
                    for_each_segment(points, |s0, s1| {
                        segment_segment_distance_sq(p0, p1, s0, s1) <= reach_sq
                    })
                })
            }
            Shape::Rect { x, y, w, h } => {
                if path.iter().any(|&p| self.contains(p)) {
                    return true;
                }
                let radius_sq = radius * radius;
                let corners = [(*x, *y), (x + w, *y), (x + w, y + h), (*x, y + h)];
                for_each_segment(path, |p0, p1| {
                    (0..4).any(|i| {
                        let e0 = corners[i];
                        let e1 = corners[(i + 1) % 4];
                        segment_segment_distance_sq(p0, p1, e0, e1) <= radius_sq
                    })
                })
            }
        }
    }
}

/// Visits a polyline as segments; a single point degenerates to a
/// zero-length segment.
fn for_each_segment<F>(points: &[(f32, f32)], mut hit: F) -> bool
where
    F: FnMut((f32, f32), (f32, f32)) -> bool,
{
    if points.len() == 1 {
        return hit(points[0], points[0]);
    }
    points.windows(2).any(|pair| hit(pair[0], pair[1]))
}

fn point_segment_distance_sq(point: (f32, f32), start: (f32, f32), end: (f32, f32)) -> f32 {
    let vx = end.0 - start.0;
    let vy = end.1 - start.1;
    let wx = point.0 - start.0;
    let wy = point.1 - start.1;
    let len_sq = vx * vx + vy * vy;
    if len_sq <= f32::EPSILON {
        return wx * wx + wy * wy;
    }
    let t = ((wx * vx + wy * vy) / len_sq).clamp(0.0, 1.0);
    let dx = point.0 - (start.0 + vx * t);
    let dy = point.1 - (start.1 + vy * t);
    dx * dx + dy * dy
}

fn orient(a: (f32, f32), b: (f32, f32), c: (f32, f32)) -> f32 {
    (b.0 - a.0) * (c.1 - a.1) - (b.1 - a.1) * (c.0 - a.0)
}

fn segments_cross(a0: (f32, f32), a1: (f32, f32), b0: (f32, f32), b1: (f32, f32)) -> bool {
    let d1 = orient(b0, b1, a0);
    let d2 = orient(b0, b1, a1);
    let d3 = orient(a0, a1, b0);
    let d4 = orient(a0, a1, b1);
    d1 * d2 < 0.0 && d3 * d4 < 0.0
}

fn segment_segment_distance_sq(
    a0: (f32, f32),
    a1: (f32, f32),
    b0: (f32, f32),
    b1: (f32, f32),
) -> f32 {
    // Touching endpoints fall through to the distance checks below.
    if segments_cross(a0, a1, b0, b1) {
        return 0.0;
    }
    point_segment_distance_sq(a0, b0, b1)
        .min(point_segment_distance_sq(a1, b0, b1))
        .min(point_segment_distance_sq(b0, a0, a1))
        .min(point_segment_distance_sq(b1, a0, a1))
}

/// One point in history: the ordered set of committed shapes.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CanvasState {
    pub shapes: Vec<Shape>,
}
