use crate::annotate::history::{SnapshotHistory, DEFAULT_HISTORY_LIMIT};
use crate::annotate::mask;
use crate::annotate::model::{CanvasState, MarkKind, PixelBuffer, Shape};
use crate::error::Result;
use std::sync::mpsc::Sender;

const MIN_POINT_DIST_SQ: f32 = 9.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawMode {
    Brush,
    Eraser,
    Rect,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceOptions {
    pub brush_width: f32,
    pub eraser_width: f32,
    pub min_rect_size: f32,
    pub history_limit: usize,
}

impl Default for SurfaceOptions {
    fn default() -> Self {
        Self {
            brush_width: 24.0,
            eraser_width: 24.0,
            min_rect_size: 5.0,
            history_limit: DEFAULT_HISTORY_LIMIT,
        }
    }
}

/// Snapshot of the affordance state, emitted after every mutation so a UI
/// can gate its undo/redo/apply controls without polling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurfaceSignal {
    pub can_undo: bool,
    pub can_redo: bool,
    pub has_marks: bool,
}

#[derive(Debug, Clone, PartialEq)]
enum Gesture {
    Stroke {
        points: Vec<(f32, f32)>,
        kind: MarkKind,
    },
    NewRect {
        anchor: (f32, f32),
        current: (f32, f32),
    },
    MoveRect {
        index: usize,
        grab: (f32, f32),
        moved: bool,
    },
}

/// Owns the committed shape set, the current draw mode and the in-progress
/// gesture, and turns pointer input into history commits. All coordinates
/// are base-image pixel space; viewport zoom/pan is the caller's concern.
#[derive(Debug)]
pub struct AnnotationSurface {
    mode: DrawMode,
    options: SurfaceOptions,
    shapes: Vec<Shape>,
    gesture: Option<Gesture>,
    base: Option<PixelBuffer>,
    history: SnapshotHistory,
    signals: Option<Sender<SurfaceSignal>>,
}

impl Default for AnnotationSurface {
    fn default() -> Self {
        Self::new()
    }
}

impl AnnotationSurface {
    pub fn new() -> Self {
        Self::with_options(SurfaceOptions::default())
    }

    pub fn with_options(options: SurfaceOptions) -> Self {
        Self {
            mode: DrawMode::Brush,
            options,
            shapes: Vec::new(),
            gesture: None,
            base: None,
            history: SnapshotHistory::new(options.history_limit),
            signals: None,
        }
    }

    pub fn set_signal_sink(&mut self, sink: Sender<SurfaceSignal>) {
        self.signals = Some(sink);
    }

    pub fn mode(&self) -> DrawMode {
        self.mode
    }

    /// The single mode transition: any in-progress gesture is dropped so a
    /// half-drawn shape never leaks across modes. Hit-testing of existing
    /// rectangles only runs in `Rect` mode.
    pub fn set_mode(&mut self, mode: DrawMode) {
        if self.mode != mode {
            self.gesture = None;
            self.mode = mode;
        }
    }

    /// Installs a new base image; committed shapes and undo history are
    /// dropped with it.
    pub fn load_image(&mut self, image: PixelBuffer) {
        self.base = Some(image);
        self.shapes.clear();
        self.gesture = None;
        self.history.reset();
        self.emit();
    }

    pub fn base_image(&self) -> Option<&PixelBuffer> {
        self.base.as_ref()
    }

    pub fn shapes(&self) -> &[Shape] {
        &self.shapes
    }

    pub fn has_marks(&self) -> bool {
        !self.shapes.is_empty()
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    pub fn pointer_down(&mut self, point: (f32, f32)) {
        self.gesture = Some(match self.mode {
            DrawMode::Brush => Gesture::Stroke {
                points: vec![point],
                kind: MarkKind::Paint,
            },
            DrawMode::Eraser => Gesture::Stroke {
                points: vec![point],
                kind: MarkKind::Erase,
            },
            DrawMode::Rect => match self.hit_rect(point) {
                Some(index) => Gesture::MoveRect {
                    index,
                    grab: point,
                    moved: false,
                },
                None => Gesture::NewRect {
                    anchor: point,
                    current: point,
                },
            },
        });
    }

    pub fn pointer_move(&mut self, point: (f32, f32)) {
        match self.gesture.as_mut() {
            Some(Gesture::Stroke { points, .. }) => {
                if should_append_point(points.last().copied(), point) {
                    points.push(point);
                }
            }
            Some(Gesture::NewRect { current, .. }) => {
                *current = point;
            }
            Some(Gesture::MoveRect { index, grab, moved }) => {
                let dx = point.0 - grab.0;
                let dy = point.1 - grab.1;
                if dx != 0.0 || dy != 0.0 {
                    self.shapes[*index].translate(dx, dy);
                    *grab = point;
                    *moved = true;
                }
            }
            None => {}
        }
    }

    pub fn pointer_up(&mut self, point: (f32, f32)) {
        self.pointer_move(point);
        let Some(gesture) = self.gesture.take() else {
            return;
        };

        match gesture {
            Gesture::Stroke {
                points,
                kind: MarkKind::Paint,
            } => {
                self.shapes.push(Shape::Stroke {
                    points,
                    width: self.options.brush_width,
                    kind: MarkKind::Paint,
                });
                self.commit();
            }
            Gesture::Stroke {
                points,
                kind: MarkKind::Erase,
            } => {
                // The erase stroke itself is discarded either way; only a
                // sweep that actually removed something commits.
                let radius = self.options.eraser_width * 0.5;
                let before = self.shapes.len();
                self.shapes
                    .retain(|shape| !shape.intersects_path(&points, radius));
                let removed = before - self.shapes.len();
                if removed > 0 {
                    tracing::debug!(removed, "erase sweep removed shapes");
                    self.commit();
                }
            }
            Gesture::NewRect { anchor, current } => {
                let rect = Shape::rect_from_drag(anchor, current);
                if let Shape::Rect { w, h, .. } = rect {
                    if w < self.options.min_rect_size || h < self.options.min_rect_size {
                        // Accidental click; nothing to commit.
                        return;
                    }
                }
                self.shapes.push(rect);
                self.commit();
            }
            Gesture::MoveRect { moved, .. } => {
                // A zero-distance click-release is not a mutation.
                if moved {
                    self.commit();
                }
            }
        }
    }

    pub fn undo(&mut self) -> bool {
        match self.history.undo() {
            Some(state) => {
                self.restore(state);
                true
            }
            None => false,
        }
    }

    pub fn redo(&mut self) -> bool {
        match self.history.redo() {
            Some(state) => {
                self.restore(state);
                true
            }
            None => false,
        }
    }

    /// Removes every shape and commits the empty state; clearing is itself
    /// undoable.
    pub fn clear(&mut self) {
        self.shapes.clear();
        self.gesture = None;
        self.commit();
    }

    /// Black background, committed shapes solid white, at the base image's
    /// native dimensions. `None` when no image is loaded or nothing is
    /// marked; an edit cannot target an undefined region.
    pub fn mask(&self) -> Option<PixelBuffer> {
        let base = self.base.as_ref()?;
        mask::render_mask(base, &self.shapes)
    }

    /// The clean base image, no shapes composited.
    pub fn source(&self) -> Option<PixelBuffer> {
        self.base.clone()
    }

    pub fn mask_data_url(&self) -> Result<Option<String>> {
        match self.mask() {
            Some(mask) => Ok(Some(mask.to_data_url()?)),
            None => Ok(None),
        }
    }

    pub fn source_data_url(&self) -> Result<Option<String>> {
        match self.source() {
            Some(source) => Ok(Some(source.to_data_url()?)),
            None => Ok(None),
        }
    }

    fn hit_rect(&self, point: (f32, f32)) -> Option<usize> {
        // Topmost-first: later shapes draw over earlier ones.
        self.shapes.iter().rposition(|shape| shape.contains(point))
    }

    fn commit(&mut self) {
        self.history.commit(CanvasState {
            shapes: self.shapes.clone(),
        });
        self.emit();
    }

    fn restore(&mut self, state: CanvasState) {
        self.shapes = state.shapes;
        self.gesture = None;
        self.emit();
    }

    fn emit(&self) {
        if let Some(sink) = &self.signals {
            let _ = sink.send(SurfaceSignal {
                can_undo: self.history.can_undo(),
                can_redo: self.history.can_redo(),
                has_marks: self.has_marks(),
            });
        }
    }
}

fn should_append_point(last: Option<(f32, f32)>, point: (f32, f32)) -> bool {
    let Some((last_x, last_y)) = last else {
        return true;
    };
    let dx = point.0 - last_x;
    let dy = point.1 - last_y;
    dx * dx + dy * dy >= MIN_POINT_DIST_SQ
}

#[cfg(test)]
mod tests {
    use super::*;

    fn surface() -> AnnotationSurface {
        AnnotationSurface::new()
    }

    fn drag(surface: &mut AnnotationSurface, from: (f32, f32), to: (f32, f32)) {
        surface.pointer_down(from);
        surface.pointer_move(to);
        surface.pointer_up(to);
    }

    #[test]
    fn brush_commit_creates_single_stroke() {
        let mut s = surface();
        s.pointer_down((10.0, 10.0));
        s.pointer_move((10.0, 11.0));
        s.pointer_move((14.0, 14.0));
        s.pointer_up((18.0, 18.0));

        assert_eq!(s.shapes().len(), 1);
        assert!(matches!(
            s.shapes()[0],
            Shape::Stroke {
                kind: MarkKind::Paint,
                ..
            }
        ));
        assert!(s.can_undo());
    }

    #[test]
    fn stroke_points_are_distance_thinned() {
        let mut s = surface();
        s.pointer_down((0.0, 0.0));
        s.pointer_move((1.0, 0.0));
        s.pointer_move((2.0, 0.0));
        s.pointer_move((10.0, 0.0));
        s.pointer_up((10.0, 0.0));

        let Shape::Stroke { points, .. } = &s.shapes()[0] else {
            panic!("expected stroke");
        };
        // (1,0) and (2,0) are within the thinning distance of (0,0).
        assert_eq!(points, &vec![(0.0, 0.0), (10.0, 0.0)]);
    }

    #[test]
    fn eraser_removes_intersecting_shapes_and_commits_once() {
        let mut s = surface();
        drag(&mut s, (0.0, 50.0), (100.0, 50.0));
        drag(&mut s, (0.0, 200.0), (100.0, 200.0));
        assert_eq!(s.shapes().len(), 2);

        s.set_mode(DrawMode::Eraser);
        drag(&mut s, (50.0, 0.0), (50.0, 100.0));

        assert_eq!(s.shapes().len(), 1);
        // One commit for the sweep: undo restores both strokes.
        assert!(s.undo());
        assert_eq!(s.shapes().len(), 2);
    }

    #[test]
    fn noop_erase_commits_nothing() {
        let mut s = surface();
        drag(&mut s, (0.0, 0.0), (20.0, 0.0));
        s.set_mode(DrawMode::Eraser);
        drag(&mut s, (0.0, 500.0), (20.0, 500.0));

        assert_eq!(s.shapes().len(), 1);
        assert!(s.undo());
        // Only the paint stroke was ever committed.
        assert!(s.shapes().is_empty());
        assert!(!s.can_undo());
    }

    #[test]
    fn tiny_rect_is_discarded_without_commit() {
        let mut s = surface();
        s.set_mode(DrawMode::Rect);
        drag(&mut s, (10.0, 10.0), (13.0, 30.0));

        assert!(s.shapes().is_empty());
        assert!(!s.can_undo());
    }

    #[test]
    fn rect_drag_any_direction_commits_normalized_box() {
        let mut s = surface();
        s.set_mode(DrawMode::Rect);
        drag(&mut s, (50.0, 40.0), (10.0, 8.0));

        assert_eq!(
            s.shapes(),
            &[Shape::Rect {
                x: 10.0,
                y: 8.0,
                w: 40.0,
                h: 32.0
            }]
        );
    }

    #[test]
    fn pointer_down_inside_rect_moves_it() {
        let mut s = surface();
        s.set_mode(DrawMode::Rect);
        drag(&mut s, (10.0, 10.0), (40.0, 40.0));

        drag(&mut s, (20.0, 20.0), (25.0, 30.0));
        assert_eq!(
            s.shapes(),
            &[Shape::Rect {
                x: 15.0,
                y: 20.0,
                w: 30.0,
                h: 30.0
            }]
        );
        // Creation + move are separate commits.
        assert!(s.undo());
        assert_eq!(
            s.shapes(),
            &[Shape::Rect {
                x: 10.0,
                y: 10.0,
                w: 30.0,
                h: 30.0
            }]
        );
    }

    #[test]
    fn click_release_on_rect_without_movement_commits_nothing() {
        let mut s = surface();
        s.set_mode(DrawMode::Rect);
        drag(&mut s, (10.0, 10.0), (40.0, 40.0));

        s.pointer_down((20.0, 20.0));
        s.pointer_up((20.0, 20.0));

        assert!(s.undo());
        assert!(s.shapes().is_empty());
    }

    #[test]
    fn rects_are_only_selectable_in_rect_mode() {
        let mut s = surface();
        s.set_mode(DrawMode::Rect);
        drag(&mut s, (10.0, 10.0), (40.0, 40.0));

        // In brush mode a drag over the rect paints instead of moving it.
        s.set_mode(DrawMode::Brush);
        drag(&mut s, (20.0, 20.0), (30.0, 30.0));
        assert_eq!(s.shapes().len(), 2);
        assert!(matches!(s.shapes()[0], Shape::Rect { .. }));
    }

    #[test]
    fn hit_test_prefers_topmost_rect() {
        let mut s = surface();
        s.set_mode(DrawMode::Rect);
        drag(&mut s, (0.0, 0.0), (100.0, 100.0));
        drag(&mut s, (20.0, 20.0), (60.0, 60.0));

        // Point inside both; the later rect wins and moves.
        drag(&mut s, (30.0, 30.0), (40.0, 30.0));
        assert_eq!(
            s.shapes()[1],
            Shape::Rect {
                x: 30.0,
                y: 20.0,
                w: 40.0,
                h: 40.0
            }
        );
        assert_eq!(
            s.shapes()[0],
            Shape::Rect {
                x: 0.0,
                y: 0.0,
                w: 100.0,
                h: 100.0
            }
        );
    }

    #[test]
    fn mode_switch_drops_in_progress_gesture() {
        let mut s = surface();
        s.pointer_down((0.0, 0.0));
        s.pointer_move((50.0, 50.0));
        s.set_mode(DrawMode::Rect);
        s.pointer_up((60.0, 60.0));

        assert!(s.shapes().is_empty());
        assert!(!s.can_undo());
    }

    #[test]
    fn clear_commits_empty_state_and_is_undoable() {
        let mut s = surface();
        drag(&mut s, (0.0, 0.0), (20.0, 20.0));
        drag(&mut s, (30.0, 30.0), (50.0, 50.0));

        s.clear();
        assert!(s.shapes().is_empty());
        assert!(s.can_undo());

        assert!(s.undo());
        assert_eq!(s.shapes().len(), 2);
        assert!(s.redo());
        assert!(s.shapes().is_empty());
    }

    #[test]
    fn load_image_resets_shapes_and_history() {
        let mut s = surface();
        drag(&mut s, (0.0, 0.0), (20.0, 20.0));
        assert!(s.can_undo());

        s.load_image(crate::annotate::model::PixelBuffer::new(
            4,
            4,
            crate::annotate::model::Rgba::BLACK,
        ));
        assert!(s.shapes().is_empty());
        assert!(!s.can_undo());
        assert!(!s.can_redo());
    }

    #[test]
    fn signals_fire_after_each_mutation() {
        let (tx, rx) = std::sync::mpsc::channel();
        let mut s = surface();
        s.set_signal_sink(tx);

        drag(&mut s, (0.0, 0.0), (20.0, 20.0));
        let signal = rx.try_recv().unwrap();
        assert!(signal.can_undo);
        assert!(!signal.can_redo);
        assert!(signal.has_marks);

        assert!(s.undo());
        let signal = rx.try_recv().unwrap();
        assert!(!signal.can_undo);
        assert!(signal.can_redo);
        assert!(!signal.has_marks);
    }

    #[test]
    fn discarded_rect_emits_no_signal() {
        let (tx, rx) = std::sync::mpsc::channel();
        let mut s = surface();
        s.set_signal_sink(tx);
        s.set_mode(DrawMode::Rect);
        drag(&mut s, (0.0, 0.0), (2.0, 2.0));

        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn single_point_tap_commits_a_dot() {
        let mut s = surface();
        s.pointer_down((5.0, 5.0));
        s.pointer_up((5.0, 5.0));

        let Shape::Stroke { points, .. } = &s.shapes()[0] else {
            panic!("expected stroke");
        };
        assert_eq!(points.len(), 1);
    }
}
