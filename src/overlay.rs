//! Per-frame overlay: trajectories and satellite markers composited over a
//! view's cached Earth disc.

use image::{Rgba, RgbaImage};

use crate::satellite::Satellite;
use crate::texture::RenderedDisc;
use crate::view::ViewConfig;

const STROKE_WIDTH: f64 = 2.0;
const MARKER_RADIUS: f64 = 5.0;
const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);

/// Text anchored at a pixel position, drawn by whatever displays the raster.
#[derive(Debug, Clone, PartialEq)]
pub struct Label {
    pub text: String,
    pub x: f64,
    pub y: f64,
    pub color: Rgba<u8>,
}

impl Label {
    pub fn new(text: impl Into<String>, x: f64, y: f64, color: Rgba<u8>) -> Self {
        Self {
            text: text.into(),
            x,
            y,
            color,
        }
    }
}

/// Composited output for one view.
pub struct ViewFrame {
    pub image: RgbaImage,
    pub labels: Vec<Label>,
}

/// Disc background plus every satellite's trajectory, without markers.
pub fn trajectory_layer(
    disc: &RenderedDisc,
    view: &ViewConfig,
    satellites: &[Satellite],
    gm: f64,
    step: f64,
) -> ViewFrame {
    let mut image = disc.image.clone();
    let mut labels = disc.labels.clone();

    for sat in satellites {
        for segment in view.trajectory(sat, gm, step) {
            stroke_polyline(&mut image, &segment, STROKE_WIDTH, sat.color);
        }
    }

    if let Some(title) = view.title() {
        labels.push(Label::new(title, 10.0, 20.0, WHITE));
        let legend_x = (view.geometry.size as f64 - 250.0).max(10.0);
        for (i, sat) in satellites.iter().enumerate() {
            labels.push(Label::new(
                format!("{}: {:.3} rad/s", sat.name, sat.speed_for(view.mode)),
                legend_x,
                50.0 + i as f64 * 25.0,
                sat.color,
            ));
        }
    }

    ViewFrame { image, labels }
}

/// Satellite markers over a trajectory layer.
pub fn draw_markers(layer: &ViewFrame, view: &ViewConfig, satellites: &[Satellite]) -> ViewFrame {
    let mut image = layer.image.clone();
    let mut labels = layer.labels.clone();

    for sat in satellites {
        if let Some((px, py)) = view.marker(sat) {
            fill_circle(&mut image, px, py, MARKER_RADIUS, sat.color);
            if view.is_primary() {
                labels.push(Label::new(sat.name.clone(), px, py - 8.0, WHITE));
            }
        }
    }

    ViewFrame { image, labels }
}

/// Strokes `points` and returns how many brush stamps were drawn.
///
/// Each segment is clipped to the image first, so far-away points (conic
/// paths near their asymptotes) cost no more than the raster diagonal.
pub fn stroke_polyline(
    image: &mut RgbaImage,
    points: &[(f64, f64)],
    width: f64,
    color: Rgba<u8>,
) -> usize {
    let radius = width / 2.0;
    if let [(x, y)] = points {
        fill_circle(image, *x, *y, radius, color);
        return 1;
    }

    let (w, h) = image.dimensions();
    let bounds = (-radius, -radius, w as f64 + radius, h as f64 + radius);
    let mut stamps = 0;
    for pair in points.windows(2) {
        let Some(((x0, y0), (x1, y1))) = clip_segment(pair[0], pair[1], bounds) else {
            continue;
        };
        let length = ((x1 - x0).powi(2) + (y1 - y0).powi(2)).sqrt();
        let steps = (length * 2.0).ceil().max(1.0) as usize;
        for k in 0..=steps {
            let t = k as f64 / steps as f64;
            fill_circle(image, x0 + (x1 - x0) * t, y0 + (y1 - y0) * t, radius, color);
        }
        stamps += steps + 1;
    }
    stamps
}

const LEFT: u8 = 1;
const RIGHT: u8 = 2;
const TOP: u8 = 4;
const BOTTOM: u8 = 8;

/// Clips the segment `a`-`b` to `(x_min, y_min, x_max, y_max)`.
///
/// Cohen-Sutherland, with each edge intersection measured from the opposite
/// endpoint so that a far-away point does not swamp the result.
pub fn clip_segment(
    a: (f64, f64),
    b: (f64, f64),
    bounds: (f64, f64, f64, f64),
) -> Option<((f64, f64), (f64, f64))> {
    if ![a.0, a.1, b.0, b.1].iter().all(|v| v.is_finite()) {
        return None;
    }
    let (x_min, y_min, x_max, y_max) = bounds;
    let outcode = |(x, y): (f64, f64)| {
        let mut code = 0;
        if x < x_min {
            code |= LEFT;
        } else if x > x_max {
            code |= RIGHT;
        }
        if y < y_min {
            code |= TOP;
        } else if y > y_max {
            code |= BOTTOM;
        }
        code
    };

    let (mut p, mut q) = (a, b);
    // Every pass pins one coordinate to an edge
    for _ in 0..8 {
        let (code_p, code_q) = (outcode(p), outcode(q));
        if code_p | code_q == 0 {
            break;
        }
        if code_p & code_q != 0 {
            return None;
        }
        let (out, other, code) = if code_p != 0 {
            (p, q, code_p)
        } else {
            (q, p, code_q)
        };
        let (dx, dy) = (out.0 - other.0, out.1 - other.1);
        let clipped = if code & TOP != 0 {
            (other.0 + dx * (y_min - other.1) / dy, y_min)
        } else if code & BOTTOM != 0 {
            (other.0 + dx * (y_max - other.1) / dy, y_max)
        } else if code & LEFT != 0 {
            (x_min, other.1 + dy * (x_min - other.0) / dx)
        } else {
            (x_max, other.1 + dy * (x_max - other.0) / dx)
        };
        if code_p != 0 {
            p = clipped;
        } else {
            q = clipped;
        }
    }

    let clamp = |(x, y): (f64, f64)| (x.clamp(x_min, x_max), y.clamp(y_min, y_max));
    Some((clamp(p), clamp(q)))
}

/// Fills pixels whose centres lie within `radius` of `(cx, cy)`. Clipped
/// to the image bounds.
pub fn fill_circle(image: &mut RgbaImage, cx: f64, cy: f64, radius: f64, color: Rgba<u8>) {
    if !cx.is_finite() || !cy.is_finite() {
        return;
    }
    let (width, height) = image.dimensions();
    let x_min = (cx - radius).floor().max(0.0);
    let y_min = (cy - radius).floor().max(0.0);
    let x_max = (cx + radius).ceil().min(width as f64 - 1.0);
    let y_max = (cy + radius).ceil().min(height as f64 - 1.0);
    if x_min > x_max || y_min > y_max {
        return;
    }

    for j in y_min as u32..=y_max as u32 {
        for i in x_min as u32..=x_max as u32 {
            let dx = i as f64 + 0.5 - cx;
            let dy = j as f64 + 0.5 - cy;
            if dx * dx + dy * dy <= radius * radius {
                image.put_pixel(i, j, color);
            }
        }
    }
}
