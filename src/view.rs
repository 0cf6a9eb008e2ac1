//! Viewports and the projection of orbits into them.

use nalgebra::Vector3;
use std::f64::consts::PI;
use tracing::debug;

use crate::config::ViewsConfig;
use crate::observer::{direction_to_lat_lon, ReferenceFrame};
use crate::satellite::Satellite;
use crate::texture::DiscGeometry;

/// Which angular-speed component a view's legend shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewMode {
    Net,
    U,
    V,
}

impl ViewMode {
    pub fn label(&self) -> &'static str {
        match self {
            ViewMode::Net => "Net",
            ViewMode::U => "U-comp",
            ViewMode::V => "V-comp",
        }
    }
}

/// Immutable per-viewport configuration.
#[derive(Debug, Clone)]
pub struct ViewConfig {
    pub id: &'static str,
    /// Shared by all views, anchored at the observer
    pub orbit: ReferenceFrame,
    /// This view's look direction
    pub projection: ReferenceFrame,
    pub mode: ViewMode,
    pub geometry: DiscGeometry,
    pub center_lat: f64,
    pub center_lon: f64,
}

/// A 3D point mapped into a view's pixel space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProjectedPoint {
    pub px: f64,
    pub py: f64,
    /// Positive towards the viewer
    pub depth: f64,
}

impl ViewConfig {
    pub fn new(
        id: &'static str,
        orbit: ReferenceFrame,
        center_lat: f64,
        center_lon: f64,
        mode: ViewMode,
        geometry: DiscGeometry,
    ) -> Self {
        Self {
            id,
            orbit,
            projection: ReferenceFrame::from_lat_lon(center_lat, center_lon),
            mode,
            geometry,
            center_lat,
            center_lon,
        }
    }

    pub fn is_primary(&self) -> bool {
        self.geometry.primary
    }

    pub fn title(&self) -> Option<&'static str> {
        match self.mode {
            ViewMode::Net => None,
            ViewMode::U => Some("Side View (East-West)"),
            ViewMode::V => Some("Side View (North-South)"),
        }
    }

    /// Block caption: title, legend component and look direction.
    pub fn caption(&self) -> String {
        format!(
            "{} [{}] {:.1}°, {:.1}°",
            self.title().unwrap_or("Overhead View"),
            self.mode.label(),
            self.center_lat,
            self.center_lon
        )
    }

    pub fn project(&self, pos: &Vector3<f64>) -> ProjectedPoint {
        let x_proj = pos.dot(&self.projection.u);
        let y_proj = pos.dot(&self.projection.v);
        let z_proj = pos.dot(&self.projection.c);
        let (cx, cy) = self.geometry.center();
        let r = self.geometry.earth_radius;

        ProjectedPoint {
            px: cx + r * x_proj,
            py: cy - r * y_proj,
            depth: z_proj,
        }
    }

    /// In-plane direction perpendicular to the orbit frame's `c`, rotated by
    /// `effective_angle` from `u` towards `v`.
    pub fn orbit_direction(&self, effective_angle: f64) -> Vector3<f64> {
        let (s, c) = effective_angle.sin_cos();
        self.orbit.u * c + self.orbit.v * s
    }

    fn orbit_position(&self, radius: f64, phi: f64, dir: &Vector3<f64>) -> Vector3<f64> {
        let (s, c) = phi.sin_cos();
        (self.orbit.c * c + dir * s) * radius
    }

    /// Pixel position of the satellite, or `None` when it is behind the
    /// visible hemisphere.
    pub fn marker(&self, sat: &Satellite) -> Option<(f64, f64)> {
        if sat.r < 1.0 {
            return None;
        }
        let dir = self.orbit_direction(sat.effective_angle);
        let point = self.project(&self.orbit_position(sat.r, sat.angle, &dir));
        (point.depth >= 0.0).then_some((point.px, point.py))
    }

    /// Full orbit as drawable polyline segments.
    ///
    /// On the primary view, points behind the globe or inside the Earth end
    /// the current segment; side views draw everything with a positive radius.
    pub fn trajectory(&self, sat: &Satellite, gm: f64, step: f64) -> Vec<Vec<(f64, f64)>> {
        if sat.r < 1.0 {
            return Vec::new();
        }

        let dir = self.orbit_direction(sat.effective_angle);
        let mut path = PathBuilder::default();

        if sat.is_demo() {
            for phi in sweep(0.0, 2.0 * PI, step) {
                let point = self.project(&self.orbit_position(sat.r, phi, &dir));
                if self.is_primary() && point.depth < 0.0 {
                    path.break_segment();
                } else {
                    path.push(point.px, point.py);
                }
            }
        } else {
            let shape = sat.shape(gm);
            let (f_min, f_max) = shape.anomaly_range();
            for f in sweep(f_min, f_max, step) {
                let radius = shape.radius_at(f);
                if !radius.is_finite() || radius <= 0.0 || (radius < 1.0 && self.is_primary()) {
                    path.break_segment();
                    continue;
                }
                let phi = shape.argument_of_periapsis + f;
                let point = self.project(&self.orbit_position(radius, phi, &dir));
                if self.is_primary() && point.depth < 0.0 {
                    path.break_segment();
                } else {
                    path.push(point.px, point.py);
                }
            }
        }

        path.finish()
    }
}

/// `start, start + step, ...` up to and including `end`.
fn sweep(start: f64, end: f64, step: f64) -> impl Iterator<Item = f64> {
    let steps = if step > 0.0 && end >= start {
        ((end - start) / step).floor() as usize
    } else {
        0
    };
    (0..=steps).map(move |k| start + k as f64 * step)
}

#[derive(Default)]
struct PathBuilder {
    segments: Vec<Vec<(f64, f64)>>,
    current: Vec<(f64, f64)>,
}

impl PathBuilder {
    fn push(&mut self, x: f64, y: f64) {
        self.current.push((x, y));
    }

    fn break_segment(&mut self) {
        if !self.current.is_empty() {
            self.segments.push(std::mem::take(&mut self.current));
        }
    }

    fn finish(mut self) -> Vec<Vec<(f64, f64)>> {
        self.break_segment();
        self.segments
    }
}

/// The nadir view at the observer plus the two side views looking along
/// the orbit frame's `u` and `v` axes.
pub fn build_views(orbit: &ReferenceFrame, lat: f64, lon: f64, config: &ViewsConfig) -> Vec<ViewConfig> {
    let primary = DiscGeometry {
        size: config.primary_size,
        earth_radius: config.primary_radius,
        primary: true,
    };
    let side = DiscGeometry {
        size: config.side_size,
        earth_radius: config.side_radius,
        primary: false,
    };

    let (u_lat, u_lon) = direction_to_lat_lon(&orbit.u);
    let (v_lat, v_lon) = direction_to_lat_lon(&orbit.v);
    debug!(u_lat, u_lon, v_lat, v_lon, "side view centres");

    vec![
        ViewConfig::new("main", *orbit, lat, lon, ViewMode::Net, primary),
        ViewConfig::new("second", *orbit, u_lat, u_lon, ViewMode::U, side),
        ViewConfig::new("third", *orbit, v_lat, v_lon, ViewMode::V, side),
    ]
}
