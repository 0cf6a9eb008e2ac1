//! Equirectangular Earth texture and orthographic disc rendering.
//!
//! A disc is rendered once per view and cached; trajectory overlays are
//! composited on top of the cached copy every frame.

use image::{Rgba, RgbaImage};
use std::f64::consts::PI;
use std::path::Path;
use tracing::info;

use crate::error::{Result, SimError};
use crate::observer::ReferenceFrame;
use crate::overlay::Label;

/// Shifts the texture seam onto the prime meridian. Tuned for the bundled
/// `2k_earth_daymap` asset; other textures may need a different value.
pub const LONGITUDE_CALIBRATION: f64 = 0.5 - 0.075;

pub const BACKGROUND: Rgba<u8> = Rgba([0, 0, 0, 255]);
pub const BORDER_COLOR: Rgba<u8> = Rgba([0x90, 0xca, 0xf9, 255]);
const HORIZON_COLOR: Rgba<u8> = Rgba([255, 255, 255, 255]);
const CENTER_MARKER: Rgba<u8> = Rgba([255, 0, 0, 255]);
const CENTER_MARKER_HALF_WIDTH: f64 = 0.02;

#[derive(Clone)]
pub struct EarthTexture {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<[u8; 4]>,
}

impl EarthTexture {
    pub fn load(path: &Path) -> Result<Self> {
        let img = image::open(path)
            .map_err(|e| SimError::AssetLoadFailure {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?
            .to_rgba8();
        info!(path = %path.display(), width = img.width(), height = img.height(), "loaded Earth texture");
        Self::from_image(&img).ok_or_else(|| SimError::AssetLoadFailure {
            path: path.to_path_buf(),
            reason: "texture has no pixels".to_string(),
        })
    }

    pub fn from_image(img: &RgbaImage) -> Option<Self> {
        if img.width() == 0 || img.height() == 0 {
            return None;
        }
        Some(Self {
            width: img.width(),
            height: img.height(),
            pixels: img.pixels().map(|p| p.0).collect(),
        })
    }

    /// Texel index for a point on the unit sphere: longitude wraps, latitude clamps.
    pub fn texel_index(&self, p: &nalgebra::Vector3<f64>) -> (u32, u32) {
        let tex_u = 0.5 - p.y.atan2(p.x) / (2.0 * PI) + LONGITUDE_CALIBRATION;
        let tex_v = p.z.clamp(-1.0, 1.0).asin() / PI + 0.5;

        let width = self.width as i64;
        let height = self.height as i64;
        let tx = ((tex_u * self.width as f64).floor() as i64).rem_euclid(width);
        let ty = (((1.0 - tex_v) * self.height as f64).floor() as i64).clamp(0, height - 1);
        (tx as u32, ty as u32)
    }

    pub fn sample(&self, p: &nalgebra::Vector3<f64>) -> [u8; 4] {
        let (tx, ty) = self.texel_index(p);
        self.pixels[(ty * self.width + tx) as usize]
    }
}

/// Geometry of one view's raster.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DiscGeometry {
    pub size: u32,
    pub earth_radius: f64,
    pub primary: bool,
}

impl DiscGeometry {
    pub fn center(&self) -> (f64, f64) {
        let c = self.size as f64 / 2.0;
        (c, c)
    }

    /// Normalized disc offset of pixel `(i, j)`; inside the disc when `x² + y² ≤ 1`.
    pub fn normalized(&self, i: u32, j: u32) -> (f64, f64) {
        let offset = (self.size as f64 - self.earth_radius * 2.0) / 2.0;
        let x = (i as f64 - offset) / self.earth_radius - 1.0;
        let y = (j as f64 - offset) / self.earth_radius - 1.0;
        (x, y)
    }
}

pub struct RenderedDisc {
    pub image: RgbaImage,
    pub labels: Vec<Label>,
}

/// Orthographic projection of the texture as seen from above `frame.c`.
///
/// Pure function of its inputs; identical arguments give identical bytes.
pub fn render_sphere(
    texture: &EarthTexture,
    frame: &ReferenceFrame,
    geometry: &DiscGeometry,
) -> RgbaImage {
    let mut image = RgbaImage::from_pixel(geometry.size, geometry.size, BACKGROUND);

    for j in 0..geometry.size {
        for i in 0..geometry.size {
            let (x, y) = geometry.normalized(i, j);
            let r2 = x * x + y * y;
            if r2 > 1.0 {
                continue;
            }

            if geometry.primary
                && x.abs() < CENTER_MARKER_HALF_WIDTH
                && y.abs() < CENTER_MARKER_HALF_WIDTH
            {
                image.put_pixel(i, j, CENTER_MARKER);
                continue;
            }

            let z = (1.0 - r2).sqrt();
            let p = frame.u * x + frame.v * y + frame.c * z;
            let [r, g, b, _] = texture.sample(&p);
            image.put_pixel(i, j, Rgba([r, g, b, 255]));
        }
    }

    image
}

/// Disc plus border ring and, on the primary view, the horizon ring and
/// compass labels.
pub fn render_disc(
    texture: &EarthTexture,
    frame: &ReferenceFrame,
    geometry: &DiscGeometry,
) -> RenderedDisc {
    let mut image = render_sphere(texture, frame, geometry);
    let (cx, cy) = geometry.center();
    let r = geometry.earth_radius;

    draw_ring(&mut image, cx, cy, r, 1.0, BORDER_COLOR);

    let mut labels = Vec::new();
    if geometry.primary {
        draw_ring(&mut image, cx, cy, r, 0.5, HORIZON_COLOR);
        labels = vec![
            Label::new("N", cx - 8.0, cy - r - 10.0, BORDER_COLOR),
            Label::new("E", cx + r + 10.0, cy + 5.0, BORDER_COLOR),
            Label::new("S", cx - 8.0, cy + r + 25.0, BORDER_COLOR),
            Label::new("W", cx - r - 25.0, cy + 5.0, BORDER_COLOR),
        ];
    }

    RenderedDisc { image, labels }
}

fn draw_ring(image: &mut RgbaImage, cx: f64, cy: f64, radius: f64, half_width: f64, color: Rgba<u8>) {
    let (width, height) = image.dimensions();
    for j in 0..height {
        for i in 0..width {
            let dx = i as f64 + 0.5 - cx;
            let dy = j as f64 + 0.5 - cy;
            if ((dx * dx + dy * dy).sqrt() - radius).abs() <= half_width {
                image.put_pixel(i, j, color);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 8x4 texture whose texels encode their own column and row.
    fn index_texture() -> EarthTexture {
        let img = RgbaImage::from_fn(8, 4, |x, y| Rgba([x as u8, y as u8, 7, 255]));
        EarthTexture::from_image(&img).unwrap()
    }

    fn geometry(primary: bool) -> DiscGeometry {
        DiscGeometry {
            size: 64,
            earth_radius: 30.0,
            primary,
        }
    }

    #[test]
    fn rendering_is_deterministic() {
        let texture = index_texture();
        let frame = ReferenceFrame::from_lat_lon(51.5, -0.1);
        let a = render_disc(&texture, &frame, &geometry(true));
        let b = render_disc(&texture, &frame, &geometry(true));
        assert_eq!(a.image.as_raw(), b.image.as_raw());
    }

    #[test]
    fn outside_the_disc_is_opaque_black() {
        let texture = index_texture();
        let frame = ReferenceFrame::from_lat_lon(-33.9, 18.4);
        let geom = geometry(false);
        let image = render_sphere(&texture, &frame, &geom);

        for (i, j, pixel) in image.enumerate_pixels() {
            let (x, y) = geom.normalized(i, j);
            if x * x + y * y > 1.0 {
                assert_eq!(*pixel, BACKGROUND, "pixel ({}, {})", i, j);
            } else {
                // Every disc pixel comes from a real texel
                assert!((pixel[0] as u32) < texture.width);
                assert!((pixel[1] as u32) < texture.height);
                assert_eq!(pixel[2], 7);
                assert_eq!(pixel[3], 255);
            }
        }
    }

    #[test]
    fn texel_index_wraps_and_clamps() {
        let texture = index_texture();
        let poles = [
            nalgebra::Vector3::new(0.0, 0.0, 1.0),
            nalgebra::Vector3::new(0.0, 0.0, -1.0),
            nalgebra::Vector3::new(-1.0, 0.0, 0.0),
            nalgebra::Vector3::new(-1.0, -1e-12, 0.0),
        ];
        for p in poles {
            let (tx, ty) = texture.texel_index(&p);
            assert!(tx < texture.width);
            assert!(ty < texture.height);
        }
        // North pole is the top row, south pole the bottom row
        assert_eq!(texture.texel_index(&poles[0]).1, 0);
        assert_eq!(texture.texel_index(&poles[1]).1, texture.height - 1);
    }

    #[test]
    fn primary_view_marks_the_centre_and_adds_compass_labels() {
        let texture = index_texture();
        let frame = ReferenceFrame::from_lat_lon(0.0, 0.0);

        let primary = render_disc(&texture, &frame, &geometry(true));
        assert_eq!(*primary.image.get_pixel(32, 32), CENTER_MARKER);
        let names: Vec<&str> = primary.labels.iter().map(|l| l.text.as_str()).collect();
        assert_eq!(names, ["N", "E", "S", "W"]);

        let side = render_disc(&texture, &frame, &geometry(false));
        assert_ne!(*side.image.get_pixel(32, 32), CENTER_MARKER);
        assert!(side.labels.is_empty());
    }

    #[test]
    fn border_ring_is_drawn() {
        let texture = index_texture();
        let frame = ReferenceFrame::from_lat_lon(0.0, 0.0);
        let disc = render_disc(&texture, &frame, &geometry(false));
        // Pixel straddling the ring on the horizontal axis
        assert_eq!(*disc.image.get_pixel(32 + 30, 31), BORDER_COLOR);
    }

    #[test]
    fn missing_texture_is_an_asset_failure() {
        let err = EarthTexture::load(Path::new("/nonexistent/earth.jpg")).err().unwrap();
        assert!(matches!(err, SimError::AssetLoadFailure { .. }));
    }
}
