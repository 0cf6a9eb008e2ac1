use nalgebra::Vector3;
use serde::Deserialize;
use tracing::{debug, info};

use crate::error::{Result, SimError};

/// Orthonormal frame anchored at a point on the unit sphere.
///
/// `c` points from the Earth's centre out through the surface point, `u` is
/// the eastward tangent and `v` completes the frame. The sign conventions set
/// the on-screen orientation of every view and must not be flipped.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReferenceFrame {
    pub c: Vector3<f64>,
    pub u: Vector3<f64>,
    pub v: Vector3<f64>,
}

impl ReferenceFrame {
    pub fn from_lat_lon(lat: f64, lon: f64) -> Self {
        let lat_rad = lat.to_radians();
        let lon_rad = lon.to_radians();
        let (slat, clat) = lat_rad.sin_cos();
        let (slon, clon) = lon_rad.sin_cos();

        Self {
            c: Vector3::new(clat * clon, clat * slon, slat),
            u: Vector3::new(slon, -clon, 0.0),
            v: Vector3::new(slat * clon, slat * slon, -clat),
        }
    }
}

/// Latitude and longitude (degrees) of the surface point a unit vector passes through.
pub fn direction_to_lat_lon(d: &Vector3<f64>) -> (f64, f64) {
    (d.z.asin().to_degrees(), d.y.atan2(d.x).to_degrees())
}

/// A resolved device location.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoFix {
    pub latitude: f64,  // degrees
    pub longitude: f64, // degrees
}

impl GeoFix {
    pub fn new(latitude: f64, longitude: f64) -> Result<Self> {
        if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
            return Err(SimError::LocationUnavailable(format!(
                "coordinates out of range: lat {}, lon {}",
                latitude, longitude
            )));
        }
        Ok(Self {
            latitude,
            longitude,
        })
    }
}

pub struct Observer {
    pub name: String,
    pub latitude: f64,  // degrees
    pub longitude: f64, // degrees
}

impl Observer {
    pub fn new(name: String, fix: GeoFix) -> Self {
        Self {
            name,
            latitude: fix.latitude,
            longitude: fix.longitude,
        }
    }

    /// Frame shared by every satellite's orbital plane
    pub fn frame(&self) -> ReferenceFrame {
        ReferenceFrame::from_lat_lon(self.latitude, self.longitude)
    }

    pub fn location_text(&self) -> String {
        format!(
            "User Location: Lat {:.2}°, Lon {:.2}°",
            self.latitude, self.longitude
        )
    }
}

/// Source of the observer's position. Resolves to a fix or to
/// [`SimError::LocationUnavailable`].
pub trait LocationProvider {
    fn locate(&self) -> Result<GeoFix>;
}

/// Coordinates given on the command line or in the config file.
pub struct FixedLocation {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl LocationProvider for FixedLocation {
    fn locate(&self) -> Result<GeoFix> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lon)) => GeoFix::new(lat, lon),
            _ => Err(SimError::LocationUnavailable(
                "no latitude/longitude configured (use --lat/--lon or --locate ip)".to_string(),
            )),
        }
    }
}

/// Looks the location up from the public IP address.
pub struct IpLocation {
    pub url: String,
}

#[derive(Debug, Deserialize)]
struct IpLookupResponse {
    status: Option<String>,
    message: Option<String>,
    lat: Option<f64>,
    lon: Option<f64>,
}

impl IpLookupResponse {
    fn into_fix(self) -> Result<GeoFix> {
        if let Some(status) = &self.status {
            if status != "success" {
                let reason = self.message.unwrap_or_else(|| status.clone());
                return Err(SimError::LocationUnavailable(reason));
            }
        }
        match (self.lat, self.lon) {
            (Some(lat), Some(lon)) => GeoFix::new(lat, lon),
            _ => Err(SimError::LocationUnavailable(
                "lookup response has no coordinates".to_string(),
            )),
        }
    }
}

impl LocationProvider for IpLocation {
    fn locate(&self) -> Result<GeoFix> {
        debug!(url = %self.url, "requesting IP geolocation");
        let response: IpLookupResponse = ureq::get(&self.url)
            .call()
            .map_err(|e| SimError::LocationUnavailable(e.to_string()))?
            .into_json()
            .map_err(|e| SimError::LocationUnavailable(e.to_string()))?;

        let fix = response.into_fix()?;
        info!(lat = fix.latitude, lon = fix.longitude, "IP geolocation resolved");
        Ok(fix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn assert_orthonormal(frame: &ReferenceFrame) {
        for axis in [&frame.c, &frame.u, &frame.v] {
            assert_abs_diff_eq!(axis.norm(), 1.0, epsilon = 1e-9);
        }
        assert_abs_diff_eq!(frame.c.dot(&frame.u), 0.0, epsilon = 1e-9);
        assert_abs_diff_eq!(frame.c.dot(&frame.v), 0.0, epsilon = 1e-9);
        assert_abs_diff_eq!(frame.u.dot(&frame.v), 0.0, epsilon = 1e-9);
    }

    #[test]
    fn frame_is_orthonormal_everywhere() {
        let mut lat = -90.0;
        while lat <= 90.0 {
            let mut lon = -180.0;
            while lon <= 180.0 {
                assert_orthonormal(&ReferenceFrame::from_lat_lon(lat, lon));
                lon += 7.5;
            }
            lat += 5.0;
        }
    }

    #[test]
    fn frame_at_null_island() {
        let frame = ReferenceFrame::from_lat_lon(0.0, 0.0);
        assert_abs_diff_eq!((frame.c - Vector3::new(1.0, 0.0, 0.0)).norm(), 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!((frame.u - Vector3::new(0.0, -1.0, 0.0)).norm(), 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!((frame.v - Vector3::new(0.0, 0.0, -1.0)).norm(), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn centre_of_a_direction_round_trips() {
        let frame = ReferenceFrame::from_lat_lon(40.0, -75.0);
        let (lat, lon) = direction_to_lat_lon(&frame.c);
        assert_abs_diff_eq!(lat, 40.0, epsilon = 1e-9);
        assert_abs_diff_eq!(lon, -75.0, epsilon = 1e-9);

        // U lies on the equator
        let (lat_u, _) = direction_to_lat_lon(&frame.u);
        assert_abs_diff_eq!(lat_u, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn fixed_location_requires_both_coordinates() {
        let provider = FixedLocation {
            latitude: Some(10.0),
            longitude: None,
        };
        assert!(matches!(
            provider.locate(),
            Err(SimError::LocationUnavailable(_))
        ));

        let provider = FixedLocation {
            latitude: Some(10.0),
            longitude: Some(20.0),
        };
        assert_eq!(provider.locate().unwrap(), GeoFix::new(10.0, 20.0).unwrap());
    }

    #[test]
    fn out_of_range_fix_is_rejected() {
        assert!(GeoFix::new(91.0, 0.0).is_err());
        assert!(GeoFix::new(0.0, -181.0).is_err());
    }

    #[test]
    fn failed_ip_lookup_is_location_unavailable() {
        let response = IpLookupResponse {
            status: Some("fail".to_string()),
            message: Some("private range".to_string()),
            lat: None,
            lon: None,
        };
        match response.into_fix() {
            Err(SimError::LocationUnavailable(reason)) => assert_eq!(reason, "private range"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn location_text_format() {
        let observer = Observer::new("Home".to_string(), GeoFix::new(12.346, -7.0).unwrap());
        assert_eq!(observer.location_text(), "User Location: Lat 12.35°, Lon -7.00°");
    }
}
