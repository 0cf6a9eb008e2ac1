use image::Rgba;
use rand::Rng;
use std::f64::consts::PI;
use std::str::FromStr;

use crate::error::SimError;

/// Eccentricities below this are treated as exactly circular.
const CIRCULAR_EPSILON: f64 = 1e-6;
/// Radius (Earth radii) custom satellites are launched from.
const CUSTOM_BASE_RADIUS: f64 = 1.5;

pub const RED: Rgba<u8> = Rgba([255, 0, 0, 255]);
pub const GREEN: Rgba<u8> = Rgba([0, 128, 0, 255]);
pub const BLUE: Rgba<u8> = Rgba([0, 0, 255, 255]);
pub const YELLOW: Rgba<u8> = Rgba([255, 255, 0, 255]);
pub const PURPLE: Rgba<u8> = Rgba([128, 0, 128, 255]);
pub const ORANGE: Rgba<u8> = Rgba([255, 165, 0, 255]);
pub const PINK: Rgba<u8> = Rgba([255, 192, 203, 255]);
pub const CYAN: Rgba<u8> = Rgba([0, 255, 255, 255]);
pub const MAGENTA: Rgba<u8> = Rgba([255, 0, 255, 255]);
pub const LIME: Rgba<u8> = Rgba([0, 255, 0, 255]);
pub const GOLD: Rgba<u8> = Rgba([255, 215, 0, 255]);

const IMAGINARY_COLORS: [Rgba<u8>; 5] = [CYAN, MAGENTA, LIME, ORANGE, GOLD];
const CUSTOM_COLORS: [Rgba<u8>; 7] = [RED, GREEN, BLUE, YELLOW, PURPLE, ORANGE, PINK];

/// How a satellite moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Motion {
    /// Fixed circular orbit, the angle advances at a constant rate
    Demo,
    /// Radial two-body dynamics with constant angular momentum
    TwoBody,
}

/// Outcome of one propagation step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrbitStatus {
    Orbiting,
    Crashed,
    Escaped,
}

/// Constants of the simplified two-body integrator.
#[derive(Debug, Clone, Copy)]
pub struct Dynamics {
    pub gm: f64,
    /// Scales radial acceleration for integrator stability
    pub radial_damping: f64,
    pub escape_radius: f64,
}

impl Default for Dynamics {
    fn default() -> Self {
        Self {
            gm: 1.0,
            radial_damping: 0.1,
            escape_radius: 50.0,
        }
    }
}

/// Conic section the satellite is currently on.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrbitShape {
    pub semi_latus_rectum: f64,
    pub eccentricity: f64,
    pub true_anomaly: f64,
    pub argument_of_periapsis: f64,
}

impl OrbitShape {
    pub fn radius_at(&self, f: f64) -> f64 {
        self.semi_latus_rectum / (1.0 + self.eccentricity * f.cos())
    }

    /// True anomaly range over which the conic has a positive radius.
    pub fn anomaly_range(&self) -> (f64, f64) {
        let e = self.eccentricity;
        if e < 1.0 {
            return (0.0, 2.0 * PI);
        }
        let limit = if (e - 1.0).abs() <= CIRCULAR_EPSILON {
            PI
        } else {
            (-1.0 / e).clamp(-1.0, 1.0).acos()
        };
        (-limit, limit)
    }
}

#[derive(Debug, Clone)]
pub struct Satellite {
    pub name: String,
    pub color: Rgba<u8>,
    pub motion: Motion,
    pub r: f64, // Earth radii
    pub angle: f64,
    pub effective_angle: f64,
    pub angular_speed: f64, // rad/s
    pub vr: f64,
    pub h: f64,
    pub speed_u: f64,
    pub speed_v: f64,
}

impl Satellite {
    fn demo(
        name: &str,
        color: Rgba<u8>,
        altitude: f64,
        angle: f64,
        speed_u: f64,
        speed_v: f64,
        angular_speed: f64,
    ) -> Self {
        let r = 1.0 + altitude / 200.0;
        Self {
            name: name.to_string(),
            color,
            motion: Motion::Demo,
            r,
            angle,
            effective_angle: speed_v.atan2(speed_u),
            angular_speed,
            vr: 0.0,
            h: angular_speed * r * r,
            speed_u,
            speed_v,
        }
    }

    /// Randomized circular satellite appended after `existing`.
    pub fn imaginary<R: Rng>(existing: &[Satellite], rng: &mut R) -> Self {
        let count = existing.len();
        let demo_count = existing.iter().filter(|s| s.is_demo()).count();
        let altitude = 100.0 + count as f64 * 20.0;
        let angular_speed = 0.1 + rng.gen::<f64>() * 0.1;

        let mut sat = Self::demo(
            &format!("Imaginary Sat {}", demo_count + 1),
            IMAGINARY_COLORS[count % IMAGINARY_COLORS.len()],
            altitude,
            rng.gen::<f64>() * 2.0 * PI,
            0.1,
            0.0,
            angular_speed,
        );
        sat.effective_angle = 0.0_f64.atan2(0.1);
        sat
    }

    /// Two-body satellite launched from the custom base radius.
    pub fn custom(orbit: OrbitType, name: Option<&str>, existing: usize, gm: f64) -> Self {
        let r = CUSTOM_BASE_RADIUS;
        let circular_speed = (gm / r).sqrt();
        let escape_speed = (2.0 * gm / r).sqrt();

        let (angular_speed, vr) = match orbit {
            OrbitType::Crash => (circular_speed * 0.5, -0.1),
            OrbitType::Stable => (circular_speed, 0.0),
            OrbitType::Escape => (escape_speed * 1.2, 0.05),
        };

        let name = match name.map(str::trim) {
            Some(n) if !n.is_empty() => n.to_string(),
            _ => format!("Custom Sat {}", existing + 1),
        };

        let mut sat = Self {
            name,
            color: CUSTOM_COLORS[existing % CUSTOM_COLORS.len()],
            motion: Motion::TwoBody,
            r,
            angle: PI / 2.0,
            effective_angle: 0.0,
            angular_speed,
            vr,
            h: angular_speed * r * r,
            speed_u: 0.1,
            speed_v: angular_speed - 0.1,
        };
        sat.effective_angle = PI / 2.0 - sat.shape(gm).true_anomaly;
        sat
    }

    pub fn is_demo(&self) -> bool {
        self.motion == Motion::Demo
    }

    pub fn type_label(&self) -> &'static str {
        match self.motion {
            Motion::Demo => "Default",
            Motion::TwoBody => "Custom",
        }
    }

    /// Current orbit shape from angular momentum, radius and radial velocity.
    pub fn shape(&self, gm: f64) -> OrbitShape {
        let h2 = self.h * self.h;
        let a = h2 / (gm * self.r) - 1.0;
        let b = self.vr * self.h / gm;
        let mut e = (a * a + b * b).sqrt();
        if e < CIRCULAR_EPSILON {
            e = 0.0;
        }
        let f = b.atan2(a);
        OrbitShape {
            semi_latus_rectum: h2 / gm,
            eccentricity: e,
            true_anomaly: f,
            argument_of_periapsis: self.angle - f,
        }
    }

    /// Advances the satellite by `dt` seconds.
    pub fn advance(&mut self, dt: f64, dynamics: &Dynamics) -> OrbitStatus {
        match self.motion {
            Motion::Demo => {
                self.angle += self.angular_speed * dt;
                OrbitStatus::Orbiting
            }
            Motion::TwoBody => {
                let gm = dynamics.gm;
                let a_r = self.h.powi(2) / self.r.powi(3) - gm / self.r.powi(2);
                self.vr += a_r * dt * dynamics.radial_damping;
                self.r += self.vr * dt;
                self.angular_speed = self.h / self.r.powi(2);
                self.angle += self.angular_speed * dt;

                if self.r <= 1.0 {
                    return OrbitStatus::Crashed;
                }
                if self.r > dynamics.escape_radius {
                    return OrbitStatus::Escaped;
                }

                self.effective_angle = self.angle - self.shape(gm).true_anomaly;
                OrbitStatus::Orbiting
            }
        }
    }

    /// Angular speed shown on a view of the given mode.
    pub fn speed_for(&self, mode: crate::view::ViewMode) -> f64 {
        use crate::view::ViewMode;
        match mode {
            ViewMode::Net => self.angular_speed,
            ViewMode::U => self.speed_u,
            ViewMode::V => self.speed_v,
        }
    }
}

/// The fixed satellites every simulation starts with.
pub fn demo_constellation() -> Vec<Satellite> {
    vec![
        Satellite::demo("Starlink-1", RED, 120.0, 0.0, 0.1, 0.0, 0.1),
        Satellite::demo("ISS", GREEN, 150.0, PI / 5.0, 0.1, 0.05, 0.15),
        Satellite::demo("OneWeb-1", BLUE, 180.0, 2.0 * PI / 5.0, 0.1, 0.1, 0.2),
        Satellite::demo("GPS-1", YELLOW, 210.0, 3.0 * PI / 5.0, 0.1, 0.15, 0.25),
        Satellite::demo("GEO-Sat-1", PURPLE, 240.0, 4.0 * PI / 5.0, 0.1, 0.2, 0.3),
    ]
}

/// Launch profile for a custom satellite.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrbitType {
    Crash,
    Stable,
    Escape,
}

impl OrbitType {
    pub fn description(&self) -> &'static str {
        match self {
            OrbitType::Crash => "Crashing orbit (spirals inward)",
            OrbitType::Stable => "Stable circular orbit",
            OrbitType::Escape => "Escaping hyperbolic orbit",
        }
    }
}

impl FromStr for OrbitType {
    type Err = SimError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "crash" => Ok(OrbitType::Crash),
            "stable" => Ok(OrbitType::Stable),
            "escape" => Ok(OrbitType::Escape),
            _ => Err(SimError::InvalidUserInput(
                "Invalid orbit type. Please enter \"crash\", \"stable\", or \"escape\".".to_string(),
            )),
        }
    }
}
