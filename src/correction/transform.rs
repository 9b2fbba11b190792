use nalgebra::{Rotation3, Unit, Vector3};

use crate::sky::wrap_two_pi;

/// Maps a pointing through a rotation about an arbitrary axis.
pub trait PointingCorrection: Sync {
    /// Corrected (az, el) for the rotation by `psi` about the axis at zenith
    /// angle `theta` and azimuthal angle `phi`. Everything in degrees.
    fn correct(&self, az: f64, el: f64, theta: f64, phi: f64, psi: f64) -> (f64, f64);
}

/// Right-handed rotation of topocentric unit vectors (x east, y north, z up).
#[derive(Debug, Clone, Copy, Default)]
pub struct AxisRotation;

impl AxisRotation {
    pub fn rotation(theta: f64, phi: f64, psi: f64) -> Rotation3<f64> {
        let (sin_t, cos_t) = theta.to_radians().sin_cos();
        let (sin_p, cos_p) = phi.to_radians().sin_cos();
        let axis = Vector3::new(sin_t * cos_p, sin_t * sin_p, cos_t);
        Rotation3::from_axis_angle(&Unit::new_normalize(axis), psi.to_radians())
    }
}

impl PointingCorrection for AxisRotation {
    fn correct(&self, az: f64, el: f64, theta: f64, phi: f64, psi: f64) -> (f64, f64) {
        let v = Self::rotation(theta, phi, psi) * azel_to_vector(az.to_radians(), el.to_radians());
        let (az, el) = vector_to_azel(&v);
        (az.to_degrees(), el.to_degrees())
    }
}

/// Unit vector for an azimuth (north through east) and elevation [rad].
pub fn azel_to_vector(az: f64, el: f64) -> Vector3<f64> {
    let (sin_az, cos_az) = az.sin_cos();
    let (sin_el, cos_el) = el.sin_cos();
    Vector3::new(cos_el * sin_az, cos_el * cos_az, sin_el)
}

pub fn vector_to_azel(v: &Vector3<f64>) -> (f64, f64) {
    let v = v.normalize();
    let az = wrap_two_pi(v.x.atan2(v.y));
    (az, v.z.clamp(-1.0, 1.0).asin())
}
