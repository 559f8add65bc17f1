//! Geo-projection from the gantry's planar frame into UTM.
//!
//! The pipeline treats projection as a seam: the merger only needs a pure,
//! deterministic mapping from a planar anchor coordinate pair to a
//! georeferenced pair. [`AffineUtm`] is the mapping used by the production
//! rig, a fixed affine transform into UTM zone 12N fitted for the field the
//! gantry is installed over.

use thiserror::Error;

/// Errors that can occur during projection.
#[derive(Error, Debug)]
pub enum ProjectionError {
    #[error("cannot project non-finite coordinate ({x}, {y})")]
    NonFinite { x: f64, y: f64 },
}

/// A pure mapping from planar gantry coordinates to georeferenced ones.
///
/// Implementations must be deterministic and side-effect free.
pub trait GeoProjection {
    /// Project a planar (x, y) pair in meters into the georeferenced frame.
    fn project(&self, x: f64, y: f64) -> Result<(f64, f64), ProjectionError>;
}

/// UTM easting intercept of the fitted gantry transform, meters.
const UTM_X_INTERCEPT_M: f64 = 409_012.2032;
/// UTM northing intercept of the fitted gantry transform, meters.
const UTM_Y_INTERCEPT_M: f64 = 3_659_974.971;
/// Easting coefficient on gantry x.
const UTM_X_COEFF_X: f64 = 0.009;
/// Easting coefficient on gantry y.
const UTM_X_COEFF_Y: f64 = -0.9986;
/// Northing coefficient on gantry x.
const UTM_Y_COEFF_X: f64 = 1.0002;
/// Northing coefficient on gantry y.
const UTM_Y_COEFF_Y: f64 = 0.0078;

/// Fixed affine gantry-to-UTM-12N transform.
///
/// `utm_x = ax + bx*x + cx*y`, `utm_y = ay + by*x + cy*y`. The coefficients
/// are empirically fitted for the installed rig and must be re-derived if
/// the rig is ever moved.
#[derive(Debug, Clone)]
pub struct AffineUtm {
    pub ax: f64,
    pub bx: f64,
    pub cx: f64,
    pub ay: f64,
    pub by: f64,
    pub cy: f64,
}

impl Default for AffineUtm {
    fn default() -> Self {
        Self {
            ax: UTM_X_INTERCEPT_M,
            bx: UTM_X_COEFF_X,
            cx: UTM_X_COEFF_Y,
            ay: UTM_Y_INTERCEPT_M,
            by: UTM_Y_COEFF_X,
            cy: UTM_Y_COEFF_Y,
        }
    }
}

impl GeoProjection for AffineUtm {
    fn project(&self, x: f64, y: f64) -> Result<(f64, f64), ProjectionError> {
        if !x.is_finite() || !y.is_finite() {
            return Err(ProjectionError::NonFinite { x, y });
        }

        let utm_x = self.ax + self.bx * x + self.cx * y;
        let utm_y = self.ay + self.by * x + self.cy * y;

        Ok((utm_x, utm_y))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_project_origin() {
        let proj = AffineUtm::default();
        let (x, y) = proj.project(0.0, 0.0).unwrap();
        assert_eq!(x, 409_012.2032);
        assert_eq!(y, 3_659_974.971);
    }

    #[test]
    fn test_project_known_point() {
        let proj = AffineUtm::default();
        let (x, y) = proj.project(10.0, 20.0).unwrap();
        assert!((x - (409_012.2032 + 0.09 - 19.972)).abs() < 1e-9);
        assert!((y - (3_659_974.971 + 10.002 + 0.156)).abs() < 1e-9);
    }

    #[test]
    fn test_project_deterministic() {
        let proj = AffineUtm::default();
        let a = proj.project(3.25, -7.5).unwrap();
        let b = proj.project(3.25, -7.5).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_project_rejects_non_finite() {
        let proj = AffineUtm::default();
        assert!(proj.project(f64::NAN, 0.0).is_err());
        assert!(proj.project(0.0, f64::INFINITY).is_err());
    }
}
