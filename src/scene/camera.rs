use crate::layout::Point3;
use crate::mesh::Bounds;

/// Canonical viewing direction: looking down the long axis from its
/// positive end, superior side up.
pub const DIRECTION_OF_PROJECTION: Point3 = [0.0, 0.0, -1.0];
pub const VIEW_UP: Point3 = [0.0, 1.0, 0.0];
pub const VIEW_ANGLE_DEGREES: f64 = 30.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    pub position: Point3,
    pub focal_point: Point3,
    pub view_up: Point3,
    pub view_angle: f64,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            position: [0.0, 0.0, 1.0],
            focal_point: [0.0; 3],
            view_up: VIEW_UP,
            view_angle: VIEW_ANGLE_DEGREES,
        }
    }
}

impl Camera {
    /// Camera looking along the canonical direction at the centre of
    /// `bounds`, backed off until the bounding sphere fills the view angle.
    pub fn framing(bounds: &Bounds) -> Self {
        let mut radius = bounds.diagonal() / 2.0;
        if radius <= 0.0 {
            radius = 0.5;
        }
        let half_angle = (VIEW_ANGLE_DEGREES / 2.0).to_radians();
        let distance = radius / half_angle.sin();
        let focal_point = bounds.center();
        let position =
            [0, 1, 2].map(|i| focal_point[i] - DIRECTION_OF_PROJECTION[i] * distance);
        Self {
            position,
            focal_point,
            view_up: VIEW_UP,
            view_angle: VIEW_ANGLE_DEGREES,
        }
    }

    pub fn distance(&self) -> f64 {
        (0..3)
            .map(|i| (self.position[i] - self.focal_point[i]).powi(2))
            .sum::<f64>()
            .sqrt()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn framing_centres_on_bounds() {
        let bounds = Bounds {
            min: [-1.0, -2.0, -3.0],
            max: [1.0, 2.0, 3.0],
        };
        let camera = Camera::framing(&bounds);
        assert_eq!(camera.focal_point, [0.0, 0.0, 0.0]);
        assert_eq!(camera.position[0], 0.0);
        assert!(camera.position[2] > 3.0);
        let expected = (56.0f64.sqrt() / 2.0) / 15.0f64.to_radians().sin();
        assert!((camera.distance() - expected).abs() < 1e-9);
    }

    #[test]
    fn framing_is_independent_of_prior_camera() {
        let bounds = Bounds {
            min: [0.0; 3],
            max: [4.0, 4.0, 4.0],
        };
        assert_eq!(Camera::framing(&bounds), Camera::framing(&bounds));
    }

    #[test]
    fn degenerate_bounds_still_frame() {
        let bounds = Bounds {
            min: [2.0; 3],
            max: [2.0; 3],
        };
        let camera = Camera::framing(&bounds);
        assert!(camera.distance() > 0.0);
        assert_eq!(camera.focal_point, [2.0; 3]);
    }
}
