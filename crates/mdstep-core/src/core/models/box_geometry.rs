use nalgebra::{Point3, Vector3};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum BoxError {
    #[error("Box length along {axis} must be positive, got {value}")]
    NonPositiveLength { axis: char, value: f64 },
}

/// Spatial dimensionality of the simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Dimensions {
    Two,
    #[default]
    Three,
}

impl Dimensions {
    #[inline]
    pub fn count(self) -> u32 {
        match self {
            Dimensions::Two => 2,
            Dimensions::Three => 3,
        }
    }
}

/// An orthorhombic periodic cell centred on the origin.
///
/// Coordinates inside the primary image lie in `[-L/2, L/2)` along each periodic axis. In a
/// two-dimensional simulation the third axis is carried along but never wrapped, and the
/// "volume" is the area of the x-y face.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoxGeometry {
    lengths: Vector3<f64>,
    dimensions: Dimensions,
}

impl BoxGeometry {
    pub fn new(lx: f64, ly: f64, lz: f64, dimensions: Dimensions) -> Result<Self, BoxError> {
        for (axis, value) in [('x', lx), ('y', ly), ('z', lz)] {
            if value.is_nan() || value <= 0.0 {
                return Err(BoxError::NonPositiveLength { axis, value });
            }
        }
        Ok(Self {
            lengths: Vector3::new(lx, ly, lz),
            dimensions,
        })
    }

    pub fn cubic(length: f64) -> Result<Self, BoxError> {
        Self::new(length, length, length, Dimensions::Three)
    }

    pub fn lengths(&self) -> &Vector3<f64> {
        &self.lengths
    }

    pub fn dimensions(&self) -> Dimensions {
        self.dimensions
    }

    #[inline]
    fn periodic_axes(&self) -> usize {
        self.dimensions.count() as usize
    }

    /// Volume of the cell, or its x-y area in two dimensions.
    pub fn volume(&self) -> f64 {
        match self.dimensions {
            Dimensions::Two => self.lengths.x * self.lengths.y,
            Dimensions::Three => self.lengths.x * self.lengths.y * self.lengths.z,
        }
    }

    /// Maps a raw displacement to its minimum-image equivalent.
    #[inline]
    pub fn min_image(&self, mut delta: Vector3<f64>) -> Vector3<f64> {
        for axis in 0..self.periodic_axes() {
            let length = self.lengths[axis];
            delta[axis] -= length * (delta[axis] / length).round();
        }
        delta
    }

    /// Minimum-image displacement pointing from `to` towards `from`.
    #[inline]
    pub fn displacement(&self, from: &Point3<f64>, to: &Point3<f64>) -> Vector3<f64> {
        self.min_image(from - to)
    }

    /// Folds a position back into the primary image, counting crossings in `image`.
    pub fn wrap(&self, position: &mut Point3<f64>, image: &mut Vector3<i32>) {
        for axis in 0..self.periodic_axes() {
            let length = self.lengths[axis];
            let shift = (position[axis] / length).round();
            if shift != 0.0 {
                position[axis] -= shift * length;
                image[axis] += shift as i32;
            }
            if position[axis] >= 0.5 * length {
                position[axis] -= length;
                image[axis] += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOLERANCE: f64 = 1e-12;

    #[test]
    fn new_rejects_non_positive_lengths() {
        assert_eq!(
            BoxGeometry::new(1.0, 0.0, 1.0, Dimensions::Three),
            Err(BoxError::NonPositiveLength {
                axis: 'y',
                value: 0.0
            })
        );
        assert!(BoxGeometry::new(1.0, 1.0, -2.0, Dimensions::Three).is_err());
        assert!(BoxGeometry::new(f64::NAN, 1.0, 1.0, Dimensions::Three).is_err());
    }

    #[test]
    fn volume_uses_area_in_two_dimensions() {
        let box3 = BoxGeometry::new(2.0, 3.0, 4.0, Dimensions::Three).unwrap();
        let box2 = BoxGeometry::new(2.0, 3.0, 4.0, Dimensions::Two).unwrap();
        assert_eq!(box3.volume(), 24.0);
        assert_eq!(box2.volume(), 6.0);
    }

    #[test]
    fn min_image_maps_each_axis_into_half_box() {
        let b = BoxGeometry::new(10.0, 8.0, 6.0, Dimensions::Three).unwrap();
        let d = b.min_image(Vector3::new(9.0, -7.0, 2.0));
        assert!((d - Vector3::new(-1.0, 1.0, 2.0)).norm() < TOLERANCE);
    }

    #[test]
    fn min_image_ignores_third_axis_in_two_dimensions() {
        let b = BoxGeometry::new(10.0, 10.0, 1.0, Dimensions::Two).unwrap();
        let d = b.min_image(Vector3::new(9.0, 0.0, 5.0));
        assert!((d - Vector3::new(-1.0, 0.0, 5.0)).norm() < TOLERANCE);
    }

    #[test]
    fn min_image_is_invariant_under_whole_box_shifts() {
        let b = BoxGeometry::cubic(5.0).unwrap();
        let d = Vector3::new(1.25, -2.0, 0.5);
        let shifted = d + Vector3::new(10.0, -5.0, 15.0);
        assert!((b.min_image(d) - b.min_image(shifted)).norm() < TOLERANCE);
    }

    #[test]
    fn wrap_folds_position_and_counts_images() {
        let b = BoxGeometry::cubic(10.0).unwrap();
        let mut pos = Point3::new(6.0, -13.0, 4.0);
        let mut image = Vector3::zeros();
        b.wrap(&mut pos, &mut image);
        assert!((pos - Point3::new(-4.0, -3.0, 4.0)).norm() < TOLERANCE);
        assert_eq!(image, Vector3::new(1, -1, 0));
    }

    #[test]
    fn wrap_keeps_upper_boundary_exclusive() {
        let b = BoxGeometry::cubic(10.0).unwrap();
        let mut pos = Point3::new(5.0, 0.0, 0.0);
        let mut image = Vector3::zeros();
        b.wrap(&mut pos, &mut image);
        assert_eq!(pos.x, -5.0);
        assert_eq!(image.x, 1);
    }
}
