//! Capture volume shapes

use crate::math::{Pose, Vec3};
use crate::physics_constants::units::{inches, inches_vec};
use nalgebra::Point3;
use serde::{Deserialize, Serialize};

/// Overlap volume, sized in inches in config and metres at runtime.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum VolumeShape {
    Sphere { radius: f32 },
    Box { half_extents: [f32; 3] },
}

impl VolumeShape {
    /// Convert an inch-sized shape into metres.
    pub fn to_metres(self) -> Self {
        match self {
            VolumeShape::Sphere { radius } => VolumeShape::Sphere { radius: inches(radius) },
            VolumeShape::Box { half_extents } => {
                let m = inches_vec(half_extents);
                VolumeShape::Box { half_extents: [m.x, m.y, m.z] }
            }
        }
    }

    /// Does a ball of `margin` radius at `point` touch this volume placed at `pose`?
    pub fn overlaps(&self, pose: &Pose, point: &Vec3, margin: f32) -> bool {
        let local = pose.inverse_transform_point(&Point3::from(*point)).coords;
        match self {
            VolumeShape::Sphere { radius } => local.norm() <= radius + margin,
            VolumeShape::Box { half_extents } => {
                local.x.abs() <= half_extents[0] + margin
                    && local.y.abs() <= half_extents[1] + margin
                    && local.z.abs() <= half_extents[2] + margin
            }
        }
    }

    pub fn is_valid(&self) -> bool {
        match self {
            VolumeShape::Sphere { radius } => *radius > 0.0,
            VolumeShape::Box { half_extents } => half_extents.iter().all(|h| *h > 0.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::{pose, Quat};

    #[test]
    fn test_sphere_overlap_with_margin() {
        let shape = VolumeShape::Sphere { radius: 1.0 };
        let at = pose(Vec3::new(5.0, 0.0, 0.0), Quat::identity());
        assert!(shape.overlaps(&at, &Vec3::new(5.9, 0.0, 0.0), 0.0));
        assert!(!shape.overlaps(&at, &Vec3::new(6.2, 0.0, 0.0), 0.0));
        assert!(shape.overlaps(&at, &Vec3::new(6.2, 0.0, 0.0), 0.25));
    }

    #[test]
    fn test_box_overlap_and_conversion() {
        let shape = VolumeShape::Box { half_extents: [10.0, 1.0, 1.0] }.to_metres();
        let at = Pose::identity();
        assert!(shape.overlaps(&at, &Vec3::new(inches(9.0), 0.0, 0.0), 0.0));
        assert!(!shape.overlaps(&at, &Vec3::new(0.0, inches(2.0), 0.0), 0.0));
        assert!(shape.is_valid());
        assert!(!VolumeShape::Sphere { radius: 0.0 }.is_valid());
    }
}
