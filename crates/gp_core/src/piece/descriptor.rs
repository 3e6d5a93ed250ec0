//! Static description of a piece kind

use crate::guidance::SymmetryClass;
use crate::math::{Pose, Vec3};
use crate::physics::{CollisionLayer, RigidBody};
use crate::physics_constants::body::{DEFAULT_MASS, LOW_PROFILE_INERTIA};

/// Everything needed to spawn and release a piece of one kind. Lengths are
/// metres here; config converts from inches.
#[derive(Clone, Debug, PartialEq)]
pub struct PieceDescriptor {
    pub kind: String,
    pub layer: CollisionLayer,
    pub symmetry: SymmetryClass,
    /// Bounding radius (m), used for overlap margins and floor contact
    pub radius: f32,
    pub mass: f32,
    pub drag: f32,
    pub angular_drag: f32,
    pub inertia: Vec3,
    /// Flat/disc-shaped: inertia resets to the low-profile tensor on release
    pub low_profile: bool,
}

impl PieceDescriptor {
    pub fn new(kind: &str, layer: CollisionLayer) -> Self {
        Self {
            kind: kind.to_string(),
            layer,
            symmetry: SymmetryClass::None,
            radius: 0.1,
            mass: DEFAULT_MASS,
            drag: 0.0,
            angular_drag: 0.05,
            inertia: Vec3::new(0.01, 0.01, 0.01),
            low_profile: false,
        }
    }

    pub fn with_symmetry(mut self, symmetry: SymmetryClass) -> Self {
        self.symmetry = symmetry;
        self
    }

    pub fn with_radius(mut self, radius: f32) -> Self {
        self.radius = radius;
        self
    }

    pub fn with_mass(mut self, mass: f32, drag: f32, angular_drag: f32) -> Self {
        self.mass = mass;
        self.drag = drag;
        self.angular_drag = angular_drag;
        self
    }

    pub fn with_inertia(mut self, inertia: Vec3) -> Self {
        self.inertia = inertia;
        self
    }

    pub fn with_low_profile(mut self, low_profile: bool) -> Self {
        self.low_profile = low_profile;
        self
    }

    /// Inertia a released piece gets back.
    pub fn release_inertia(&self) -> Vec3 {
        if self.low_profile {
            Vec3::from(LOW_PROFILE_INERTIA)
        } else {
            self.inertia
        }
    }

    /// Fresh free body at `pose`.
    pub fn build_body(&self, pose: &Pose) -> RigidBody {
        let mut body = RigidBody::new(self.mass, self.drag, self.angular_drag, self.inertia, self.layer);
        body.set_pose(pose);
        body
    }
}
