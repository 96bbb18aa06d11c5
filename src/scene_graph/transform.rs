use glam::{DMat4, DQuat, DVec3};

/// Local translation, rotation and scale of a node, composed as T·R·S.
///
/// Only the local part is stored. World matrices are always derived from the
/// parent chain by [`Scene::world_matrix`](crate::scene_graph::Scene::world_matrix).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    translation: DVec3,
    rotation: DQuat,
    scale: DVec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Transform {
    pub const IDENTITY: Transform = Transform {
        translation: DVec3::ZERO,
        rotation: DQuat::IDENTITY,
        scale: DVec3::ONE,
    };

    pub fn from_translation(translation: DVec3) -> Self {
        Self {
            translation,
            ..Self::IDENTITY
        }
    }

    pub fn from_trs(translation: DVec3, rotation: DQuat, scale: DVec3) -> Self {
        Self {
            translation,
            rotation,
            scale,
        }
    }

    /// Decomposes an affine matrix. Returns `None` for singular or non-finite
    /// matrices, which have no T·R·S form.
    pub fn from_matrix(matrix: DMat4) -> Option<Self> {
        if !matrix.is_finite() || matrix.determinant().abs() < 1e-12 {
            return None;
        }

        let (scale, rotation, translation) = matrix.to_scale_rotation_translation();
        Some(Self {
            translation,
            rotation: rotation.normalize(),
            scale,
        })
    }

    pub fn local_matrix(&self) -> DMat4 {
        DMat4::from_scale_rotation_translation(self.scale, self.rotation, self.translation)
    }

    pub fn set_translation(&mut self, translation: DVec3) {
        self.translation = translation;
    }

    pub fn translation(&self) -> DVec3 {
        self.translation
    }

    pub fn rotation(&self) -> DQuat {
        self.rotation
    }

    pub fn scale(&self) -> DVec3 {
        self.scale
    }

    pub fn abs_diff_eq(&self, other: &Transform, max_abs_diff: f64) -> bool {
        self.translation.abs_diff_eq(other.translation, max_abs_diff)
            && self.scale.abs_diff_eq(other.scale, max_abs_diff)
            // q and -q are the same rotation
            && (self.rotation.abs_diff_eq(other.rotation, max_abs_diff)
                || self.rotation.abs_diff_eq(-other.rotation, max_abs_diff))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::FRAC_PI_2;

    #[test]
    fn matrix_round_trip() {
        let transform = Transform::from_trs(
            DVec3::new(5.0, 3.0, 2.0),
            DQuat::from_rotation_z(FRAC_PI_2),
            DVec3::new(2.0, 1.0, 0.5),
        );

        let decomposed = Transform::from_matrix(transform.local_matrix()).unwrap();
        assert!(decomposed.abs_diff_eq(&transform, 1e-9));
    }

    #[test]
    fn singular_matrix_does_not_decompose() {
        let flat = Transform::from_trs(DVec3::ONE, DQuat::IDENTITY, DVec3::new(1.0, 0.0, 1.0));
        assert!(Transform::from_matrix(flat.local_matrix()).is_none());
        assert!(Transform::from_matrix(DMat4::NAN).is_none());
    }
}
