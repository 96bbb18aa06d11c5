//! Explicit axis conventions for writers.
//!
//! A scene and a target file each declare which signed axis points forward and
//! which points up. [`AxisConversion`] is the rotation taking one convention to
//! the other; it never mirrors, so triangle winding survives the conversion.

use glam::{DMat3, DMat4, DVec3};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Axis {
    #[serde(rename = "X")]
    PosX,
    #[serde(rename = "Y")]
    PosY,
    #[serde(rename = "Z")]
    PosZ,
    #[serde(rename = "-X")]
    NegX,
    #[serde(rename = "-Y")]
    NegY,
    #[serde(rename = "-Z")]
    NegZ,
}

impl Axis {
    pub fn vector(self) -> DVec3 {
        match self {
            Axis::PosX => DVec3::X,
            Axis::PosY => DVec3::Y,
            Axis::PosZ => DVec3::Z,
            Axis::NegX => DVec3::NEG_X,
            Axis::NegY => DVec3::NEG_Y,
            Axis::NegZ => DVec3::NEG_Z,
        }
    }

    fn component(self) -> usize {
        match self {
            Axis::PosX | Axis::NegX => 0,
            Axis::PosY | Axis::NegY => 1,
            Axis::PosZ | Axis::NegZ => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("forward axis {forward:?} and up axis {up:?} lie on the same line")]
pub struct AxisError {
    pub forward: Axis,
    pub up: Axis,
}

/// A forward/up pair. Defaults to the glTF convention (forward `-Z`, up `Y`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AxisFrame {
    pub forward: Axis,
    pub up: Axis,
}

impl Default for AxisFrame {
    fn default() -> Self {
        Self {
            forward: Axis::NegZ,
            up: Axis::PosY,
        }
    }
}

impl AxisFrame {
    pub fn new(forward: Axis, up: Axis) -> Result<Self, AxisError> {
        let frame = Self { forward, up };
        frame.validate()?;
        Ok(frame)
    }

    pub fn validate(&self) -> Result<(), AxisError> {
        if self.forward.component() == self.up.component() {
            return Err(AxisError {
                forward: self.forward,
                up: self.up,
            });
        }

        Ok(())
    }

    // Columns are forward, up, forward x up. Always a proper rotation.
    fn basis(&self) -> DMat3 {
        let forward = self.forward.vector();
        let up = self.up.vector();
        DMat3::from_cols(forward, up, forward.cross(up))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisConversion {
    matrix: DMat3,
}

impl Default for AxisConversion {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl AxisConversion {
    pub const IDENTITY: AxisConversion = AxisConversion {
        matrix: DMat3::IDENTITY,
    };

    /// Rotation mapping the `from` convention onto the `to` convention.
    pub fn new(from: AxisFrame, to: AxisFrame) -> Result<Self, AxisError> {
        from.validate()?;
        to.validate()?;

        Ok(Self {
            matrix: to.basis() * from.basis().transpose(),
        })
    }

    pub fn matrix(&self) -> DMat3 {
        self.matrix
    }

    pub fn to_mat4(&self) -> DMat4 {
        DMat4::from_mat3(self.matrix)
    }

    pub fn is_identity(&self) -> bool {
        self.matrix.abs_diff_eq(DMat3::IDENTITY, 1e-12)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn same_frame_is_identity() {
        let frame = AxisFrame::default();
        let conversion = AxisConversion::new(frame, frame).unwrap();
        assert!(conversion.is_identity());
    }

    #[test]
    fn z_up_scene_to_y_up_file() {
        // Z-up, -Y forward (a typical DCC convention) into glTF's Y-up, -Z forward.
        let scene = AxisFrame::new(Axis::NegY, Axis::PosZ).unwrap();
        let conversion = AxisConversion::new(scene, AxisFrame::default()).unwrap();

        let up = conversion.matrix() * DVec3::Z;
        let forward = conversion.matrix() * DVec3::NEG_Y;
        assert_relative_eq!(up.y, 1.0, epsilon = 1e-12);
        assert_relative_eq!(forward.z, -1.0, epsilon = 1e-12);
        assert_relative_eq!(conversion.matrix().determinant(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn parallel_axes_are_rejected() {
        assert!(AxisFrame::new(Axis::PosZ, Axis::NegZ).is_err());

        let broken = AxisFrame {
            forward: Axis::PosX,
            up: Axis::PosX,
        };
        let err = AxisConversion::new(AxisFrame::default(), broken).unwrap_err();
        assert_eq!(err.forward, Axis::PosX);
    }

    #[test]
    fn axis_names_round_trip_through_json() {
        let frame: AxisFrame = serde_json::from_str(r#"{"forward":"-Y","up":"Z"}"#).unwrap();
        assert_eq!(frame, AxisFrame::new(Axis::NegY, Axis::PosZ).unwrap());
        assert_eq!(serde_json::to_string(&Axis::NegX).unwrap(), r#""-X""#);
    }
}
