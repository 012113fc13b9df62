//! Mean body parameters used to seed the regression.

pub use super::*;

use std::io::Read;

/// Mean pose, shape and camera of the training distribution.
#[derive(Clone, Debug, PartialEq)]
pub struct SmplMeanParams {
    /// 6D pose code.
    ///
    /// The length is [`POSE_DIM`].
    pub pose: Vec<f32>,
    /// Shape coefficients.
    ///
    /// The length is [`SHAPE_DIM`].
    pub shape: Vec<f32>,
    /// Weak-perspective camera.
    ///
    /// The length is [`CAMERA_DIM`].
    pub camera: Vec<f32>,
}

impl SmplMeanParams {
    /// Total count of values in the encoded form.
    pub const VALUE_COUNT: usize = POSE_DIM + SHAPE_DIM + CAMERA_DIM;

    /// Decode from native-endian `f32` values ordered as pose, shape and camera.
    pub fn decode(reader: &mut impl Read) -> Result<Self, Error> {
        let values = decode_f32s(reader, Self::VALUE_COUNT, "mean parameters")?;
        Ok(Self::from_values(values))
    }

    /// Encode into native-endian `f32` values ordered as pose, shape and camera.
    pub fn encode(&self) -> Vec<u8> {
        let values =
            [self.pose.as_slice(), self.shape.as_slice(), self.camera.as_slice()].concat();
        bytemuck::cast_slice(&values).to_vec()
    }

    fn from_values(mut values: Vec<f32>) -> Self {
        let camera = values.split_off(POSE_DIM + SHAPE_DIM);
        let shape = values.split_off(POSE_DIM);
        let pose = values;
        Self { pose, shape, camera }
    }
}

impl Default for SmplMeanParams {
    /// The rest pose, the mean shape and a camera filling most of the crop.
    fn default() -> Self {
        Self {
            pose: [1.0, 0.0, 0.0, 1.0, 0.0, 0.0].repeat(JOINT_COUNT),
            shape: vec![0.0; SHAPE_DIM],
            camera: vec![0.9, 0.0, 0.0],
        }
    }
}
