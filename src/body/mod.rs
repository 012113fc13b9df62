//! Parametric body models.
//!
//! The regression network only depends on [`BodyModel`], so any SMPL
//! implementation with matching tensor shapes can be plugged in.

pub mod decode;
pub mod joints;
pub mod linear;
pub mod mean_params;

pub use crate::{error::Error, function::rot6d_to_rotmat};
pub use burn::tensor::{backend::Backend, Tensor, TensorData};
pub use decode::{decode_f32s, decode_f32s_from_bytes};
pub use joints::*;
pub use linear::{LinearBodyModel, LinearBodyModelData};
pub use mean_params::SmplMeanParams;

/// The posed mesh and joints of a batch of bodies.
#[derive(Clone, Debug)]
pub struct BodyModelOutput<B: Backend> {
    /// `[B, V, 3]`
    pub vertices: Tensor<B, 3>,
    /// `[B, KEYPOINT_COUNT, 3]`
    pub joints: Tensor<B, 3>,
    /// `[B, JOINT_COUNT, 3]`
    pub smpl_joints: Tensor<B, 3>,
}

/// A differentiable body model mapping pose and shape to a mesh.
pub trait BodyModel<B: Backend> {
    /// Evaluates the model with rotation matrices.
    ///
    /// ## Shapes
    ///
    /// * `shapes` - `[B, SHAPE_DIM]`
    /// * `body_poses` - `[B, JOINT_COUNT - 1, 3, 3]`
    /// * `global_orients` - `[B, 1, 3, 3]`
    fn evaluate(
        &self,
        shapes: Tensor<B, 2>,
        body_poses: Tensor<B, 4>,
        global_orients: Tensor<B, 4>,
    ) -> BodyModelOutput<B>;

    /// Vertices of the mesh.
    fn vertex_count(&self) -> usize;

    /// Evaluates the model with 6D pose codes.
    ///
    /// ## Shapes
    ///
    /// * `shapes` - `[B, SHAPE_DIM]`
    /// * `poses` - `[B, POSE_DIM]`
    /// * `output.0` - `[B, JOINT_COUNT, 3, 3]`
    fn evaluate_pose_6d(
        &self,
        shapes: Tensor<B, 2>,
        poses: Tensor<B, 2>,
    ) -> (Tensor<B, 4>, BodyModelOutput<B>) {
        let [b, _] = poses.dims();
        let rotmats = rot6d_to_rotmat(poses).reshape([b, JOINT_COUNT, 3, 3]);
        let global_orients = rotmats.to_owned().slice([0..b, 0..1, 0..3, 0..3]);
        let body_poses = rotmats
            .to_owned()
            .slice([0..b, 1..JOINT_COUNT, 0..3, 0..3]);
        let output = self.evaluate(shapes, body_poses, global_orients);
        (rotmats, output)
    }
}
