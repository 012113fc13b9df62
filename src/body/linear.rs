//! A linear body model with the SMPL topology.
//!
//! The mesh is the template displaced by shape blend shapes and pose
//! correctives, then rotated by the global orientation. There is no
//! skinning, so the body pose only acts through the correctives.

pub use super::*;

use rand::{rngs::StdRng, SeedableRng};
use rand_distr::{Distribution, Normal};
use std::{fmt, io::Read};

/// Width of the pose feature, i.e. the flattened `R - I` of the body joints.
pub const POSE_FEATURE_DIM: usize = (JOINT_COUNT - 1) * 9;

/// Raw arrays of [`LinearBodyModel`] in row-major order.
#[derive(Clone, PartialEq)]
pub struct LinearBodyModelData {
    /// `V`
    pub vertex_count: usize,
    /// `[V, 3]`
    pub template: Vec<f32>,
    /// `[SHAPE_DIM, V * 3]`
    pub shape_dirs: Vec<f32>,
    /// `[POSE_FEATURE_DIM, V * 3]`
    pub pose_dirs: Vec<f32>,
    /// `[JOINT_COUNT, V]`
    pub joint_regressor: Vec<f32>,
    /// `[KEYPOINT_COUNT, V]`
    pub joint_regressor_extra: Vec<f32>,
}

/// A linear body model.
#[derive(Clone)]
pub struct LinearBodyModel<B: Backend> {
    /// `[V, 3]`
    pub template: Tensor<B, 2>,
    /// `[SHAPE_DIM, V * 3]`
    pub shape_dirs: Tensor<B, 2>,
    /// `[POSE_FEATURE_DIM, V * 3]`
    pub pose_dirs: Tensor<B, 2>,
    /// `[JOINT_COUNT, V]`
    pub joint_regressor: Tensor<B, 2>,
    /// `[KEYPOINT_COUNT, V]`
    pub joint_regressor_extra: Tensor<B, 2>,
}

impl LinearBodyModelData {
    /// Array lengths in the encoded order.
    pub const fn lengths(vertex_count: usize) -> [usize; 5] {
        [
            vertex_count * 3,
            SHAPE_DIM * vertex_count * 3,
            POSE_FEATURE_DIM * vertex_count * 3,
            JOINT_COUNT * vertex_count,
            KEYPOINT_COUNT * vertex_count,
        ]
    }

    /// Decode from native-endian `f32` values ordered as the fields.
    pub fn decode(
        reader: &mut impl Read,
        vertex_count: usize,
    ) -> Result<Self, Error> {
        let lengths = Self::lengths(vertex_count);
        let mut values = decode_f32s(
            reader,
            lengths.iter().sum(),
            "linear body model",
        )?;

        let mut arrays = lengths
            .iter()
            .rev()
            .map(|length| values.split_off(values.len() - length))
            .collect::<Vec<_>>();
        arrays.reverse();
        let [template, shape_dirs, pose_dirs, joint_regressor, joint_regressor_extra] =
            <[Vec<f32>; 5]>::try_from(arrays).map_err(|arrays| {
                Error::InvalidData(
                    format!("The array count of linear body model ({})", arrays.len()),
                    "5".into(),
                )
            })?;

        Ok(Self {
            vertex_count,
            template,
            shape_dirs,
            pose_dirs,
            joint_regressor,
            joint_regressor_extra,
        })
    }

    /// Encode into native-endian `f32` values ordered as the fields.
    pub fn encode(&self) -> Vec<u8> {
        let values = [
            self.template.as_slice(),
            self.shape_dirs.as_slice(),
            self.pose_dirs.as_slice(),
            self.joint_regressor.as_slice(),
            self.joint_regressor_extra.as_slice(),
        ]
        .concat();
        bytemuck::cast_slice(&values).to_vec()
    }

    /// A random body model for demonstrations and tests.
    ///
    /// Each joint averages 8 vertices spread over the mesh.
    pub fn synthetic(
        vertex_count: usize,
        seed: u64,
    ) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut sample = |count: usize, std_dev: f32| -> Vec<f32> {
            Normal::new(0.0, std_dev)
                .expect("The standard deviation is finite")
                .sample_iter(&mut rng)
                .take(count)
                .collect()
        };
        let [template_len, shape_dirs_len, pose_dirs_len, ..] =
            Self::lengths(vertex_count);

        let template = sample(template_len, 0.3);
        let shape_dirs = sample(shape_dirs_len, 0.01);
        let pose_dirs = sample(pose_dirs_len, 0.001);

        let regressor = |joint_count: usize| {
            const MEMBER_COUNT: usize = 8;
            let stride = (vertex_count / joint_count).max(1);
            let mut weights = vec![0.0; joint_count * vertex_count];
            for joint in 0..joint_count {
                for member in 0..MEMBER_COUNT {
                    let vertex = (joint * stride + member) % vertex_count;
                    weights[joint * vertex_count + vertex] += 1.0 / MEMBER_COUNT as f32;
                }
            }
            weights
        };

        Self {
            vertex_count,
            template,
            shape_dirs,
            pose_dirs,
            joint_regressor: regressor(JOINT_COUNT),
            joint_regressor_extra: regressor(KEYPOINT_COUNT),
        }
    }

    /// Checks the array lengths against the vertex count.
    pub fn validate(&self) -> Result<(), Error> {
        let names = [
            "template",
            "shape_dirs",
            "pose_dirs",
            "joint_regressor",
            "joint_regressor_extra",
        ];
        let arrays = [
            &self.template,
            &self.shape_dirs,
            &self.pose_dirs,
            &self.joint_regressor,
            &self.joint_regressor_extra,
        ];

        names
            .into_iter()
            .zip(arrays)
            .zip(Self::lengths(self.vertex_count))
            .try_for_each(|((name, array), length)| {
                if array.len() == length {
                    Ok(())
                } else {
                    Err(Error::InvalidData(
                        format!("The length of {name} ({})", array.len()),
                        format!("{length}"),
                    ))
                }
            })
    }
}

impl fmt::Debug for LinearBodyModelData {
    fn fmt(
        &self,
        f: &mut fmt::Formatter,
    ) -> fmt::Result {
        f.debug_struct("LinearBodyModelData")
            .field("vertex_count", &self.vertex_count)
            .field("template.len()", &self.template.len())
            .field("shape_dirs.len()", &self.shape_dirs.len())
            .field("pose_dirs.len()", &self.pose_dirs.len())
            .field("joint_regressor.len()", &self.joint_regressor.len())
            .field("joint_regressor_extra.len()", &self.joint_regressor_extra.len())
            .finish()
    }
}

impl<B: Backend> LinearBodyModel<B> {
    /// Load the model onto the device.
    pub fn from_data(
        data: LinearBodyModelData,
        device: &B::Device,
    ) -> Result<Self, Error> {
        data.validate()?;

        let vertex_count = data.vertex_count;
        let tensor = |values: Vec<f32>, shape: [usize; 2]| {
            Tensor::from_data(TensorData::new(values, shape), device)
        };

        Ok(Self {
            template: tensor(data.template, [vertex_count, 3]),
            shape_dirs: tensor(data.shape_dirs, [SHAPE_DIM, vertex_count * 3]),
            pose_dirs: tensor(data.pose_dirs, [POSE_FEATURE_DIM, vertex_count * 3]),
            joint_regressor: tensor(data.joint_regressor, [JOINT_COUNT, vertex_count]),
            joint_regressor_extra: tensor(
                data.joint_regressor_extra,
                [KEYPOINT_COUNT, vertex_count],
            ),
        })
    }
}

impl<B: Backend> BodyModel<B> for LinearBodyModel<B> {
    fn evaluate(
        &self,
        shapes: Tensor<B, 2>,
        body_poses: Tensor<B, 4>,
        global_orients: Tensor<B, 4>,
    ) -> BodyModelOutput<B> {
        let [b, _] = shapes.dims();
        let [_, body_joint_count, _, _] = body_poses.dims();
        let vertex_count = self.vertex_count();
        let device = shapes.device();

        // [B, V, 3]
        let offsets_shape = shapes
            .matmul(self.shape_dirs.to_owned())
            .reshape([b, vertex_count, 3]);

        // [B, POSE_FEATURE_DIM] <- [B, J - 1, 3, 3]
        let identity = Tensor::<B, 2>::eye(3, &device).reshape([1, 1, 3, 3]);
        let pose_features = (body_poses - identity).reshape([b, body_joint_count * 9]);
        let offsets_pose = pose_features
            .matmul(self.pose_dirs.to_owned())
            .reshape([b, vertex_count, 3]);

        // [B, V, 3]
        let vertices = self.template.to_owned().unsqueeze_dim::<3>(0)
            + offsets_shape
            + offsets_pose;

        // v' = R v <=> [v'] = [v] R^T
        let rotations = global_orients.reshape([b, 3, 3]).swap_dims(1, 2);
        let vertices = vertices.matmul(rotations);

        let regress = |regressor: &Tensor<B, 2>| {
            let [joint_count, _] = regressor.dims();
            regressor
                .to_owned()
                .unsqueeze_dim::<3>(0)
                .expand([b, joint_count, vertex_count])
                .matmul(vertices.to_owned())
        };

        BodyModelOutput {
            joints: regress(&self.joint_regressor_extra),
            smpl_joints: regress(&self.joint_regressor),
            vertices,
        }
    }

    fn vertex_count(&self) -> usize {
        self.template.dims()[0]
    }
}

impl<B: Backend> fmt::Debug for LinearBodyModel<B> {
    fn fmt(
        &self,
        f: &mut fmt::Formatter,
    ) -> fmt::Result {
        f.debug_struct(&format!("LinearBodyModel<{}>", B::name()))
            .field("template.dims()", &self.template.dims())
            .field("shape_dirs.dims()", &self.shape_dirs.dims())
            .field("pose_dirs.dims()", &self.pose_dirs.dims())
            .field("joint_regressor.dims()", &self.joint_regressor.dims())
            .field(
                "joint_regressor_extra.dims()",
                &self.joint_regressor_extra.dims(),
            )
            .finish()
    }
}
