//! Iterative regression of body parameters.

pub use super::*;

use burn::nn::{
    Dropout, DropoutConfig, Initializer, Linear, LinearConfig,
};
use std::fmt;

/// Width of the concatenated body parameters.
pub const PARAMETER_DIM: usize = POSE_DIM + SHAPE_DIM + CAMERA_DIM;

/// The configuration for [`Regressor`]
#[derive(Config, Debug)]
pub struct RegressorConfig {
    /// Width of the sampled features.
    #[config(default = 0)]
    pub dim_input: usize,
    #[config(default = 1024)]
    pub dim_hidden: usize,
    /// Drop probability after each hidden layer.
    #[config(default = 0.5)]
    pub dropout: f64,
}

/// Refines body parameters from sampled features by residual updates.
///
/// ## Details
///
/// One sub-step is
/// `fc2(fc1([features, pose, shape, camera]))` followed by the three
/// decoders whose outputs are added to the running estimate.
#[derive(Module)]
pub struct Regressor<B: Backend> {
    pub fc1: Linear<B>,
    pub drop1: Dropout,
    pub fc2: Linear<B>,
    pub drop2: Dropout,
    pub decpose: Linear<B>,
    pub decshape: Linear<B>,
    pub deccam: Linear<B>,

    /// `[1, POSE_DIM]`
    pub init_pose: Param<Tensor<B, 2>>,
    /// `[1, SHAPE_DIM]`
    pub init_shape: Param<Tensor<B, 2>>,
    /// `[1, CAMERA_DIM]`
    pub init_cam: Param<Tensor<B, 2>>,
}

/// Pose, shape and camera of a batch.
#[derive(Clone, Debug)]
pub struct BodyParameters<B: Backend> {
    /// `[B, POSE_DIM]`
    pub pose: Tensor<B, 2>,
    /// `[B, SHAPE_DIM]`
    pub shape: Tensor<B, 2>,
    /// `[B, CAMERA_DIM]`
    pub camera: Tensor<B, 2>,
}

#[derive(Clone, Debug)]
pub struct RegressorInput<B: Backend> {
    /// `[B, dim_input]`
    pub features: Tensor<B, 2>,
    /// `[B, 1]`
    pub resolutions: Tensor<B, 2>,
    /// `[B, POSE_DIM]`, or the mean pose.
    pub pose: Option<Tensor<B, 2>>,
    /// `[B, SHAPE_DIM]`, or the mean shape.
    pub shape: Option<Tensor<B, 2>>,
    /// `[B, CAMERA_DIM]`, or the mean camera.
    pub camera: Option<Tensor<B, 2>>,
    /// Sub-steps of refinement.
    pub iterations: usize,
    /// `[J, V]`
    pub joint_regressor: Option<Tensor<B, 2>>,
}

/// The body estimate of one stage.
#[derive(Clone, Debug)]
pub struct StageOutput<B: Backend> {
    /// `[B, THETA_DIM]` as camera, shape and axis-angle pose.
    pub theta: Tensor<B, 2>,
    /// `[B, V, 3]`
    pub vertices: Tensor<B, 3>,
    /// `[B, KEYPOINT_COUNT, 2]`
    pub keypoints_2d: Tensor<B, 3>,
    /// `[B, KEYPOINT_COUNT, 3]`, or `[B, 14, 3]` with a joint regressor.
    pub joints_3d: Tensor<B, 3>,
    /// `[B, JOINT_COUNT, 3]`
    pub smpl_joints_3d: Tensor<B, 3>,
    /// `[B, JOINT_COUNT, 3, 3]`
    pub rotmats: Tensor<B, 4>,
    /// The refined parameters.
    pub params: BodyParameters<B>,
    /// The parameters the refinement started from.
    pub seed: BodyParameters<B>,
}

impl RegressorConfig {
    /// Initialize from the configuration with the default mean parameters.
    pub fn init<B: Backend>(
        &self,
        device: &B::Device,
    ) -> Regressor<B> {
        self.init_with_mean(&Default::default(), device)
    }

    /// Initialize from the configuration.
    pub fn init_with_mean<B: Backend>(
        &self,
        mean: &SmplMeanParams,
        device: &B::Device,
    ) -> Regressor<B> {
        let dim_hidden = self.dim_hidden;
        let decoder = |dim_output: usize| {
            LinearConfig::new(dim_hidden, dim_output)
                .with_initializer(Initializer::XavierUniform { gain: 0.01 })
                .init(device)
        };

        Regressor {
            fc1: LinearConfig::new(self.dim_input + PARAMETER_DIM, dim_hidden)
                .init(device),
            drop1: DropoutConfig::new(self.dropout).init(),
            fc2: LinearConfig::new(dim_hidden, dim_hidden).init(device),
            drop2: DropoutConfig::new(self.dropout).init(),
            decpose: decoder(POSE_DIM),
            decshape: decoder(SHAPE_DIM),
            deccam: decoder(CAMERA_DIM),
            init_pose: constant_param(mean.pose.to_owned(), [1, POSE_DIM], device),
            init_shape: constant_param(mean.shape.to_owned(), [1, SHAPE_DIM], device),
            init_cam: constant_param(mean.camera.to_owned(), [1, CAMERA_DIM], device),
        }
    }
}

impl<B: Backend> Regressor<B> {
    /// Width of the sampled features.
    #[inline]
    pub fn dim_input(&self) -> usize {
        self.fc1.weight.dims()[0] - PARAMETER_DIM
    }

    /// The mean parameters broadcast to the batch.
    pub fn mean(
        &self,
        batch_size: usize,
    ) -> BodyParameters<B> {
        BodyParameters {
            pose: self.init_pose.val().detach().expand([batch_size, POSE_DIM]),
            shape: self.init_shape.val().detach().expand([batch_size, SHAPE_DIM]),
            camera: self.init_cam.val().detach().expand([batch_size, CAMERA_DIM]),
        }
    }

    /// Refines the seed with `iterations` sub-steps and evaluates the body.
    pub fn forward(
        &self,
        input: RegressorInput<B>,
        body_model: &impl BodyModel<B>,
    ) -> Result<StageOutput<B>, Error> {
        let [batch_size, dim_input] = input.features.dims();
        if dim_input != self.dim_input() {
            return Err(Error::Configuration(
                format!("The feature width of regressor ({dim_input})"),
                format!("{}", self.dim_input()),
            ));
        }

        let mean = self.mean(batch_size);
        let seed = BodyParameters {
            pose: resolve_seed(input.pose, mean.pose, "pose")?,
            shape: resolve_seed(input.shape, mean.shape, "shape")?,
            camera: resolve_seed(input.camera, mean.camera, "camera")?,
        };

        let params = (0..input.iterations).fold(seed.to_owned(), |params, _| {
            self.step(input.features.to_owned(), params)
        });

        self.evaluate(
            seed,
            params,
            input.resolutions,
            input.joint_regressor,
            body_model,
        )
    }

    /// Evaluates the seed, or the mean parameters, without refinement.
    ///
    /// ## Arguments
    ///
    /// * `resolutions` - `[B, 1]`
    /// * `seed` - The initial parameters of the batch
    /// * `joint_regressor` - `[J, V]`
    pub fn forward_init(
        &self,
        resolutions: Tensor<B, 2>,
        seed: Option<BodyParameters<B>>,
        joint_regressor: Option<Tensor<B, 2>>,
        body_model: &impl BodyModel<B>,
    ) -> Result<StageOutput<B>, Error> {
        let [batch_size, _] = resolutions.dims();
        let mean = self.mean(batch_size);
        let seed = match seed {
            Some(seed) => BodyParameters {
                pose: resolve_seed(Some(seed.pose), mean.pose, "pose")?,
                shape: resolve_seed(Some(seed.shape), mean.shape, "shape")?,
                camera: resolve_seed(Some(seed.camera), mean.camera, "camera")?,
            },
            None => mean,
        };

        self.evaluate(seed.to_owned(), seed, resolutions, joint_regressor, body_model)
    }

    fn step(
        &self,
        features: Tensor<B, 2>,
        params: BodyParameters<B>,
    ) -> BodyParameters<B> {
        let mut x = Tensor::cat(
            vec![
                features,
                params.pose.to_owned(),
                params.shape.to_owned(),
                params.camera.to_owned(),
            ],
            1,
        );
        x = self.fc1.forward(x);
        x = self.drop1.forward(x);
        x = self.fc2.forward(x);
        x = self.drop2.forward(x);

        BodyParameters {
            pose: self.decpose.forward(x.to_owned()) + params.pose,
            shape: self.decshape.forward(x.to_owned()) + params.shape,
            camera: self.deccam.forward(x) + params.camera,
        }
    }

    fn evaluate(
        &self,
        seed: BodyParameters<B>,
        params: BodyParameters<B>,
        resolutions: Tensor<B, 2>,
        joint_regressor: Option<Tensor<B, 2>>,
        body_model: &impl BodyModel<B>,
    ) -> Result<StageOutput<B>, Error> {
        let [batch_size, _] = params.pose.dims();
        if resolutions.dims() != [batch_size, 1] {
            return Err(Error::ShapeMismatch(
                format!("The shape of resolutions ({:?})", resolutions.dims()),
                format!("[{batch_size}, 1]"),
            ));
        }

        let (rotmats, output) = body_model
            .evaluate_pose_6d(params.shape.to_owned(), params.pose.to_owned());
        let keypoints_2d = projection(
            output.joints.to_owned(),
            params.camera.to_owned(),
            resolutions,
        );
        let axis_angles = rotmat_to_axis_angle(
            rotmats
                .to_owned()
                .reshape([batch_size * JOINT_COUNT, 3, 3]),
        )
        .reshape([batch_size, POSE_AXIS_ANGLE_DIM]);

        let joints_3d = match joint_regressor {
            Some(joint_regressor) => {
                regress_evaluation_joints(joint_regressor, output.vertices.to_owned())?
            },
            None => output.joints,
        };

        let theta = Tensor::cat(
            vec![params.camera.to_owned(), params.shape.to_owned(), axis_angles],
            1,
        );

        Ok(StageOutput {
            theta,
            vertices: output.vertices,
            keypoints_2d,
            joints_3d,
            smpl_joints_3d: output.smpl_joints,
            rotmats,
            params,
            seed,
        })
    }
}

impl<B: Backend> BodyParameters<B> {
    /// A copy severed from the gradient history.
    pub fn detached(&self) -> Self {
        Self {
            pose: self.pose.to_owned().detach(),
            shape: self.shape.to_owned().detach(),
            camera: self.camera.to_owned().detach(),
        }
    }

    #[inline]
    pub fn batch_size(&self) -> usize {
        self.pose.dims()[0]
    }
}

impl<B: Backend> fmt::Debug for Regressor<B> {
    fn fmt(
        &self,
        f: &mut fmt::Formatter,
    ) -> fmt::Result {
        f.debug_struct(&format!("Regressor<{}>", B::name()))
            .field("dim_input", &self.dim_input())
            .field("fc1.weight.dims()", &self.fc1.weight.dims())
            .field("fc2.weight.dims()", &self.fc2.weight.dims())
            .field("drop1.prob", &self.drop1.prob)
            .finish()
    }
}

/// The seed of one parameter, or the mean broadcast to the batch.
fn resolve_seed<B: Backend>(
    seed: Option<Tensor<B, 2>>,
    mean: Tensor<B, 2>,
    name: &str,
) -> Result<Tensor<B, 2>, Error> {
    match seed {
        Some(seed) if seed.dims() == mean.dims() => Ok(seed),
        Some(seed) => Err(Error::ShapeMismatch(
            format!("The shape of {name} seed ({:?})", seed.dims()),
            format!("{:?}", mean.dims()),
        )),
        None => Ok(mean),
    }
}

/// The 14 evaluation joints relative to the pelvis.
///
/// ## Shapes
///
/// * `joint_regressor` - `[J, V]`
/// * `vertices` - `[B, V, 3]`
/// * `output` - `[B, 14, 3]`
pub fn regress_evaluation_joints<B: Backend>(
    joint_regressor: Tensor<B, 2>,
    vertices: Tensor<B, 3>,
) -> Result<Tensor<B, 3>, Error> {
    let [b, v, _] = vertices.dims();
    let [j, joint_regressor_v] = joint_regressor.dims();
    let joint_count_min = H36M_TO_J14.iter().max().map_or(0, |&i| i as usize + 1);
    if joint_regressor_v != v || j < joint_count_min {
        return Err(Error::ShapeMismatch(
            format!("The shape of joint regressor ({:?})", joint_regressor.dims()),
            format!("[>= {joint_count_min}, {v}]"),
        ));
    }

    let device = vertices.device();
    let joints = joint_regressor
        .unsqueeze_dim::<3>(0)
        .expand([b, j, v])
        .matmul(vertices);
    let pelvis = joints
        .to_owned()
        .slice([0..b, H36M_PELVIS..H36M_PELVIS + 1, 0..3]);
    let indices = Tensor::<B, 1, Int>::from_ints(H36M_TO_J14, &device);

    Ok(joints.select(1, indices) - pelvis)
}
