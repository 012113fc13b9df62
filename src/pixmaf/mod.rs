//! PixMAF, or Pixel-aligned Mesh Alignment Feedback,
//! regresses a body mesh from the feature pyramid of the image generator.
//!
//! Every stage reads one more level of the pyramid, crops it to the person
//! and samples it at the mesh estimated by the previous stage.

pub mod config;
pub mod crop;
pub mod downsample;
pub mod extractor;
pub mod regressor;
pub mod stage;

pub use crate::{
    body::*,
    function::{projection, rotmat_to_axis_angle, sample_bilinear, TensorFloatExtension},
    network::{
        DownSampling, DownSamplingConfig, UpSampling, UpSamplingConfig,
    },
};
pub use burn::{
    config::Config,
    module::{Module, Param},
    tensor::{backend::Backend, Int, Tensor, TensorData},
};
pub use config::*;
pub use crop::*;
pub use downsample::*;
pub use extractor::*;
pub use regressor::*;
pub use stage::*;

use humansize::{format_size, BINARY};
use std::fmt;

/// The image generator with the mesh regression head.
#[derive(Module)]
pub struct PixMaf<B: Backend> {
    /// Encoder of the conditioning images.
    pub feature_extractor: DownSampling<B>,
    /// Deconvolution stack producing the feature pyramid and the image.
    pub deconv_layers: UpSampling<B>,
    /// Absent when only the image is generated.
    pub body: Option<MeshRegressionHead<B>>,
}

/// Stage-wise modules of the mesh regression.
#[derive(Debug, Module)]
pub struct MeshRegressionHead<B: Backend> {
    pub maf_extractors: [MafExtractor<B>; STAGE_COUNT],
    pub regressors: [Regressor<B>; STAGE_COUNT],
    pub downsampler: MeshDownsampler<B>,
    /// `[S * S, 2]`
    pub points_grid: Param<Tensor<B, 2>>,
}

#[derive(Clone, Debug)]
pub struct PixMafInput<B: Backend> {
    /// `[B, 6, H, W]`
    pub images: Tensor<B, 4>,
    /// `[B]`
    pub bboxes: Vec<BoundingBox>,
    /// `[J, V]`
    pub joint_regressor: Option<Tensor<B, 2>>,
}

/// The mean estimate and the estimate of every stage.
#[derive(Clone, Debug)]
pub struct BodyEstimates<B: Backend> {
    pub init: StageOutput<B>,
    pub stages: [StageOutput<B>; STAGE_COUNT],
}

#[derive(Clone, Debug)]
pub struct PixMafOutput<B: Backend> {
    pub body: Option<BodyEstimates<B>>,
    /// `[B, 3, H, W]`
    pub image: Tensor<B, 4>,
}

impl<B: Backend> PixMaf<B> {
    /// Generates the image and, with the head, the body estimates.
    pub fn forward(
        &self,
        input: PixMafInput<B>,
        body_model: &impl BodyModel<B>,
    ) -> Result<PixMafOutput<B>, Error> {
        #[cfg(debug_assertions)]
        log::debug!(target: "pixmaf::forward", "PixMaf::forward");

        self.check_images(&input.images)?;

        let mut features = self.feature_extractor.forward(input.images);

        let Some(head) = &self.body else {
            let image = self.deconv_layers.forward(features);
            return Ok(PixMafOutput { body: None, image });
        };

        let [batch_size, ..] = features.dims();
        let device = features.device();
        if input.bboxes.len() != batch_size {
            return Err(Error::ShapeMismatch(
                format!("The count of bounding boxes ({})", input.bboxes.len()),
                format!("{batch_size}"),
            ));
        }
        if body_model.vertex_count() != head.downsampler.vertex_count() {
            return Err(Error::ShapeMismatch(
                format!("The vertex count of body model ({})", body_model.vertex_count()),
                format!("{}", head.downsampler.vertex_count()),
            ));
        }

        let windows = input
            .bboxes
            .iter()
            .map(|bbox| CropReference::GLOBAL.window(bbox))
            .collect::<Result<Vec<_>, _>>()?;
        let resolutions = Tensor::from_data(
            TensorData::new(
                input
                    .bboxes
                    .iter()
                    .map(|bbox| bbox.resolution() as f32)
                    .collect::<Vec<_>>(),
                [batch_size, 1],
            ),
            &device,
        );

        let init = head.regressors[0].forward_init(
            resolutions.to_owned(),
            None,
            input.joint_regressor.to_owned(),
            body_model,
        )?;

        let mut state = RefinementState::Init.next();
        let mut stages = Vec::with_capacity(STAGE_COUNT);
        while let Some(stage) = state.stage() {
            #[cfg(debug_assertions)]
            log::debug!(target: "pixmaf::forward", "PixMaf::forward > {state:?}");

            features = self.deconv_layers.forward_block(stage, features);
            let previous = stages.last().unwrap_or(&init);
            let output = head.refine(
                state,
                features.to_owned(),
                &windows,
                resolutions.to_owned(),
                previous,
                input.joint_regressor.to_owned(),
                body_model,
            )?;
            stages.push(output);
            state = state.next();
        }

        let stages = <[StageOutput<B>; STAGE_COUNT]>::try_from(stages).map_err(|stages| {
            Error::Configuration(
                format!("The count of stage outputs ({})", stages.len()),
                format!("{STAGE_COUNT}"),
            )
        })?;
        let image = self.deconv_layers.forward_output(features);

        Ok(PixMafOutput {
            body: Some(BodyEstimates { init, stages }),
            image,
        })
    }

    /// Channels of the conditioning images.
    #[inline]
    pub fn dim_input(&self) -> usize {
        self.feature_extractor.stem.weight.dims()[1]
    }

    /// Ratio between the image and the lowest pyramid level.
    #[inline]
    pub fn scale(&self) -> usize {
        1 << self.feature_extractor.convs.len()
    }

    /// Size of the parameters in bytes.
    #[inline]
    pub fn size(&self) -> usize {
        self.num_params() * size_of::<B::FloatElem>()
    }

    /// Readable size of the parameters.
    #[inline]
    pub fn size_readable(&self) -> String {
        format_size(self.size(), BINARY.decimal_places(1))
    }

    fn check_images(
        &self,
        images: &Tensor<B, 4>,
    ) -> Result<(), Error> {
        let [_, c, h, w] = images.dims();
        if c != self.dim_input() {
            return Err(Error::ShapeMismatch(
                format!("The channels of images ({c})"),
                format!("{}", self.dim_input()),
            ));
        }

        let scale = self.scale();
        if h % scale != 0 || w % scale != 0 || h / scale < 2 || w / scale < 2 {
            return Err(Error::ShapeMismatch(
                format!("The size of images ({h} × {w})"),
                format!("multiples of {scale} and at least {}", scale * 2),
            ));
        }

        let device = images.device();
        if !self.devices().contains(&device) {
            return Err(Error::Device(
                format!("The images ({device:?})"),
                format!("{:?}", self.devices()),
            ));
        }

        Ok(())
    }
}

impl<B: Backend> MeshRegressionHead<B> {
    /// Runs one sampling stage seeded by the previous estimate.
    ///
    /// ## Arguments
    ///
    /// * `features` - `[B, C, H, W]`, the pyramid level of the stage
    /// * `windows` - `[B]`, the crop windows on the base pyramid level
    /// * `resolutions` - `[B, 1]`
    #[allow(clippy::too_many_arguments)]
    pub fn refine(
        &self,
        state: RefinementState,
        features: Tensor<B, 4>,
        windows: &[CropWindow],
        resolutions: Tensor<B, 2>,
        previous: &StageOutput<B>,
        joint_regressor: Option<Tensor<B, 2>>,
        body_model: &impl BodyModel<B>,
    ) -> Result<StageOutput<B>, Error> {
        let stage = state.stage().ok_or_else(|| {
            Error::Configuration(
                format!("The refinement state ({state:?})"),
                "a sampling state".into(),
            )
        })?;
        let extractor = &self.maf_extractors[stage];
        let regressor = &self.regressors[stage];

        let seed = previous.params.detached();
        let features = crop_batch(features, windows, stage)?;

        let sampled = match state {
            RefinementState::SampleGrid => {
                extractor.sample_grid(features, self.points_grid.val().detach())
            },
            _ => {
                let vertices = self.downsampler.forward(previous.vertices.to_owned().detach());
                extractor.sample_vertices(
                    features,
                    vertices,
                    seed.camera.to_owned(),
                    resolutions.to_owned(),
                )
            },
        };

        regressor.forward(
            RegressorInput {
                features: sampled,
                resolutions,
                pose: Some(seed.pose),
                shape: Some(seed.shape),
                camera: Some(seed.camera),
                iterations: 1,
                joint_regressor,
            },
            body_model,
        )
    }
}

impl<B: Backend> fmt::Debug for PixMaf<B> {
    fn fmt(
        &self,
        f: &mut fmt::Formatter,
    ) -> fmt::Result {
        f.debug_struct(&format!("PixMaf<{}>", B::name()))
            .field("devices", &self.devices())
            .field("size", &self.size_readable())
            .field("dim_input", &self.dim_input())
            .field("scale", &self.scale())
            .field("block_count", &self.deconv_layers.block_count())
            .field("body", &self.body.is_some())
            .finish()
    }
}

/// A parameter excluded from training.
pub(crate) fn constant_param<B: Backend, const D: usize>(
    values: Vec<f32>,
    shape: [usize; D],
    device: &B::Device,
) -> Param<Tensor<B, D>> {
    Param::uninitialized(
        Default::default(),
        move |device, is_require_grad| {
            Tensor::from_data(TensorData::new(values.to_owned(), shape), device)
                .set_require_grad(is_require_grad)
        },
        device.to_owned(),
        false,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use burn::backend::NdArray;

    type B = NdArray<f32>;

    fn config() -> PixMafConfig {
        PixMafConfig::new()
            .with_backbone(DownSamplingConfig::new().with_ngf(2).with_n_blocks(1))
            .with_mlp_dim(vec![vec![4, 2], vec![4, 2], vec![3, 2], vec![2]])
            .with_regressor(RegressorConfig::new().with_dim_hidden(16))
    }

    fn body_model() -> LinearBodyModel<B> {
        LinearBodyModel::from_data(
            LinearBodyModelData::synthetic(VERTEX_COUNT, 11),
            &Default::default(),
        )
        .unwrap()
    }

    fn input(batch_size: usize) -> PixMafInput<B> {
        PixMafInput {
            images: Tensor::random(
                [batch_size, 6, 256, 512],
                burn::tensor::Distribution::Uniform(-1.0, 1.0),
                &Default::default(),
            ),
            bboxes: vec![BoundingBox::new(128.0, 64.0, 200.0); batch_size],
            joint_regressor: None,
        }
    }

    fn assert_close<const D: usize>(
        output: Tensor<B, D>,
        target: Tensor<B, D>,
    ) {
        assert_eq!(output.dims(), target.dims());
        let output = output.into_data().to_vec::<f32>().unwrap();
        let target = target.into_data().to_vec::<f32>().unwrap();
        output
            .iter()
            .zip(target)
            .for_each(|(&o, t)| assert_approx_eq!(o, t, 1e-6));
    }

    #[test]
    fn forward_end_to_end() {
        let device = &Default::default();
        let model = config().init::<B>(device).unwrap();
        let body_model = body_model();

        let output = model.forward(input(2), &body_model).unwrap();
        assert_eq!(output.image.dims(), [2, 3, 256, 512]);

        let body = output.body.unwrap();
        assert_eq!(body.stages.len(), STAGE_COUNT);
        assert_eq!(body.init.vertices.dims(), [2, VERTEX_COUNT, 3]);
        body.stages.iter().for_each(|stage| {
            assert_eq!(stage.theta.dims(), [2, THETA_DIM]);
            assert_eq!(stage.vertices.dims(), [2, VERTEX_COUNT, 3]);
            assert_eq!(stage.keypoints_2d.dims(), [2, KEYPOINT_COUNT, 2]);
            assert_eq!(stage.rotmats.dims(), [2, JOINT_COUNT, 3, 3]);
        });
    }

    #[test]
    fn forward_stages_are_chained() {
        let device = &Default::default();
        let model = config().init::<B>(device).unwrap();
        let body = model
            .forward(input(1), &body_model())
            .unwrap()
            .body
            .unwrap();

        assert_close(body.stages[0].seed.pose.to_owned(), body.init.params.pose.to_owned());
        assert_close(
            body.stages[0].seed.camera.to_owned(),
            body.init.params.camera.to_owned(),
        );
        body.stages.windows(2).for_each(|pair| {
            assert_close(pair[1].seed.pose.to_owned(), pair[0].params.pose.to_owned());
            assert_close(pair[1].seed.shape.to_owned(), pair[0].params.shape.to_owned());
            assert_close(
                pair[1].seed.camera.to_owned(),
                pair[0].params.camera.to_owned(),
            );
        });
    }

    #[test]
    fn refine_samples_previous_mesh_with_previous_camera() {
        let device = &Default::default();
        let config = config()
            .with_regressor(RegressorConfig::new().with_dim_hidden(16).with_dropout(0.0));
        let model = config.init::<B>(device).unwrap();
        let head = model.body.as_ref().unwrap();
        let body_model = body_model();
        let stage = 1;
        let state = RefinementState::SampleMesh { stage };

        let windows = [CropReference::GLOBAL
            .window(&BoundingBox::new(128.0, 64.0, 200.0))
            .unwrap()];
        let resolutions = Tensor::<B, 2>::full([1, 1], 200.0, device);
        let features = Tensor::<B, 4>::random(
            [1, config.pyramid_channels(stage), 64, 128],
            burn::tensor::Distribution::Uniform(-1.0, 1.0),
            device,
        );

        let init = head.regressors[0]
            .forward_init(resolutions.to_owned(), None, None, &body_model)
            .unwrap();
        let mut previous = head.regressors[0]
            .forward_init(
                resolutions.to_owned(),
                Some(BodyParameters {
                    pose: init.params.pose.to_owned(),
                    shape: Tensor::full([1, SHAPE_DIM], 0.3, device),
                    camera: Tensor::from_data([[1.3, 0.2, -0.15]], device),
                }),
                None,
                &body_model,
            )
            .unwrap();
        previous.vertices = previous.vertices.mul_scalar(1.2);

        // Refinement of the seed from features sampled at `vertices` with `camera`.
        let regress = |vertices: Tensor<B, 3>, camera: Tensor<B, 2>| {
            let sampled = head.maf_extractors[stage].sample_vertices(
                crop_batch(features.to_owned(), &windows, stage).unwrap(),
                head.downsampler.forward(vertices),
                camera,
                resolutions.to_owned(),
            );
            head.regressors[stage]
                .forward(
                    RegressorInput {
                        features: sampled,
                        resolutions: resolutions.to_owned(),
                        pose: Some(previous.params.pose.to_owned()),
                        shape: Some(previous.params.shape.to_owned()),
                        camera: Some(previous.params.camera.to_owned()),
                        iterations: 1,
                        joint_regressor: None,
                    },
                    &body_model,
                )
                .unwrap()
        };

        let output = head
            .refine(
                state,
                features.to_owned(),
                &windows,
                resolutions.to_owned(),
                &previous,
                None,
                &body_model,
            )
            .unwrap();
        let target = regress(
            previous.vertices.to_owned(),
            previous.params.camera.to_owned(),
        );
        assert_close(output.params.pose.to_owned(), target.params.pose);
        assert_close(output.params.shape.to_owned(), target.params.shape);
        assert_close(output.params.camera.to_owned(), target.params.camera);
        assert_close(output.seed.camera.to_owned(), previous.params.camera.to_owned());

        let pose = output.params.pose.into_data().to_vec::<f32>().unwrap();
        let differs = |other: StageOutput<B>| {
            other
                .params
                .pose
                .into_data()
                .to_vec::<f32>()
                .unwrap()
                .iter()
                .zip(&pose)
                .any(|(a, b)| (a - b).abs() > 1e-7)
        };
        assert!(differs(regress(
            previous.vertices.to_owned(),
            init.params.camera.to_owned(),
        )));
        assert!(differs(regress(
            init.vertices.to_owned(),
            previous.params.camera.to_owned(),
        )));
    }

    #[test]
    fn head_has_one_module_per_stage() {
        let device = &Default::default();
        let config = config();
        let head = config.init::<B>(device).unwrap().body.unwrap();

        assert_eq!(
            head.regressors.each_ref().map(Regressor::dim_input).to_vec(),
            config.derived_feature_dims()
        );
        assert_eq!(
            head.maf_extractors
                .each_ref()
                .map(|extractor| extractor.convs.len())
                .to_vec(),
            config.mlp_dim.iter().map(Vec::len).collect::<Vec<_>>()
        );
    }

    #[test]
    fn forward_without_head() {
        let device = &Default::default();
        let model = config().with_use_pixmaf(false).init::<B>(device).unwrap();
        assert!(model.body.is_none());

        let mut input = input(1);
        input.bboxes.clear();
        let output = model.forward(input, &body_model()).unwrap();

        assert!(output.body.is_none());
        assert_eq!(output.image.dims(), [1, 3, 256, 512]);
    }

    #[test]
    fn forward_invalid() {
        let device = &Default::default();
        let model = config().init::<B>(device).unwrap();
        let body_model = body_model();

        let mut mismatched = input(2);
        mismatched.bboxes.pop();
        let output = model.forward(mismatched, &body_model);
        assert!(matches!(output, Err(Error::ShapeMismatch(..))));

        let mut unequal = input(2);
        unequal.bboxes[1].side = 100.0;
        let output = model.forward(unequal, &body_model);
        assert!(matches!(output, Err(Error::ShapeMismatch(..))));

        let mut narrow = input(1);
        narrow.images = Tensor::zeros([1, 3, 256, 512], device);
        let output = model.forward(narrow, &body_model);
        assert!(matches!(output, Err(Error::ShapeMismatch(..))));

        let other_body_model = LinearBodyModel::<B>::from_data(
            LinearBodyModelData::synthetic(100, 0),
            device,
        )
        .unwrap();
        let output = model.forward(input(1), &other_body_model);
        assert!(matches!(output, Err(Error::ShapeMismatch(..))));
    }

    #[test]
    fn init_invalid() {
        let device = &Default::default();

        let output = config().with_n_iter(3).init::<B>(device);
        assert!(matches!(output, Err(Error::Configuration(..))));

        let output = config()
            .with_feature_dims(Some(vec![441, 862, 862, 861]))
            .init::<B>(device);
        assert!(matches!(output, Err(Error::Configuration(..))));

        let downsampler = MeshDownsampler::strided(100, VERTEX_COUNT, device).unwrap();
        let output = config().init_with_assets::<B>(&Default::default(), downsampler, device);
        assert!(matches!(output, Err(Error::Configuration(..))));
    }

    #[test]
    fn debug_summary() {
        let device = &Default::default();
        let model = config().init::<B>(device).unwrap();
        let output = format!("{model:?}");

        assert!(output.starts_with("PixMaf<"), "{output}");
        assert!(output.contains("size"), "{output}");
        assert!(output.contains("body: true"), "{output}");
    }
}
