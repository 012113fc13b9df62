pub use super::*;

/// The configuration for [`PixMaf`]
#[derive(Config, Debug)]
pub struct PixMafConfig {
    /// Refinement stages, which should be [`STAGE_COUNT`].
    #[config(default = 4)]
    pub n_iter: usize,
    /// Channel reduction targets of every stage.
    #[config(default = "default_mlp_dim()")]
    pub mlp_dim: Vec<Vec<usize>>,
    /// Runs the mesh regression along the image generation.
    #[config(default = true)]
    pub use_pixmaf: bool,
    /// Expected input widths of the regressors.
    ///
    /// It is checked against the widths derived from the other fields.
    pub feature_dims: Option<Vec<usize>>,
    /// Points per side of the sampling grid of stage 0.
    #[config(default = 21)]
    pub grid_size: usize,
    /// Vertices of the full body mesh.
    #[config(default = "VERTEX_COUNT")]
    pub vertex_count: usize,
    /// Vertices of the sparse sampling mesh.
    #[config(default = 431)]
    pub mesh_point_count: usize,
    #[config(default = "DownSamplingConfig::new()")]
    pub backbone: DownSamplingConfig,
    /// Channels of the synthesized image.
    #[config(default = 3)]
    pub dim_output: usize,
    /// The input width is derived per stage.
    #[config(default = "RegressorConfig::new()")]
    pub regressor: RegressorConfig,
}

/// The reduction targets of the four stages, ending with 5 channels per point.
pub fn default_mlp_dim() -> Vec<Vec<usize>> {
    vec![
        vec![128, 64, 5],
        vec![128, 64, 5],
        vec![64, 32, 5],
        vec![32, 16, 5],
    ]
}

impl PixMafConfig {
    /// Checks the stage layout of the configuration.
    pub fn validate(&self) -> Result<(), Error> {
        if self.n_iter != STAGE_COUNT {
            return Err(Error::Configuration(
                format!("The refinement stage count ({})", self.n_iter),
                format!("{STAGE_COUNT}"),
            ));
        }
        if self.backbone.n_downsampling != STAGE_COUNT {
            return Err(Error::Configuration(
                format!(
                    "The downsampling count of backbone ({})",
                    self.backbone.n_downsampling
                ),
                format!("{STAGE_COUNT}"),
            ));
        }
        if self.backbone.ngf == 0 || self.backbone.dim_input == 0 || self.dim_output == 0 {
            return Err(Error::Configuration(
                format!("The channels of backbone ({:?})", self.backbone),
                "positive".into(),
            ));
        }

        if !self.use_pixmaf {
            return Ok(());
        }

        if self.mlp_dim.len() != self.n_iter {
            return Err(Error::Configuration(
                format!("The list count of mlp_dim ({})", self.mlp_dim.len()),
                format!("{}", self.n_iter),
            ));
        }
        if let Some(dims) = self
            .mlp_dim
            .iter()
            .find(|dims| dims.is_empty() || dims.contains(&0))
        {
            return Err(Error::Configuration(
                format!("The reduction targets of mlp_dim ({dims:?})"),
                "non-empty and positive".into(),
            ));
        }
        if self.grid_size == 0 {
            return Err(Error::Configuration(
                format!("The grid size ({})", self.grid_size),
                "positive".into(),
            ));
        }
        if self.mesh_point_count == 0 || self.mesh_point_count > self.vertex_count {
            return Err(Error::Configuration(
                format!("The mesh point count ({})", self.mesh_point_count),
                format!("in 1..={}", self.vertex_count),
            ));
        }
        if let Some(feature_dims) = &self.feature_dims {
            let target = self.derived_feature_dims();
            if feature_dims != &target {
                return Err(Error::Configuration(
                    format!("The feature dims ({feature_dims:?})"),
                    format!("{target:?}"),
                ));
            }
        }

        Ok(())
    }

    /// The deconvolution stack matching the backbone.
    #[inline]
    pub fn up_sampling(&self) -> UpSamplingConfig {
        UpSamplingConfig::new()
            .with_ngf(self.backbone.ngf)
            .with_n_downsampling(self.backbone.n_downsampling)
            .with_dim_output(self.dim_output)
    }

    /// Channels of the pyramid level read by `stage`.
    #[inline]
    pub fn pyramid_channels(
        &self,
        stage: usize,
    ) -> usize {
        self.up_sampling().channels(stage + 1)
    }

    /// Input widths of the regressors.
    ///
    /// Stage 0 samples the grid and later stages sample the sparse mesh.
    pub fn derived_feature_dims(&self) -> Vec<usize> {
        self.mlp_dim
            .iter()
            .enumerate()
            .map(|(stage, dims)| {
                let point_count = match stage {
                    0 => self.grid_size * self.grid_size,
                    _ => self.mesh_point_count,
                };
                point_count * dims.last().copied().unwrap_or_default()
            })
            .collect()
    }

    /// Initialize with the default mean parameters and a strided downsampler.
    pub fn init<B: Backend>(
        &self,
        device: &B::Device,
    ) -> Result<PixMaf<B>, Error> {
        let downsampler =
            MeshDownsampler::strided(self.mesh_point_count, self.vertex_count, device)?;
        self.init_with_assets(&Default::default(), downsampler, device)
    }

    /// Initialize with loaded mean parameters and mesh downsampler.
    pub fn init_with_assets<B: Backend>(
        &self,
        mean: &SmplMeanParams,
        downsampler: MeshDownsampler<B>,
        device: &B::Device,
    ) -> Result<PixMaf<B>, Error> {
        self.validate()?;

        let feature_extractor = self.backbone.init(device);
        let deconv_layers = self.up_sampling().init(device);

        let body = match self.use_pixmaf {
            true => Some(self.init_head(mean, downsampler, device)?),
            false => None,
        };

        log::info!(
            target: "pixmaf::config",
            "PixMafConfig::init > use_pixmaf ({}), feature_dims ({:?})",
            self.use_pixmaf,
            self.derived_feature_dims(),
        );

        Ok(PixMaf {
            feature_extractor,
            deconv_layers,
            body,
        })
    }

    fn init_head<B: Backend>(
        &self,
        mean: &SmplMeanParams,
        downsampler: MeshDownsampler<B>,
        device: &B::Device,
    ) -> Result<MeshRegressionHead<B>, Error> {
        let target = [self.mesh_point_count, self.vertex_count];
        if [downsampler.point_count(), downsampler.vertex_count()] != target {
            return Err(Error::Configuration(
                format!("The shape of mesh downsampler ({downsampler:?})"),
                format!("{target:?}"),
            ));
        }
        let mean_lengths = [mean.pose.len(), mean.shape.len(), mean.camera.len()];
        if mean_lengths != [POSE_DIM, SHAPE_DIM, CAMERA_DIM] {
            return Err(Error::InvalidData(
                format!("The lengths of mean parameters ({mean_lengths:?})"),
                format!("{:?}", [POSE_DIM, SHAPE_DIM, CAMERA_DIM]),
            ));
        }

        let maf_extractors: [MafExtractor<B>; STAGE_COUNT] = self
            .mlp_dim
            .iter()
            .enumerate()
            .map(|(stage, dims)| {
                MafExtractorConfig::new(self.pyramid_channels(stage), dims.to_owned())
                    .init(device)
            })
            .collect::<Vec<_>>()
            .try_into()
            .map_err(|extractors: Vec<_>| {
                Error::Configuration(
                    format!("The count of extractors ({})", extractors.len()),
                    format!("{STAGE_COUNT}"),
                )
            })?;
        let regressors: [Regressor<B>; STAGE_COUNT] = self
            .derived_feature_dims()
            .into_iter()
            .map(|dim_input| {
                self.regressor
                    .to_owned()
                    .with_dim_input(dim_input)
                    .init_with_mean(mean, device)
            })
            .collect::<Vec<_>>()
            .try_into()
            .map_err(|regressors: Vec<_>| {
                Error::Configuration(
                    format!("The count of regressors ({})", regressors.len()),
                    format!("{STAGE_COUNT}"),
                )
            })?;
        let points_grid = constant_param(
            sampling_grid_values(self.grid_size),
            [self.grid_size * self.grid_size, 2],
            device,
        );

        Ok(MeshRegressionHead {
            maf_extractors,
            regressors,
            downsampler,
            points_grid,
        })
    }
}

impl Default for PixMafConfig {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}
