//! Mesh-aligned feature extraction.

pub use super::*;

use burn::nn::{
    conv::{Conv1d, Conv1dConfig},
    LeakyRelu, LeakyReluConfig,
};

/// The configuration for [`MafExtractor`]
#[derive(Config, Debug)]
pub struct MafExtractorConfig {
    /// Channels of the sampled feature map.
    pub dim_input: usize,
    /// Output channels of every `1 × 1` convolution.
    pub mlp_dim: Vec<usize>,
    #[config(default = 0.01)]
    pub negative_slope: f64,
}

/// Samples a pyramid level at points and reduces the channels per point.
///
/// ## Details
///
/// Every convolution after the first also receives the sampled features.
/// Leaky ReLU follows every convolution but the last.
#[derive(Debug, Module)]
pub struct MafExtractor<B: Backend> {
    pub convs: Vec<Conv1d<B>>,
    pub ac: LeakyRelu,
}

impl MafExtractorConfig {
    /// Channels per point of the output.
    #[inline]
    pub fn dim_output(&self) -> usize {
        self.mlp_dim.last().copied().unwrap_or(self.dim_input)
    }

    /// Initialize from the configuration.
    pub fn init<B: Backend>(
        &self,
        device: &B::Device,
    ) -> MafExtractor<B> {
        let convs = self
            .mlp_dim
            .iter()
            .enumerate()
            .map(|(index, &dim_output)| {
                let dim_input = match index {
                    0 => self.dim_input,
                    _ => self.mlp_dim[index - 1] + self.dim_input,
                };
                Conv1dConfig::new(dim_input, dim_output, 1).init(device)
            })
            .collect();
        let ac = LeakyReluConfig::new()
            .with_negative_slope(self.negative_slope)
            .init();

        MafExtractor { convs, ac }
    }
}

impl<B: Backend> MafExtractor<B> {
    /// Samples at points shared by the batch.
    ///
    /// ## Shapes
    ///
    /// * `features` - `[B, C, H, W]`
    /// * `grid` - `[N, 2]` as `(x, y)` in `[-1, 1]`
    /// * `output` - `[B, C_out * N]`
    pub fn sample_grid(
        &self,
        features: Tensor<B, 4>,
        grid: Tensor<B, 2>,
    ) -> Tensor<B, 2> {
        let [b, ..] = features.dims();
        let [n, _] = grid.dims();
        let points = grid.unsqueeze_dim::<3>(0).expand([b, n, 2]);

        self.reduce_dim(sample_bilinear(features, points))
    }

    /// Samples at the projection of vertices.
    ///
    /// ## Shapes
    ///
    /// * `features` - `[B, C, H, W]`
    /// * `vertices` - `[B, N, 3]`
    /// * `cameras` - `[B, 3]`
    /// * `resolutions` - `[B, 1]`
    /// * `output` - `[B, C_out * N]`
    pub fn sample_vertices(
        &self,
        features: Tensor<B, 4>,
        vertices: Tensor<B, 3>,
        cameras: Tensor<B, 2>,
        resolutions: Tensor<B, 2>,
    ) -> Tensor<B, 2> {
        let points = projection(vertices, cameras, resolutions);

        self.reduce_dim(sample_bilinear(features, points))
    }

    /// Reduces the channels of sampled features and flattens them.
    ///
    /// ## Shapes
    ///
    /// * `features` - `[B, C, N]`
    /// * `output` - `[B, C_out * N]` in channel-major order
    pub fn reduce_dim(
        &self,
        features: Tensor<B, 3>,
    ) -> Tensor<B, 2> {
        let [b, _, n] = features.dims();
        let last = self.convs.len().saturating_sub(1);

        let output = self.convs.iter().enumerate().fold(
            features.to_owned(),
            |x, (index, conv)| {
                let x = match index {
                    0 => x,
                    _ => Tensor::cat([x, features.to_owned()].into(), 1),
                };
                let x = conv.forward(x);
                match index == last {
                    true => x,
                    false => self.ac.forward(x),
                }
            },
        );

        let [_, c, _] = output.dims();
        output.reshape([b, c * n])
    }
}

/// A square grid of sampling points in `[-1, 1]²`.
///
/// ## Shapes
///
/// * `output` - `[S * S, 2]`
pub fn sampling_grid<B: Backend>(
    size: usize,
    device: &B::Device,
) -> Tensor<B, 2> {
    Tensor::from_data(
        TensorData::new(sampling_grid_values(size), [size * size, 2]),
        device,
    )
}

/// The values of [`sampling_grid`] in row-major order.
///
/// The `x` coordinate varies slowest. With `S == 1` the point is the center.
pub fn sampling_grid_values(size: usize) -> Vec<f32> {
    let coordinate = |index: usize| match size {
        0 | 1 => 0.0,
        _ => -1.0 + 2.0 * index as f32 / (size - 1) as f32,
    };
    (0..size * size)
        .flat_map(|index| [coordinate(index / size), coordinate(index % size)])
        .collect()
}
