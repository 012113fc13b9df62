//! The encoder of the global generator.

pub use super::*;

/// The configuration for [`DownSampling`]
#[derive(Config, Debug)]
pub struct DownSamplingConfig {
    /// Channels of the conditioning input.
    #[config(default = 6)]
    pub dim_input: usize,
    /// Channels of the stem convolution.
    #[config(default = 64)]
    pub ngf: usize,
    /// Stride-2 convolutions after the stem.
    #[config(default = 4)]
    pub n_downsampling: usize,
    /// Residual blocks at the lowest resolution.
    #[config(default = 9)]
    pub n_blocks: usize,
}

/// Encoder mapping the conditioning images to the lowest pyramid level.
///
/// ## Details
///
/// The stem is a `7 × 7` convolution on a reflection-padded input. Every
/// following convolution halves the resolution and doubles the channels.
#[derive(Debug, Module)]
pub struct DownSampling<B: Backend> {
    pub stem: Conv2d<B>,
    pub stem_norm: InstanceNorm<B>,
    pub convs: Vec<Conv2d<B>>,
    pub norms: Vec<InstanceNorm<B>>,
    pub blocks: Vec<ResnetBlock<B>>,
    pub ac: Relu,
}

impl DownSamplingConfig {
    /// Channels of the output.
    #[inline]
    pub fn dim_output(&self) -> usize {
        self.ngf << self.n_downsampling
    }

    /// Ratio between the input and the output resolution.
    #[inline]
    pub fn scale(&self) -> usize {
        1 << self.n_downsampling
    }

    /// Initialize from the configuration.
    pub fn init<B: Backend>(
        &self,
        device: &B::Device,
    ) -> DownSampling<B> {
        let stem = Conv2dConfig::new([self.dim_input, self.ngf], [7, 7]).init(device);
        let stem_norm = instance_norm(self.ngf, device);

        let (convs, norms) = (0..self.n_downsampling)
            .map(|index| {
                let channels = self.ngf << index;
                let conv = Conv2dConfig::new([channels, channels * 2], [3, 3])
                    .with_stride([2, 2])
                    .with_padding(PaddingConfig2d::Explicit(1, 1))
                    .init(device);
                (conv, instance_norm(channels * 2, device))
            })
            .unzip();

        let blocks = (0..self.n_blocks)
            .map(|_| ResnetBlockConfig::new(self.dim_output()).init(device))
            .collect();

        DownSampling {
            stem,
            stem_norm,
            convs,
            norms,
            blocks,
            ac: Relu::new(),
        }
    }
}

impl<B: Backend> DownSampling<B> {
    /// ## Shapes
    ///
    /// * `input` - [`[N, dim_input, H, W]`](DownSamplingConfig::dim_input)
    /// * `output` - `[N, ngf * S, H / S, W / S]`
    ///   - `S` is [`DownSamplingConfig::scale`].
    pub fn forward(
        &self,
        input: Tensor<B, 4>,
    ) -> Tensor<B, 4> {
        let mut x = input.pad_reflection(3);
        x = self.stem.forward(x);
        x = self.stem_norm.forward(x);
        x = self.ac.forward(x);

        for (conv, norm) in self.convs.iter().zip(&self.norms) {
            x = conv.forward(x);
            x = norm.forward(x);
            x = self.ac.forward(x);
        }

        self.blocks.iter().fold(x, |x, block| block.forward(x))
    }
}

impl Default for DownSamplingConfig {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}
