//! The deconvolution stack and the image head of the global generator.

pub use super::*;

use burn::tensor::activation::tanh;

/// The configuration for [`UpSampling`]
#[derive(Config, Copy, Debug)]
pub struct UpSamplingConfig {
    /// Channels of the stem convolution of the encoder.
    #[config(default = 64)]
    pub ngf: usize,
    /// Deconvolution blocks, one per encoder downsampling.
    #[config(default = 4)]
    pub n_downsampling: usize,
    /// Channels of the synthesized image.
    #[config(default = 3)]
    pub dim_output: usize,
}

/// Deconvolution stack producing the feature pyramid and the image.
///
/// ## Details
///
/// Block `i` maps `ngf · 2^(n - i)` channels to half as many and doubles
/// the resolution. The head is a `7 × 7` convolution on a
/// reflection-padded map followed by `tanh`.
#[derive(Debug, Module)]
pub struct UpSampling<B: Backend> {
    pub deconvs: Vec<ConvTranspose2d<B>>,
    pub norms: Vec<InstanceNorm<B>>,
    pub ac: Relu,
    pub head: Conv2d<B>,
}

impl UpSamplingConfig {
    /// Input channels of the block at `index`.
    ///
    /// `index == n_downsampling` gives the channels of the last pyramid level.
    /// `index` should be at most `n_downsampling`.
    #[inline]
    pub fn channels(
        &self,
        index: usize,
    ) -> usize {
        debug_assert!(index <= self.n_downsampling, "index ({index}) <= n_downsampling");
        self.ngf << (self.n_downsampling - index)
    }

    /// Initialize from the configuration.
    pub fn init<B: Backend>(
        &self,
        device: &B::Device,
    ) -> UpSampling<B> {
        let (deconvs, norms) = (0..self.n_downsampling)
            .map(|index| {
                let channels = self.channels(index);
                let deconv = ConvTranspose2dConfig::new([channels, channels / 2], [3, 3])
                    .with_stride([2, 2])
                    .with_padding([1, 1])
                    .with_padding_out([1, 1])
                    .init(device);
                (deconv, instance_norm(channels / 2, device))
            })
            .unzip();

        let head = Conv2dConfig::new([self.ngf, self.dim_output], [7, 7]).init(device);

        UpSampling {
            deconvs,
            norms,
            ac: Relu::new(),
            head,
        }
    }
}

impl<B: Backend> UpSampling<B> {
    /// Count of deconvolution blocks.
    #[inline]
    pub fn block_count(&self) -> usize {
        self.deconvs.len()
    }

    /// Runs the deconvolution block at `index`, which should be less than
    /// [`UpSampling::block_count`].
    ///
    /// ## Shapes
    ///
    /// * `input` - `[N, C, H, W]`
    /// * `output` - `[N, C / 2, H * 2, W * 2]`
    pub fn forward_block(
        &self,
        index: usize,
        input: Tensor<B, 4>,
    ) -> Tensor<B, 4> {
        debug_assert!(index < self.block_count(), "index ({index}) < block_count");
        let mut x = self.deconvs[index].forward(input);
        x = self.norms[index].forward(x);
        self.ac.forward(x)
    }

    /// Synthesizes the image from the last pyramid level.
    ///
    /// ## Shapes
    ///
    /// * `input` - `[N, ngf, H, W]`
    /// * `output` - `[N, dim_output, H, W]` in `[-1, 1]`
    pub fn forward_output(
        &self,
        input: Tensor<B, 4>,
    ) -> Tensor<B, 4> {
        tanh(self.head.forward(input.pad_reflection(3)))
    }

    /// Runs all blocks and the head.
    pub fn forward(
        &self,
        input: Tensor<B, 4>,
    ) -> Tensor<B, 4> {
        let x = (0..self.block_count())
            .fold(input, |x, index| self.forward_block(index, x));
        self.forward_output(x)
    }
}

impl Default for UpSamplingConfig {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type B = NdArray<f32>;

    #[test]
    fn channels() {
        let config = UpSamplingConfig::default();
        assert_eq!(config.channels(0), 1024);
        assert_eq!(config.channels(1), 512);
        assert_eq!(config.channels(3), 128);
        assert_eq!(config.channels(4), 64);
    }

    #[cfg(debug_assertions)]
    #[test]
    #[should_panic(expected = "n_downsampling")]
    fn channels_past_last_level() {
        UpSamplingConfig::default().channels(5);
    }

    #[test]
    #[should_panic]
    fn forward_block_past_last_block() {
        let device = &Default::default();
        let decoder = UpSamplingConfig::new()
            .with_ngf(2)
            .with_n_downsampling(1)
            .init::<B>(device);

        decoder.forward_block(1, Tensor::ones([1, 2, 3, 5], device));
    }

    #[test]
    fn forward_block_doubles_resolution() {
        let device = &Default::default();
        let config = UpSamplingConfig::new().with_ngf(2).with_n_downsampling(3);
        let decoder = config.init::<B>(device);
        assert_eq!(decoder.block_count(), 3);

        let input = Tensor::<B, 4>::ones([1, 16, 3, 5], device);
        let output = decoder.forward_block(0, input);
        assert_eq!(output.dims(), [1, 8, 6, 10]);

        let output = decoder.forward_block(1, output);
        assert_eq!(output.dims(), [1, 4, 12, 20]);
    }

    #[test]
    fn forward_output_range() {
        let device = &Default::default();
        let config = UpSamplingConfig::new().with_ngf(2).with_n_downsampling(2);
        let decoder = config.init::<B>(device);

        let input = Tensor::<B, 4>::random(
            [2, 8, 4, 4],
            burn::tensor::Distribution::Default,
            device,
        );
        let output = decoder.forward(input);
        assert_eq!(output.dims(), [2, 3, 16, 16]);

        let output = output.into_data().to_vec::<f32>().unwrap();
        assert!(output.iter().all(|v| (-1.0..=1.0).contains(v)));
    }
}
