pub use super::*;

/// The configuration for [`ResnetBlock`]
#[derive(Config, Copy, Debug)]
pub struct ResnetBlockConfig {
    /// Input and output channels.
    pub channels: usize,
}

/// Residual block with reflection padding.
///
/// `input + N(C(P(ReLU(N(C(P(input)))))))`
#[derive(Debug, Module)]
pub struct ResnetBlock<B: Backend> {
    pub conv1: Conv2d<B>,
    pub norm1: InstanceNorm<B>,
    pub ac1: Relu,
    pub conv2: Conv2d<B>,
    pub norm2: InstanceNorm<B>,
}

impl ResnetBlockConfig {
    /// Initialize from the configuration.
    pub fn init<B: Backend>(
        &self,
        device: &B::Device,
    ) -> ResnetBlock<B> {
        let channels = self.channels;
        let conv = || Conv2dConfig::new([channels, channels], [3, 3]).init(device);

        ResnetBlock {
            conv1: conv(),
            norm1: instance_norm(channels, device),
            ac1: Relu::new(),
            conv2: conv(),
            norm2: instance_norm(channels, device),
        }
    }
}

impl<B: Backend> ResnetBlock<B> {
    /// ## Shapes
    ///
    /// * `input` - `[N, C, H, W]`
    /// * `output` - `[N, C, H, W]`
    pub fn forward(
        &self,
        input: Tensor<B, 4>,
    ) -> Tensor<B, 4> {
        let mut x = input.to_owned().pad_reflection(1);
        x = self.conv1.forward(x);
        x = self.norm1.forward(x);
        x = self.ac1.forward(x);
        x = x.pad_reflection(1);
        x = self.conv2.forward(x);
        x = self.norm2.forward(x);
        input + x
    }
}

#[cfg(test)]
mod tests {
    #[test]
    fn forward_keeps_shape() {
        use super::*;
        use burn::backend::NdArray;

        type B = NdArray<f32>;
        let device = &Default::default();

        let block = ResnetBlockConfig::new(4).init::<B>(device);
        let input = Tensor::<B, 4>::ones([2, 4, 5, 7], device);
        let output = block.forward(input);

        assert_eq!(output.dims(), [2, 4, 5, 7]);
    }

    #[test]
    fn forward_constant_is_identity() {
        use super::*;
        use burn::backend::NdArray;

        type B = NdArray<f32>;
        let device = &Default::default();

        // A constant map is normalized to zeros per instance.
        let block = ResnetBlockConfig::new(3).init::<B>(device);
        let input = Tensor::<B, 4>::full([1, 3, 4, 4], 2.5, device);
        let output = block.forward(input.to_owned());

        output.into_data().assert_approx_eq(&input.into_data(), 4);
    }
}
