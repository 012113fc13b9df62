//! The pose-conditioned image generator.
//!
//! The encoder and the deconvolution stack follow the global generator
//! of pix2pixHD. The deconvolution stack is exposed block by block so that
//! the mesh regression can read every level of the feature pyramid.

pub mod down_sampling;
pub mod resnet_block;
pub mod up_sampling;

pub use crate::function::TensorFloatExtension;
pub use burn::{
    config::Config,
    module::Module,
    nn::{
        conv::{Conv2d, Conv2dConfig, ConvTranspose2d, ConvTranspose2dConfig},
        InstanceNorm, InstanceNormConfig, PaddingConfig2d, Relu,
    },
    tensor::{backend::Backend, Tensor},
};
pub use down_sampling::*;
pub use resnet_block::*;
pub use up_sampling::*;

/// Instance normalization without affine parameters.
pub(crate) fn instance_norm<B: Backend>(
    channels: usize,
    device: &B::Device,
) -> InstanceNorm<B> {
    InstanceNormConfig::new(channels)
        .with_affine(false)
        .init(device)
}
