use burn::tensor::{backend, Float, Tensor};

/// Padding for feature maps shaped `[N, C, H, W]`.
pub trait TensorFloatExtension {
    /// Pads both spatial dimensions by mirroring the borders (excluding the edge).
    fn pad_reflection(
        self,
        padding: usize,
    ) -> Self;

    /// Pads both spatial dimensions with zeros.
    fn pad_zeros(
        self,
        padding: usize,
    ) -> Self;
}

impl<B: backend::Backend> TensorFloatExtension for Tensor<B, 4, Float> {
    fn pad_reflection(
        self,
        padding: usize,
    ) -> Self {
        if padding == 0 {
            return self;
        }

        let [n, c, h, w] = self.dims();
        assert!(
            padding < h && padding < w,
            "The reflection padding should be less than the spatial size, \
            but got padding = {} and self.dims() = {:?}",
            padding,
            self.dims()
        );

        // [N, C, H, W + 2 * P]
        let left = self
            .to_owned()
            .slice([0..n, 0..c, 0..h, 1..padding + 1])
            .flip([3]);
        let right = self
            .to_owned()
            .slice([0..n, 0..c, 0..h, w - padding - 1..w - 1])
            .flip([3]);
        let output = Tensor::cat([left, self, right].into(), 3);
        let w = w + 2 * padding;

        // [N, C, H + 2 * P, W + 2 * P]
        let top = output
            .to_owned()
            .slice([0..n, 0..c, 1..padding + 1, 0..w])
            .flip([2]);
        let bottom = output
            .to_owned()
            .slice([0..n, 0..c, h - padding - 1..h - 1, 0..w])
            .flip([2]);
        Tensor::cat([top, output, bottom].into(), 2)
    }

    fn pad_zeros(
        self,
        padding: usize,
    ) -> Self {
        if padding == 0 {
            return self;
        }

        let [n, c, h, w] = self.dims();
        let output =
            Tensor::zeros([n, c, h + 2 * padding, w + 2 * padding], &self.device());
        output.slice_assign(
            [0..n, 0..c, padding..padding + h, padding..padding + w],
            self,
        )
    }
}

#[cfg(test)]
mod tests {
    #[test]
    fn pad_reflection() {
        use super::*;
        use burn::backend::NdArray;

        type B = NdArray<f32>;
        let device = &Default::default();

        let input = Tensor::<B, 4>::from_data(
            [[[[1.0, 2.0, 3.0], [4.0, 5.0, 6.0], [7.0, 8.0, 9.0]]]],
            device,
        );
        let output = input.pad_reflection(1);
        output.into_data().assert_eq(
            &Tensor::<B, 4>::from_data(
                [[[
                    [5.0, 4.0, 5.0, 6.0, 5.0],
                    [2.0, 1.0, 2.0, 3.0, 2.0],
                    [5.0, 4.0, 5.0, 6.0, 5.0],
                    [8.0, 7.0, 8.0, 9.0, 8.0],
                    [5.0, 4.0, 5.0, 6.0, 5.0],
                ]]],
                device,
            )
            .into_data(),
            true,
        );
    }

    #[test]
    fn pad_reflection_zero_is_identity() {
        use super::*;
        use burn::backend::NdArray;

        type B = NdArray<f32>;
        let device = &Default::default();

        let input = Tensor::<B, 4>::from_data([[[[1.0, 2.0], [3.0, 4.0]]]], device);
        let output = input.to_owned().pad_reflection(0);
        output.into_data().assert_eq(&input.into_data(), true);
    }

    #[test]
    fn pad_zeros() {
        use super::*;
        use burn::backend::NdArray;

        type B = NdArray<f32>;
        let device = &Default::default();

        let input = Tensor::<B, 4>::from_data([[[[1.0, 2.0], [3.0, 4.0]]]], device);
        let output = input.pad_zeros(1);
        assert_eq!(output.dims(), [1, 1, 4, 4]);
        output.into_data().assert_eq(
            &Tensor::<B, 4>::from_data(
                [[[
                    [0.0, 0.0, 0.0, 0.0],
                    [0.0, 1.0, 2.0, 0.0],
                    [0.0, 3.0, 4.0, 0.0],
                    [0.0, 0.0, 0.0, 0.0],
                ]]],
                device,
            )
            .into_data(),
            true,
        );
    }
}
