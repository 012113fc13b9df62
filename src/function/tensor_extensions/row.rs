use burn::tensor::{backend, Float, Tensor};

/// Row-wise vector operations for tensors shaped `[N, D]`.
pub trait TensorRowExtension {
    /// Cross products of 3D row vectors.
    fn cross_rows(
        self,
        other: Self,
    ) -> Self;

    /// Euclidean norms shaped `[N, 1]`.
    fn norm_rows(self) -> Self;

    /// Unit row vectors. Rows with a vanishing norm are divided by `1e-12`.
    fn normalize_rows(self) -> Self;
}

impl<B: backend::Backend> TensorRowExtension for Tensor<B, 2, Float> {
    fn cross_rows(
        self,
        other: Self,
    ) -> Self {
        let [n, d] = self.dims();
        assert_eq!(d, 3, "The cross product is only defined for 3D rows");

        let column = |tensor: &Self, index: usize| {
            tensor.to_owned().slice([0..n, index..index + 1])
        };
        let (a0, a1, a2) = (column(&self, 0), column(&self, 1), column(&self, 2));
        let (b0, b1, b2) = (column(&other, 0), column(&other, 1), column(&other, 2));

        Tensor::cat(
            [
                a1.to_owned() * b2.to_owned() - a2.to_owned() * b1.to_owned(),
                a2 * b0.to_owned() - a0.to_owned() * b2,
                a0 * b1 - a1 * b0,
            ]
            .into(),
            1,
        )
    }

    fn norm_rows(self) -> Self {
        self.powf_scalar(2.0).sum_dim(1).sqrt()
    }

    fn normalize_rows(self) -> Self {
        let norm = self.to_owned().norm_rows().clamp_min(1e-12);
        self / norm
    }
}
