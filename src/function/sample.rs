//! Pixel-aligned sampling.

pub use burn::tensor::{backend::Backend, Tensor};

/// Samples feature maps bilinearly at normalized points.
///
/// ## Shapes
///
/// * `features` - `[B, C, H, W]`
/// * `points` - `[B, N, 2]` as `(x, y)` in `[-1, 1]`
/// * `output` - `[B, C, N]`
///
/// ## Details
///
/// The corners of the map lie at `±1` on the outer pixel edges
/// (`align_corners = false`). Neighbors outside the map contribute zeros.
pub fn sample_bilinear<B: Backend>(
    features: Tensor<B, 4>,
    points: Tensor<B, 3>,
) -> Tensor<B, 3> {
    let [b, c, h, w] = features.dims();
    let [_, n, _] = points.dims();
    let device = features.device();

    // [B, C, H * W]
    let features = features.reshape([b, c, h * w]);

    // [B, N]
    let x = points.to_owned().slice([0..b, 0..n, 0..1]).reshape([b, n]);
    let y = points.slice([0..b, 0..n, 1..2]).reshape([b, n]);
    let x = ((x + 1.0) * w as f64 - 1.0) / 2.0;
    let y = ((y + 1.0) * h as f64 - 1.0) / 2.0;

    let x0 = x.to_owned().floor();
    let y0 = y.to_owned().floor();
    let x1 = x0.to_owned().add_scalar(1.0);
    let y1 = y0.to_owned().add_scalar(1.0);
    let wx1 = x - x0.to_owned();
    let wy1 = y - y0.to_owned();
    let wx0 = wx1.to_owned().neg().add_scalar(1.0);
    let wy0 = wy1.to_owned().neg().add_scalar(1.0);

    let is_inside = |v: &Tensor<B, 2>, size: usize| {
        v.to_owned().greater_equal_elem(0.0).float()
            * v.to_owned().lower_elem(size as f64).float()
    };

    [
        (x0.to_owned(), y0.to_owned(), wx0.to_owned() * wy0.to_owned()),
        (x1.to_owned(), y0, wx1.to_owned() * wy0),
        (x0, y1.to_owned(), wx0 * wy1.to_owned()),
        (x1, y1, wx1 * wy1),
    ]
    .into_iter()
    .fold(Tensor::zeros([b, c, n], &device), |output, (cx, cy, weights)| {
        let weights = weights * is_inside(&cx, w) * is_inside(&cy, h);
        let indices = (cy.clamp(0.0, (h - 1) as f64) * w as f64
            + cx.clamp(0.0, (w - 1) as f64))
        .int()
        .unsqueeze_dim::<3>(1)
        .expand([b, c, n]);

        output + features.to_owned().gather(2, indices) * weights.unsqueeze_dim::<3>(1)
    })
}
