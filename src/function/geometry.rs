//! Rotation and camera geometry for body-model regression.

pub use super::tensor_extensions::TensorRowExtension;
pub use burn::tensor::{backend::Backend, Tensor};

use std::f64::consts::FRAC_PI_2;

/// The focal length of the virtual perspective camera in pixels.
pub const FOCAL_LENGTH: f64 = 5000.0;

/// Converts 6D rotation codes into rotation matrices.
///
/// ## Shapes
///
/// * `codes` - `[N, J * 6]`
/// * `output` - `[N * J, 3, 3]`
///
/// ## Details
///
/// Each code is read as a `3 × 2` matrix whose columns are orthonormalized
/// with Gram-Schmidt. The third column is their cross product.
pub fn rot6d_to_rotmat<B: Backend>(codes: Tensor<B, 2>) -> Tensor<B, 3> {
    let [n, d] = codes.dims();
    assert_eq!(d % 6, 0, "The width of 6D codes should be a multiple of 6");
    let count = n * d / 6;

    // [N * J, 3, 2]
    let codes = codes.reshape([count, 3, 2]);
    let a1 = codes
        .to_owned()
        .slice([0..count, 0..3, 0..1])
        .reshape([count, 3]);
    let a2 = codes.slice([0..count, 0..3, 1..2]).reshape([count, 3]);

    let b1 = a1.normalize_rows();
    let dot = (b1.to_owned() * a2.to_owned()).sum_dim(1);
    let b2 = (a2 - b1.to_owned() * dot).normalize_rows();
    let b3 = b1.to_owned().cross_rows(b2.to_owned());

    Tensor::stack::<3>([b1, b2, b3].into(), 2)
}

/// Converts unit quaternions in scalar-first order `[w, x, y, z]` into rotation matrices.
///
/// ## Shapes
///
/// * `quaternions` - `[N, 4]`
/// * `output` - `[N, 3, 3]`
pub fn quaternion_to_rotmat<B: Backend>(quaternions: Tensor<B, 2>) -> Tensor<B, 3> {
    let [n, _] = quaternions.dims();
    let q = quaternions.normalize_rows();
    let part = |index: usize| q.to_owned().slice([0..n, index..index + 1]);
    let (w, x, y, z) = (part(0), part(1), part(2), part(3));

    let (w2, x2, y2, z2) = (
        w.to_owned().powf_scalar(2.0),
        x.to_owned().powf_scalar(2.0),
        y.to_owned().powf_scalar(2.0),
        z.to_owned().powf_scalar(2.0),
    );
    let (wx, wy, wz) = (
        w.to_owned() * x.to_owned(),
        w.to_owned() * y.to_owned(),
        w * z.to_owned(),
    );
    let (xy, xz, yz) = (
        x.to_owned() * y.to_owned(),
        x * z.to_owned(),
        y * z,
    );

    // [N, 9]
    let entries = Tensor::cat(
        [
            w2.to_owned() + x2.to_owned() - y2.to_owned() - z2.to_owned(),
            (xy.to_owned() - wz.to_owned()) * 2.0,
            (wy.to_owned() + xz.to_owned()) * 2.0,
            (wz + xy) * 2.0,
            w2.to_owned() - x2.to_owned() + y2.to_owned() - z2.to_owned(),
            (yz.to_owned() - wx.to_owned()) * 2.0,
            (xz - wy) * 2.0,
            (wx + yz) * 2.0,
            w2 - x2 - y2 + z2,
        ]
        .into(),
        1,
    );

    entries.reshape([n, 3, 3])
}

/// Converts axis-angle vectors into rotation matrices.
///
/// ## Shapes
///
/// * `axis_angles` - `[N, 3]`
/// * `output` - `[N, 3, 3]`
pub fn axis_angle_to_rotmat<B: Backend>(axis_angles: Tensor<B, 2>) -> Tensor<B, 3> {
    let angles = axis_angles.to_owned().add_scalar(1e-8).norm_rows();
    let axes = axis_angles / angles.to_owned();
    let angles_half = angles / 2.0;

    let quaternions = Tensor::cat(
        [angles_half.to_owned().cos(), axes * angles_half.sin()].into(),
        1,
    );

    quaternion_to_rotmat(quaternions)
}

/// Converts rotation matrices into axis-angle vectors.
///
/// ## Shapes
///
/// * `rotmats` - `[N, 3, 3]`
/// * `output` - `[N, 3]`
///
/// ## Details
///
/// The quaternion is recovered from the largest of the four diagonal
/// combinations, so the conversion stays stable near a half turn.
pub fn rotmat_to_axis_angle<B: Backend>(rotmats: Tensor<B, 3>) -> Tensor<B, 2> {
    let [n, _, _] = rotmats.dims();
    let r = rotmats.reshape([n, 9]);
    let e = |row: usize, col: usize| {
        let index = row * 3 + col;
        r.to_owned().slice([0..n, index..index + 1])
    };

    let (r00, r01, r02) = (e(0, 0), e(0, 1), e(0, 2));
    let (r10, r11, r12) = (e(1, 0), e(1, 1), e(1, 2));
    let (r20, r21, r22) = (e(2, 0), e(2, 1), e(2, 2));

    // [N, 1] * 4
    let t0 = (r00.to_owned() + r11.to_owned() + r22.to_owned()).add_scalar(1.0);
    let t1 = (r00.to_owned() - r11.to_owned() - r22.to_owned()).add_scalar(1.0);
    let t2 = (r11.to_owned() - r00.to_owned() - r22.to_owned()).add_scalar(1.0);
    let t3 = (r22 - r00 - r11).add_scalar(1.0);

    let s21 = r21.to_owned() + r12.to_owned();
    let d21 = r21 - r12;
    let s02 = r02.to_owned() + r20.to_owned();
    let d02 = r02 - r20;
    let s10 = r10.to_owned() + r01.to_owned();
    let d10 = r10 - r01;

    // [N, 4, 4] (case, [w, x, y, z])
    let candidates = Tensor::stack::<3>(
        [
            Tensor::cat(
                [t0.to_owned(), d21.to_owned(), d02.to_owned(), d10.to_owned()].into(),
                1,
            ),
            Tensor::cat(
                [d21.to_owned(), t1.to_owned(), s10.to_owned(), s02.to_owned()].into(),
                1,
            ),
            Tensor::cat(
                [d02, s10.to_owned(), t2.to_owned(), s21.to_owned()].into(),
                1,
            ),
            Tensor::cat([d10, s02, s21, t3.to_owned()].into(), 1),
        ]
        .into(),
        1,
    );

    // [N, 1, 4]
    let cases = Tensor::cat([t0, t1, t2, t3].into(), 1)
        .argmax(1)
        .unsqueeze_dim::<3>(2)
        .expand([n, 1, 4]);

    // [N, 4]
    let quaternions = candidates.gather(1, cases).reshape([n, 4]).normalize_rows();
    let sign = quaternions
        .to_owned()
        .slice([0..n, 0..1])
        .lower_elem(0.0)
        .float()
        .mul_scalar(-2.0)
        .add_scalar(1.0);
    let quaternions = quaternions * sign;

    let w = quaternions.to_owned().slice([0..n, 0..1]);
    let v = quaternions.slice([0..n, 1..4]);
    let s = v.to_owned().norm_rows();

    // atan2(s, w) with s >= 0 and w >= 0
    let is_steep = s.to_owned().greater(w.to_owned());
    let lo = s.to_owned().mask_where(is_steep.to_owned(), w.to_owned());
    let hi = w.mask_where(is_steep.to_owned(), s.to_owned());
    let ratio = atan_unit(lo / hi.clamp_min(1e-12));
    let angles_half = ratio
        .to_owned()
        .mask_where(is_steep, ratio.neg().add_scalar(FRAC_PI_2));

    let factors = (angles_half * 2.0 / s.to_owned().clamp_min(1e-12))
        .mask_fill(s.lower_elem(1e-6), 2.0);

    v * factors
}

/// Arctangent on `[0, 1]` with an odd minimax polynomial.
fn atan_unit<B: Backend>(ratio: Tensor<B, 2>) -> Tensor<B, 2> {
    const COEFFICIENTS: [f64; 6] = [
        -0.01172120,
        0.05265332,
        -0.11643287,
        0.19354346,
        -0.33262347,
        0.99997726,
    ];

    let ratio_2 = ratio.to_owned().powf_scalar(2.0);
    let poly = COEFFICIENTS[1..]
        .iter()
        .fold(ratio_2.zeros_like().add_scalar(COEFFICIENTS[0]), |poly, &c| {
            (poly * ratio_2.to_owned()).add_scalar(c)
        });

    poly * ratio
}

/// Projects 3D points with the weak-perspective camera.
///
/// ## Shapes
///
/// * `points` - `[B, N, 3]`
/// * `cameras` - `[B, 3]` as `(scale, translation_x, translation_y)`
/// * `resolutions` - `[B, 1]` as the side length of the crop in pixels
/// * `output` - `[B, N, 2]` in normalized coordinates
///
/// ## Details
///
/// The camera is placed at depth `2 * f / (resolution * scale)` and the
/// projected pixels are divided by `resolution / 2`.
pub fn projection<B: Backend>(
    points: Tensor<B, 3>,
    cameras: Tensor<B, 2>,
    resolutions: Tensor<B, 2>,
) -> Tensor<B, 3> {
    let [b, n, _] = points.dims();

    // [B, 1] * 3
    let scales = cameras.to_owned().slice([0..b, 0..1]);
    let translations_x = cameras.to_owned().slice([0..b, 1..2]);
    let translations_y = cameras.slice([0..b, 2..3]);
    let translations_z = (resolutions.to_owned() * scales)
        .add_scalar(1e-9)
        .recip()
        .mul_scalar(2.0 * FOCAL_LENGTH);

    // [B, 1, 3]
    let translations = Tensor::cat(
        [translations_x, translations_y, translations_z].into(),
        1,
    )
    .unsqueeze_dim::<3>(1);

    // [B, N, 3]
    let points = points + translations;
    let depths = points.to_owned().slice([0..b, 0..n, 2..3]);
    let pixels = points.slice([0..b, 0..n, 0..2]) / depths * FOCAL_LENGTH;

    pixels / (resolutions / 2.0).unsqueeze_dim::<3>(2)
}
