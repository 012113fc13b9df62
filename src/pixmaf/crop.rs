//! Cropping the feature pyramid to the person.

pub use super::*;

/// Square box around the person in source-image pixels.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingBox {
    pub center_x: f64,
    pub center_y: f64,
    pub side: f64,
}

/// Source image and base feature map sizes relating boxes to windows.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct CropReference {
    pub image_height: usize,
    pub image_width: usize,
    pub feature_height: usize,
    pub feature_width: usize,
}

/// Integer square window of a feature map.
///
/// The origin may lie outside the map.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct CropWindow {
    pub x: i64,
    pub y: i64,
    pub side: usize,
}

impl BoundingBox {
    #[inline]
    pub const fn new(
        center_x: f64,
        center_y: f64,
        side: f64,
    ) -> Self {
        Self {
            center_x,
            center_y,
            side,
        }
    }

    /// The crop resolution in pixels used by the camera projection.
    #[inline]
    pub fn resolution(&self) -> f64 {
        self.side.trunc()
    }

    #[inline]
    pub fn is_finite(&self) -> bool {
        self.center_x.is_finite() && self.center_y.is_finite() && self.side.is_finite()
    }
}

impl CropReference {
    /// A `256 × 512` image with a `32 × 64` base feature map.
    pub const GLOBAL: Self = Self {
        image_height: 256,
        image_width: 512,
        feature_height: 32,
        feature_width: 64,
    };

    /// Maps the box to a window of the base feature map.
    pub fn window(
        &self,
        bbox: &BoundingBox,
    ) -> Result<CropWindow, Error> {
        if !bbox.is_finite() {
            return Err(Error::ShapeMismatch(
                format!("The bounding box ({bbox:?})"),
                "finite".into(),
            ));
        }

        let x1 = bbox.center_x - bbox.side / 2.0;
        let y1 = bbox.center_y - bbox.side / 2.0;
        let side = (bbox.side / self.image_height as f64 * self.feature_height as f64)
            .floor();
        let x = (x1 / self.image_width as f64 * self.feature_width as f64).floor();
        let y = (y1 / self.image_height as f64 * self.feature_height as f64).floor();

        if side < 1.0 {
            return Err(Error::ShapeMismatch(
                format!("The window side of bounding box ({bbox:?}) ({side})"),
                "positive".into(),
            ));
        }

        Ok(CropWindow {
            x: x as i64,
            y: y as i64,
            side: side as usize,
        })
    }
}

impl CropWindow {
    /// The window on the pyramid level `step` levels above the base.
    #[inline]
    pub fn at_step(
        &self,
        step: usize,
    ) -> Self {
        let scale = 1 << step;
        Self {
            x: self.x * scale as i64,
            y: self.y * scale as i64,
            side: self.side * scale,
        }
    }

    /// Zero padding on every side needed to keep the window inside the map.
    pub fn padding(
        &self,
        height: usize,
        width: usize,
    ) -> usize {
        let side = self.side as i64;
        [
            -self.x,
            -self.y,
            self.x + side - width as i64,
            self.y + side - height as i64,
            0,
        ]
        .into_iter()
        .max()
        .unwrap_or_default() as usize
    }
}

/// Crops the feature maps with one window.
///
/// ## Shapes
///
/// * `features` - `[N, C, H, W]`
/// * `output` - `[N, C, S, S]`
///   - `S` is [`CropWindow::side`].
pub fn crop_feature<B: Backend>(
    features: Tensor<B, 4>,
    window: &CropWindow,
) -> Tensor<B, 4> {
    let [n, c, h, w] = features.dims();
    let padding = window.padding(h, w);
    let x = (window.x + padding as i64) as usize;
    let y = (window.y + padding as i64) as usize;
    let side = window.side;

    features
        .pad_zeros(padding)
        .slice([0..n, 0..c, y..y + side, x..x + side])
}

/// Crops each sample with its own window at the pyramid level `step`.
///
/// ## Shapes
///
/// * `features` - `[B, C, H, W]`
/// * `windows` - `[B]` on the base feature map
/// * `output` - `[B, C, S, S]`
pub fn crop_batch<B: Backend>(
    features: Tensor<B, 4>,
    windows: &[CropWindow],
    step: usize,
) -> Result<Tensor<B, 4>, Error> {
    let [b, c, h, w] = features.dims();
    if windows.len() != b {
        return Err(Error::ShapeMismatch(
            format!("The count of crop windows ({})", windows.len()),
            format!("{b}"),
        ));
    }

    let windows = windows
        .iter()
        .map(|window| window.at_step(step))
        .collect::<Vec<_>>();
    let Some(first) = windows.first() else {
        return Ok(features);
    };
    if let Some(window) = windows.iter().find(|window| window.side != first.side) {
        return Err(Error::ShapeMismatch(
            format!("The side of crop window ({window:?})"),
            format!("{}", first.side),
        ));
    }

    if windows.iter().all(|window| window == first) {
        return Ok(crop_feature(features, first));
    }

    let crops = windows
        .iter()
        .enumerate()
        .map(|(index, window)| {
            let sample = features.to_owned().slice([index..index + 1, 0..c, 0..h, 0..w]);
            crop_feature(sample, window)
        })
        .collect();
    Ok(Tensor::cat(crops, 0))
}
