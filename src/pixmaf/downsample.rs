//! Sparse sampling mesh.

pub use super::*;

use std::{fmt, io::Read};

/// Linear map from the full body mesh to the sparse sampling mesh.
#[derive(Module)]
pub struct MeshDownsampler<B: Backend> {
    /// `[M, V]`
    pub matrix: Param<Tensor<B, 2>>,
}

impl<B: Backend> MeshDownsampler<B> {
    /// Selects every `V / M`-th vertex.
    pub fn strided(
        point_count: usize,
        vertex_count: usize,
        device: &B::Device,
    ) -> Result<Self, Error> {
        if point_count == 0 || point_count > vertex_count {
            return Err(Error::Configuration(
                format!("The point count of mesh downsampler ({point_count})"),
                format!("in 1..={vertex_count}"),
            ));
        }

        let mut matrix = vec![0.0; point_count * vertex_count];
        (0..point_count).for_each(|row| {
            matrix[row * vertex_count + row * vertex_count / point_count] = 1.0;
        });

        Self::from_matrix(matrix, point_count, vertex_count, device)
    }

    /// ## Arguments
    ///
    /// * `matrix` - `[M, V]` in row-major order
    pub fn from_matrix(
        matrix: Vec<f32>,
        point_count: usize,
        vertex_count: usize,
        device: &B::Device,
    ) -> Result<Self, Error> {
        if matrix.len() != point_count * vertex_count {
            return Err(Error::InvalidData(
                format!("The length of mesh downsampler matrix ({})", matrix.len()),
                format!("{point_count} * {vertex_count}"),
            ));
        }

        Ok(Self {
            matrix: constant_param(matrix, [point_count, vertex_count], device),
        })
    }

    /// Decode from native-endian `f32` values of a row-major `[M, V]` matrix.
    pub fn decode(
        reader: &mut impl Read,
        point_count: usize,
        vertex_count: usize,
        device: &B::Device,
    ) -> Result<Self, Error> {
        let matrix = decode_f32s(
            reader,
            point_count * vertex_count,
            "mesh downsampler matrix",
        )?;
        Self::from_matrix(matrix, point_count, vertex_count, device)
    }

    /// `M`
    #[inline]
    pub fn point_count(&self) -> usize {
        self.matrix.dims()[0]
    }

    /// `V`
    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.matrix.dims()[1]
    }

    /// ## Shapes
    ///
    /// * `vertices` - `[B, V, 3]`
    /// * `output` - `[B, M, 3]`
    pub fn forward(
        &self,
        vertices: Tensor<B, 3>,
    ) -> Tensor<B, 3> {
        let [b, ..] = vertices.dims();
        let [m, v] = self.matrix.dims();

        self.matrix
            .val()
            .detach()
            .unsqueeze_dim::<3>(0)
            .expand([b, m, v])
            .matmul(vertices)
    }
}

impl<B: Backend> fmt::Debug for MeshDownsampler<B> {
    fn fmt(
        &self,
        f: &mut fmt::Formatter,
    ) -> fmt::Result {
        f.debug_struct(&format!("MeshDownsampler<{}>", B::name()))
            .field("matrix.dims()", &self.matrix.dims())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type B = NdArray<f32>;

    #[test]
    fn strided_selects_vertices() {
        let device = &Default::default();
        let downsampler = MeshDownsampler::<B>::strided(3, 7, device).unwrap();
        assert_eq!(downsampler.point_count(), 3);
        assert_eq!(downsampler.vertex_count(), 7);

        let vertices = Tensor::<B, 1, burn::tensor::Int>::arange(0..21, device)
            .float()
            .reshape([1, 7, 3]);
        let output = downsampler.forward(vertices);

        // Rows 0, 2 and 4 of the mesh
        let target = Tensor::<B, 3>::from_data(
            [[[0.0, 1.0, 2.0], [6.0, 7.0, 8.0], [12.0, 13.0, 14.0]]],
            device,
        );
        output.into_data().assert_eq(&target.into_data(), true);
    }

    #[test]
    fn strided_default_sizes() {
        let device = &Default::default();
        let downsampler = MeshDownsampler::<B>::strided(431, 6890, device).unwrap();
        let vertices = Tensor::<B, 3>::zeros([2, 6890, 3], device);
        assert_eq!(downsampler.forward(vertices).dims(), [2, 431, 3]);
    }

    #[test]
    fn decode_invalid() {
        let device = &Default::default();
        let bytes = vec![0_u8; 4 * 5];

        let output = MeshDownsampler::<B>::decode(&mut bytes.as_slice(), 2, 3, device);
        assert!(matches!(output, Err(Error::InvalidData(..))), "{output:?}");

        let output = MeshDownsampler::<B>::decode(&mut bytes.as_slice(), 1, 5, device);
        assert!(output.is_ok());

        let output = MeshDownsampler::<B>::strided(0, 5, device);
        assert!(matches!(output, Err(Error::Configuration(..))), "{output:?}");
    }
}
