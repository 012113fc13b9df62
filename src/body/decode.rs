//! Decoding of raw `f32` assets.

pub use crate::error::Error;

use std::io::Read;

/// Reads every byte and decodes them as native-endian `f32` values.
///
/// The count of values should be `count`.
pub fn decode_f32s(
    reader: &mut impl Read,
    count: usize,
    name: &str,
) -> Result<Vec<f32>, Error> {
    let mut bytes = Vec::with_capacity(count * size_of::<f32>());
    reader.read_to_end(&mut bytes)?;
    decode_f32s_from_bytes(&bytes, count, name)
}

/// Decodes native-endian `f32` values.
pub fn decode_f32s_from_bytes(
    bytes: &[u8],
    count: usize,
    name: &str,
) -> Result<Vec<f32>, Error> {
    if bytes.len() != count * size_of::<f32>() {
        return Err(Error::InvalidData(
            format!("The byte count of {name} ({})", bytes.len()),
            format!("{}", count * size_of::<f32>()),
        ));
    }

    Ok(bytemuck::pod_collect_to_vec(bytes))
}
