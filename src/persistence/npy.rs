//! NumPy `.npy` encoding.
//!
//! Layout: magic `\x93NUMPY`, a two-byte version, the header length
//! (`u16` for 1.0, `u32` for 2.0, little-endian), then an ASCII Python
//! dict literal padded with spaces and terminated by `\n` so the data
//! starts on a 64-byte boundary. The raw element bytes follow unchanged.

use crate::domain::{ArrayOrder, DType};

/// File magic.
pub const MAGIC: &[u8; 6] = b"\x93NUMPY";

const ALIGN: usize = 64;

/// Renders the header dict, e.g.
/// `{'descr': '<f4', 'fortran_order': False, 'shape': (10,), }`.
#[must_use]
pub fn header_dict(dtype: &DType, shape: &[usize], order: ArrayOrder) -> String {
    let shape_repr = match shape {
        [] => "()".to_string(),
        [single] => format!("({single},)"),
        dims => format!(
            "({})",
            dims.iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", ")
        ),
    };
    let fortran = if order.is_fortran() { "True" } else { "False" };
    format!(
        "{{'descr': '{}', 'fortran_order': {fortran}, 'shape': {shape_repr}, }}",
        dtype.descr()
    )
}

/// Encodes the preamble (magic, version, length, padded header).
#[must_use]
pub fn encode_preamble(dtype: &DType, shape: &[usize], order: ArrayOrder) -> Vec<u8> {
    let dict = header_dict(dtype, shape, order);

    // Version 1.0 stores the header length in 2 bytes.
    let (version, len_bytes) = if padded_len(dict.len(), 2) <= usize::from(u16::MAX) {
        (1u8, 2usize)
    } else {
        (2u8, 4usize)
    };
    let header_len = padded_len(dict.len(), len_bytes);

    let mut out = Vec::with_capacity(MAGIC.len() + 2 + len_bytes + header_len);
    out.extend_from_slice(MAGIC);
    out.push(version);
    out.push(0);
    if len_bytes == 2 {
        let len = u16::try_from(header_len).unwrap_or(u16::MAX);
        out.extend_from_slice(&len.to_le_bytes());
    } else {
        let len = u32::try_from(header_len).unwrap_or(u32::MAX);
        out.extend_from_slice(&len.to_le_bytes());
    }
    out.extend_from_slice(dict.as_bytes());
    let padding = header_len - dict.len() - 1;
    out.extend(std::iter::repeat_n(b' ', padding));
    out.push(b'\n');
    out
}

/// Encodes a complete `.npy` file.
#[must_use]
pub fn encode(dtype: &DType, shape: &[usize], order: ArrayOrder, data: &[u8]) -> Vec<u8> {
    let mut out = encode_preamble(dtype, shape, order);
    out.extend_from_slice(data);
    out
}

/// Header length (dict + padding + newline) for a given dict length.
fn padded_len(dict_len: usize, len_bytes: usize) -> usize {
    let unpadded = MAGIC.len() + 2 + len_bytes + dict_len + 1;
    let total = unpadded.div_ceil(ALIGN) * ALIGN;
    total - (MAGIC.len() + 2 + len_bytes)
}
