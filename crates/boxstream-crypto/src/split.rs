//! Fixed-size chunk splitting
//!
//! Unlike content-defined chunking, boundaries here are purely positional:
//! every piece is `max` bytes except the last, which holds the remainder.

use crate::error::{BoxStreamError, BoxStreamResult};

/// Split `data` into ordered slices no longer than `max`.
///
/// Input that already fits comes back as a single slice (including empty input).
/// Concatenating the result reproduces `data` exactly.
pub fn split(data: &[u8], max: usize) -> BoxStreamResult<Vec<&[u8]>> {
    if max == 0 {
        return Err(BoxStreamError::InvalidSplitSize);
    }

    if data.len() <= max {
        return Ok(vec![data]);
    }

    Ok(data.chunks(max).collect())
}
