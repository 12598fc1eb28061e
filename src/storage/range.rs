//! Byte-range resolution: HTTP Range header parsing and mapping a
//! requested interval onto the covering blocks of a file.
//!
//! All intervals here are inclusive `[start, end]`, matching HTTP Range
//! semantics. An unsatisfiable or malformed header parses to `None` and
//! the caller falls back to serving the full content.

/// Read window for open-ended `bytes=n-` requests: 4 GiB.
pub const DEFAULT_RANGE_WINDOW: u64 = 4 * 1024 * 1024 * 1024;

/// One block's share of a requested byte interval.
///
/// `start` and `end` are inclusive offsets local to the block. Interior
/// blocks always cover their full extent; only the first and last
/// selected blocks can be trimmed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockSpan {
    /// Index into the file's ordered block list.
    pub index: usize,
    /// Inclusive local start offset within the block.
    pub start: u64,
    /// Inclusive local end offset within the block.
    pub end: u64,
}

impl BlockSpan {
    /// Whether this span trims the block (of `block_len` actual bytes)
    /// rather than covering it whole.
    pub fn is_partial(&self, block_len: u64) -> bool {
        self.start > 0 || self.end + 1 < block_len
    }
}

/// Map the inclusive interval `[start, end]` onto the blocks that cover
/// it. `block_sizes` lists each block's byte size in order; all blocks
/// share the uniform size `block_size` except possibly the last.
///
/// Selection is plain floor division: byte `n` lives in block
/// `n / block_size`. Local offsets are `start % block_size` on the
/// first selected block and `end % block_size` on the last.
pub fn resolve(block_sizes: &[u64], block_size: u64, start: u64, end: u64) -> Vec<BlockSpan> {
    debug_assert!(start <= end);
    if block_sizes.is_empty() {
        return Vec::new();
    }

    let last = block_sizes.len() - 1;
    let first_idx = ((start / block_size) as usize).min(last);
    let last_idx = ((end / block_size) as usize).min(last);

    (first_idx..=last_idx)
        .map(|index| {
            let local_start = if index == first_idx { start % block_size } else { 0 };
            let block_end = block_sizes[index].saturating_sub(1);
            let local_end = if index == last_idx {
                (end % block_size).min(block_end)
            } else {
                block_end
            };
            BlockSpan {
                index,
                start: local_start,
                end: local_end,
            }
        })
        .collect()
}

/// Parse a `Range` header against a resource of `size` bytes.
///
/// Grammar handled: `bytes=a-b`, `bytes=-n` (suffix), `bytes=a-`
/// (open-ended, served up to `window` bytes past `a`). The end is
/// clamped to `size - 1`. Returns `None` for anything non-numeric,
/// inverted, or unsatisfiable — the caller treats that as "no range".
pub fn parse_range_header(size: u64, header: &str, window: u64) -> Option<(u64, u64)> {
    if size == 0 {
        return None;
    }
    let spec = header.split_once('=')?.1;
    // Multi-range requests: only the first range is honored.
    let spec = spec.split(',').next()?.trim();
    let (start_str, end_str) = spec.split_once('-')?;

    let start = start_str.parse::<u64>().ok();
    let end = end_str.parse::<u64>().ok();

    let (start, end) = match (start, end) {
        // bytes=a-b
        (Some(s), Some(e)) => (s, e),
        // bytes=a- : bounded by the read window
        (Some(s), None) if end_str.is_empty() => (s, s.saturating_add(window)),
        // bytes=-n : the final n bytes
        (None, Some(n)) if start_str.is_empty() => (size.checked_sub(n)?, size - 1),
        _ => return None,
    };

    let end = end.min(size - 1);
    if start > end {
        return None;
    }
    Some((start, end))
}
