mod paeth;

pub use self::paeth::paeth_predictor;

/// The byte level filter applied to scanlines to prepare them for compression.
///
/// Compression in general benefits from repetitive data. The filter is a content-aware method of
/// compressing the range of occurring byte values to help the compression algorithm. Note that
/// this does not operate on pixels but on raw bytes of a scanline.
///
/// Details on how each filter works can be found in the [PNG Book](http://www.libpng.org/pub/png/book/chapter09.html).
///
/// The default filter is `Adaptive`, which uses heuristics to select the best filter for every row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[non_exhaustive]
pub enum Filter {
    NoFilter,
    Sub,
    Up,
    Avg,
    Paeth,
    #[default]
    Adaptive,
}

impl From<RowFilter> for Filter {
    fn from(value: RowFilter) -> Self {
        match value {
            RowFilter::NoFilter => Filter::NoFilter,
            RowFilter::Sub => Filter::Sub,
            RowFilter::Up => Filter::Up,
            RowFilter::Avg => Filter::Avg,
            RowFilter::Paeth => Filter::Paeth,
        }
    }
}

/// The filter tag stored in front of every scanline.
///
/// Unlike [`Filter`], does not include the "Adaptive" option.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum RowFilter {
    NoFilter = 0,
    Sub = 1,
    Up = 2,
    Avg = 3,
    Paeth = 4,
}

impl RowFilter {
    pub const ALL: [RowFilter; 5] = [
        RowFilter::NoFilter,
        RowFilter::Sub,
        RowFilter::Up,
        RowFilter::Avg,
        RowFilter::Paeth,
    ];

    pub fn from_u8(n: u8) -> Option<Self> {
        match n {
            0 => Some(Self::NoFilter),
            1 => Some(Self::Sub),
            2 => Some(Self::Up),
            3 => Some(Self::Avg),
            4 => Some(Self::Paeth),
            _ => None,
        }
    }

    pub fn from_method(strat: Filter) -> Option<Self> {
        match strat {
            Filter::NoFilter => Some(Self::NoFilter),
            Filter::Sub => Some(Self::Sub),
            Filter::Up => Some(Self::Up),
            Filter::Avg => Some(Self::Avg),
            Filter::Paeth => Some(Self::Paeth),
            Filter::Adaptive => None,
        }
    }
}

/// Filters one byte given its raw neighbours at the same offset of the pixel to the left, above
/// and above-left. Missing neighbours are passed as 0.
pub fn filter_byte(filter: RowFilter, raw: u8, left: u8, top: u8, top_left: u8) -> u8 {
    match filter {
        RowFilter::NoFilter => raw,
        RowFilter::Sub => raw.wrapping_sub(left),
        RowFilter::Up => raw.wrapping_sub(top),
        RowFilter::Avg => raw.wrapping_sub(average(left, top)),
        RowFilter::Paeth => raw.wrapping_sub(paeth_predictor(left, top, top_left)),
    }
}

/// Inverse of [`filter_byte`].
pub fn unfilter_byte(filter: RowFilter, filtered: u8, left: u8, top: u8, top_left: u8) -> u8 {
    match filter {
        RowFilter::NoFilter => filtered,
        RowFilter::Sub => filtered.wrapping_add(left),
        RowFilter::Up => filtered.wrapping_add(top),
        RowFilter::Avg => filtered.wrapping_add(average(left, top)),
        RowFilter::Paeth => filtered.wrapping_add(paeth_predictor(left, top, top_left)),
    }
}

fn average(left: u8, top: u8) -> u8 {
    ((u16::from(left) + u16::from(top)) / 2) as u8
}

/// Filters a whole row with one filter. `previous` is the raw row above, all zeros for the first
/// row.
fn filter_internal(
    filter: RowFilter,
    bpp: usize,
    previous: &[u8],
    current: &[u8],
    output: &mut [u8],
) -> RowFilter {
    for (i, (out, &raw)) in output.iter_mut().zip(current).enumerate() {
        let (left, top_left) = if i >= bpp {
            (current[i - bpp], previous[i - bpp])
        } else {
            (0, 0)
        };
        *out = filter_byte(filter, raw, left, previous[i], top_left);
    }
    filter
}

fn adaptive_filter(bpp: usize, previous: &[u8], current: &[u8], output: &mut [u8]) -> RowFilter {
    let mut min_cost: u64 = u64::MAX;
    let mut filter_choice = RowFilter::NoFilter;
    for filter in RowFilter::ALL {
        filter_internal(filter, bpp, previous, current, output);
        let cost = sum_buffer(output);
        // Strictly smaller, so ties keep the lower tag.
        if cost < min_cost {
            min_cost = cost;
            filter_choice = filter;
        }
    }
    if filter_choice != RowFilter::Paeth {
        filter_internal(filter_choice, bpp, previous, current, output);
    }
    filter_choice
}

/// Filters `current` into `output` and returns the filter used.
///
/// `bpp` is the pixel size in bytes, `previous` the raw row above (zeros for the first row). All
/// three slices have the same length.
pub(crate) fn filter_row(
    method: Filter,
    bpp: usize,
    previous: &[u8],
    current: &[u8],
    output: &mut [u8],
) -> RowFilter {
    match RowFilter::from_method(method) {
        Some(filter) => filter_internal(filter, bpp, previous, current, output),
        None => adaptive_filter(bpp, previous, current, output),
    }
}

// Helper function for Adaptive filter buffer summation
fn sum_buffer(buf: &[u8]) -> u64 {
    const CHUNK_SIZE: usize = 32;

    let mut buf_chunks = buf.chunks_exact(CHUNK_SIZE);
    let mut sum = 0_u64;

    for chunk in &mut buf_chunks {
        // At most, `acc` can be `32 * (i8::MIN as u8) = 32 * 128 = 4096`.
        let mut acc = 0;
        for &b in chunk {
            acc += u64::from((b as i8).unsigned_abs());
        }
        sum = sum.saturating_add(acc);
    }

    let mut acc = 0;
    for &b in buf_chunks.remainder() {
        acc += u64::from((b as i8).unsigned_abs());
    }

    sum.saturating_add(acc)
}
