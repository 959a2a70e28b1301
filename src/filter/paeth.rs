/// The Paeth predictor: whichever of `a` (left), `b` (above) or `c` (above-left) is closest to
/// `a + b - c`.
///
/// Ties prefer `a`, then `b`, then `c`.
pub fn paeth_predictor(a: u8, b: u8, c: u8) -> u8 {
    let pa = (i16::from(b) - i16::from(c)).abs();
    let pb = (i16::from(a) - i16::from(c)).abs();
    let pc = ((i16::from(a) - i16::from(c)) + (i16::from(b) - i16::from(c))).abs();

    let mut out = a;
    let mut min = pa;

    if pb < min {
        min = pb;
        out = b;
    }
    if pc < min {
        out = c;
    }

    out
}
