//! Linear (type 1) and rational (type 2) conversions.

/// `y = x * P2 + P1`. With fewer than two parameters the input is returned.
pub fn linear(params: &[f64], raw: &[f64]) -> Vec<f64> {
    match params {
        [p1, p2, ..] => raw.iter().map(|&x| x * p2 + p1).collect(),
        _ => raw.to_vec(),
    }
}

/// `y = (P1*x² + P2*x + P3) / (P4*x² + P5*x + P6)`.
///
/// A zero denominator follows IEEE 754 and yields an infinity or NaN.
pub fn rational(params: &[f64], raw: &[f64]) -> Vec<f64> {
    match params {
        [p1, p2, p3, p4, p5, p6, ..] => raw
            .iter()
            .map(|&x| {
                let num = p1 * x * x + p2 * x + p3;
                let den = p4 * x * x + p5 * x + p6;
                num / den
            })
            .collect(),
        _ => raw.to_vec(),
    }
}
