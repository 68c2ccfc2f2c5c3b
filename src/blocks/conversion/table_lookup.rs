//! Value-to-value tables (types 4 and 5) and value-range-to-value (type 6).

use super::ConversionType;
use crate::{Error, Result};

/// Split `cc_val = [key0, val0, key1, val1, …]` into keys and values,
/// checking that keys strictly increase.
fn key_value_table(kind: ConversionType, cc_val: &[f64]) -> Result<(Vec<f64>, Vec<f64>)> {
    let (keys, values): (Vec<f64>, Vec<f64>) =
        cc_val.chunks_exact(2).map(|pair| (pair[0], pair[1])).unzip();
    if keys.windows(2).any(|w| !(w[1] > w[0])) {
        return Err(Error::NonMonotonicTable { conversion: kind });
    }
    Ok((keys, values))
}

/// Piecewise-linear interpolation, clamped to the first and last value.
pub fn interpolate(kind: ConversionType, cc_val: &[f64], raw: &[f64]) -> Result<Vec<f64>> {
    let (keys, values) = key_value_table(kind, cc_val)?;
    let (Some(&first), Some(&last)) = (keys.first(), keys.last()) else {
        return Ok(raw.to_vec());
    };
    let n = keys.len();
    Ok(raw
        .iter()
        .map(|&x| {
            if x.is_nan() {
                x
            } else if x <= first {
                values[0]
            } else if x >= last {
                values[n - 1]
            } else {
                // keys[i - 1] < x <= keys[i]
                let i = keys.partition_point(|&k| k < x);
                let (k0, k1) = (keys[i - 1], keys[i]);
                let (v0, v1) = (values[i - 1], values[i]);
                v0 + (x - k0) * (v1 - v0) / (k1 - k0)
            }
        })
        .collect())
}

/// Nearest-key lookup. Samples outside the key range become NaN; a sample
/// exactly between two keys takes the lower key's value.
pub fn nearest(kind: ConversionType, cc_val: &[f64], raw: &[f64]) -> Result<Vec<f64>> {
    let (keys, values) = key_value_table(kind, cc_val)?;
    let (Some(&first), Some(&last)) = (keys.first(), keys.last()) else {
        return Ok(raw.to_vec());
    };
    Ok(raw
        .iter()
        .map(|&x| {
            if !(first..=last).contains(&x) {
                return f64::NAN;
            }
            let i = keys.partition_point(|&k| k < x);
            if keys[i] == x || i == 0 {
                return values[i];
            }
            if x - keys[i - 1] <= keys[i] - x {
                values[i - 1]
            } else {
                values[i]
            }
        })
        .collect())
}

/// `cc_val = [min0, max0, val0, …, default]`; the first matching range wins.
///
/// Integer samples match `min <= x <= max`, floating point samples
/// `min <= x < max`. Unmatched samples get 0, unless the table carries a
/// trailing default value after its triples (a `3n + 1` long `cc_val`).
pub fn range_to_value(cc_val: &[f64], raw: &[f64], inclusive_upper: bool) -> Vec<f64> {
    let triples: Vec<&[f64]> = cc_val.chunks_exact(3).collect();
    let default = if cc_val.len() % 3 == 1 {
        cc_val[cc_val.len() - 1]
    } else {
        0.0
    };
    raw.iter()
        .map(|&x| {
            triples
                .iter()
                .find(|t| {
                    let (min, max) = (t[0], t[1]);
                    x >= min && if inclusive_upper { x <= max } else { x < max }
                })
                .map_or(default, |t| t[2])
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const INTERP: ConversionType = ConversionType::TableLookupInterp;
    const NEAREST: ConversionType = ConversionType::TableLookupNoInterp;

    #[test]
    fn interpolates_between_keys() {
        let table = [0.0, 0.0, 10.0, 100.0, 20.0, 150.0];
        let out = interpolate(INTERP, &table, &[-5.0, 0.0, 5.0, 15.0, 25.0]).unwrap();
        assert_eq!(out, vec![0.0, 0.0, 50.0, 125.0, 150.0]);
    }

    #[test]
    fn equal_keys_are_not_strictly_increasing() {
        let table = [0.0, 0.0, 0.0, 1.0];
        assert!(matches!(
            interpolate(INTERP, &table, &[0.0]),
            Err(Error::NonMonotonicTable {
                conversion: ConversionType::TableLookupInterp
            })
        ));
    }

    #[test]
    fn nearest_prefers_lower_on_ties() {
        let table = [0.0, 1.0, 10.0, 2.0];
        let out = nearest(NEAREST, &table, &[0.0, 4.0, 5.0, 6.0, 10.0]).unwrap();
        assert_eq!(out, vec![1.0, 1.0, 1.0, 2.0, 2.0]);
    }

    #[test]
    fn nearest_out_of_range_is_nan() {
        let table = [0.0, 1.0, 10.0, 2.0];
        let out = nearest(NEAREST, &table, &[-1.0, 11.0]).unwrap();
        assert!(out.iter().all(|v| v.is_nan()));
    }

    #[test]
    fn range_default_missing_is_zero() {
        let out = range_to_value(&[0.0, 1.0, 7.0], &[0.5, 3.0], false);
        assert_eq!(out, vec![7.0, 0.0]);
    }

    #[test]
    fn range_default_is_zero_for_3n_table_and_trailing_value_for_3n_plus_1() {
        let triples = [0.0, 1.0, 7.0, 2.0, 3.0, 8.0];
        assert_eq!(range_to_value(&triples, &[5.0], true), vec![0.0]);

        let with_default = [0.0, 1.0, 7.0, 2.0, 3.0, 8.0, -1.0];
        assert_eq!(range_to_value(&with_default, &[5.0, 2.5], true), vec![-1.0, 8.0]);
    }

    #[test]
    fn range_first_match_wins() {
        let table = [0.0, 10.0, 1.0, 5.0, 15.0, 2.0, 99.0];
        assert_eq!(range_to_value(&table, &[7.0], true), vec![1.0]);
    }
}
