//! Text table conversions (types 7 to 10).
//!
//! The `cc_ref` table arrives resolved in [`ConversionInfo::texts`]. An empty
//! reference decodes as an empty string.

use crate::info::ConversionInfo;

fn text_at(texts: &[Option<String>], index: usize) -> String {
    texts
        .get(index)
        .and_then(|t| t.clone())
        .unwrap_or_default()
}

/// Type 7: `cc_val` holds the keys, `texts[i]` the label of key `i` and
/// `texts[n]` the default.
pub fn value_to_text(conv: &ConversionInfo, raw: &[f64]) -> Vec<String> {
    let keys = &conv.values;
    raw.iter()
        .map(|&x| {
            let index = keys.iter().position(|&k| k == x).unwrap_or(keys.len());
            text_at(&conv.texts, index)
        })
        .collect()
}

/// Type 8: `cc_val = [min0, max0, min1, max1, …]`, `texts[n]` is the default.
pub fn range_to_text(conv: &ConversionInfo, raw: &[f64], inclusive_upper: bool) -> Vec<String> {
    let ranges: Vec<&[f64]> = conv.values.chunks_exact(2).collect();
    raw.iter()
        .map(|&x| {
            let index = ranges
                .iter()
                .position(|r| x >= r[0] && if inclusive_upper { x <= r[1] } else { x < r[1] })
                .unwrap_or(ranges.len());
            text_at(&conv.texts, index)
        })
        .collect()
}

/// Type 9: `texts` holds the keys, `cc_val[i]` the value of key `i` and
/// `cc_val[n]` the default. A missing default yields NaN.
pub fn text_to_value(conv: &ConversionInfo, input: &[String]) -> Vec<f64> {
    let n = conv.texts.len();
    input
        .iter()
        .map(|s| {
            let index = conv
                .texts
                .iter()
                .position(|k| k.as_deref() == Some(s.as_str()))
                .unwrap_or(n);
            conv.values.get(index).copied().unwrap_or(f64::NAN)
        })
        .collect()
}

/// Type 10: `texts = [key0, val0, key1, val1, …, default]`.
///
/// Unmatched input takes the default; with an empty default the input is
/// kept unchanged.
pub fn text_to_text(conv: &ConversionInfo, input: &[String]) -> Vec<String> {
    let pairs: Vec<&[Option<String>]> = conv.texts.chunks_exact(2).collect();
    let default = if conv.texts.len() % 2 == 1 {
        conv.texts.last().cloned().flatten()
    } else {
        None
    };
    input
        .iter()
        .map(|s| {
            match pairs
                .iter()
                .find(|p| p[0].as_deref() == Some(s.as_str()))
            {
                Some(pair) => pair[1].clone().unwrap_or_default(),
                None => default.clone().unwrap_or_else(|| s.clone()),
            }
        })
        .collect()
}
