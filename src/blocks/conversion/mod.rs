//! Physical value conversions.
//!
//! Each conversion is a pure function from a raw channel array and the
//! parameter tables of its [`ConversionInfo`] to a new array. Numeric
//! conversions produce `f64`; text tables produce strings.

mod formula;
mod linear;
mod table_lookup;
mod text;
mod types;

pub use formula::{ExpressionEvaluator, FormulaEvaluator};
pub use types::ConversionType;

use crate::{Result, info::ConversionInfo, types::ChannelData};

/// Apply `conversion` to `data`.
///
/// Returns `Ok(None)` when the conversion leaves the data as it is: identity
/// and unknown conversion types, or a table expecting text applied to numbers
/// (and the other way around).
pub fn apply(
    conversion: &ConversionInfo,
    data: &ChannelData,
    evaluator: &dyn FormulaEvaluator,
) -> Result<Option<ChannelData>> {
    let kind = conversion.conversion_type;
    if kind.takes_text() {
        let Some(input) = data.as_strings() else {
            return Ok(None);
        };
        return Ok(Some(match kind {
            ConversionType::TextToValue => {
                ChannelData::Float64(text::text_to_value(conversion, input))
            }
            _ => ChannelData::Strings(text::text_to_text(conversion, input)),
        }));
    }

    let Some(raw) = data.as_f64() else {
        return Ok(None);
    };
    let inclusive_upper = data.is_integer();
    let p = &conversion.values;

    let converted = match kind {
        ConversionType::Linear => ChannelData::Float64(linear::linear(p, &raw)),
        ConversionType::Rational => ChannelData::Float64(linear::rational(p, &raw)),
        ConversionType::Algebraic => match conversion.formula.as_deref() {
            Some(formula) => ChannelData::Float64(evaluator.evaluate(formula, &raw)?),
            None => return Ok(None),
        },
        ConversionType::TableLookupInterp => {
            ChannelData::Float64(table_lookup::interpolate(kind, p, &raw)?)
        }
        ConversionType::TableLookupNoInterp => {
            ChannelData::Float64(table_lookup::nearest(kind, p, &raw)?)
        }
        ConversionType::RangeLookup => {
            ChannelData::Float64(table_lookup::range_to_value(p, &raw, inclusive_upper))
        }
        ConversionType::ValueToText => {
            ChannelData::Strings(text::value_to_text(conversion, &raw))
        }
        ConversionType::RangeToText => {
            ChannelData::Strings(text::range_to_text(conversion, &raw, inclusive_upper))
        }
        _ => return Ok(None),
    };
    Ok(Some(converted))
}
