//! Helpers shared by the JCMT calculators.
//!
//! - [`weather`]: the weather band table, opacity matching and the per-band
//!   comparison sweep
//! - [`position`]: source position types, validation and conversion to
//!   zenith angle and airmass
//! - display condensing of stored calculations, below

pub mod position;
pub mod weather;

use propcalc_core::errors::CalcResult;
use propcalc_core::result::Calculation;
use propcalc_core::sectioned_list::SectionSelector;
use propcalc_core::value::{FieldFormat, Value};

use crate::jcmt::position::PositionType;
use crate::jcmt::weather::band_for_tau;

/// Merge value fields with their companion fields for display.
///
/// For each `(value_code, companion_code)` pair present in both the input and
/// the schema of the calculation, the value field becomes the text
/// `"{value} {label}"` where `label` is produced from the companion's value.
/// The companion field and its schema entry are removed.
pub fn condense_merge_values<F>(
    calculation: &mut Calculation,
    pairs: &[(&str, &str)],
    labeler: F,
) -> CalcResult<()>
where
    F: Fn(&str, &Value) -> String,
{
    for &(value_code, companion_code) in pairs {
        let (Some(value), Some(companion)) = (
            calculation.input.get(value_code).cloned(),
            calculation.input.get(companion_code).cloned(),
        ) else {
            continue;
        };
        let Some(field) = calculation.inputs.find_item(|f| f.code == value_code).copied() else {
            continue;
        };
        if calculation
            .inputs
            .find_item(|f| f.code == companion_code)
            .is_none()
        {
            continue;
        }

        let merged = format!(
            "{} {}",
            field.format.render(&value),
            labeler(companion_code, &companion)
        );
        calculation.input.insert(value_code, merged.trim().to_string());
        calculation.input.remove(companion_code);

        calculation.inputs.replace_item_where(
            |f| f.code == value_code,
            |f| Some(f.with_format(FieldFormat::Text).with_unit(None)),
            SectionSelector::All,
            Some(1),
        );
        calculation
            .inputs
            .delete_item_where(|f| f.code == companion_code, SectionSelector::All, Some(1));
    }

    Ok(())
}

/// Remove null input fields, which do not apply to the calculation, from display.
pub fn condense_drop_null(calculation: &mut Calculation) -> CalcResult<()> {
    let null_codes: Vec<String> = calculation
        .input
        .iter()
        .filter(|(_, value)| value.is_null())
        .map(|(code, _)| code.to_string())
        .collect();

    for code in null_codes {
        calculation.input.remove(&code);
        calculation
            .inputs
            .delete_item_where(|f| f.code == code, SectionSelector::All, None);
    }
    Ok(())
}

/// Label for a source position type code.
pub fn position_type_label(_code: &str, value: &Value) -> String {
    match value.as_str().map(PositionType::from_code) {
        Some(Ok(position_type)) => position_type.name().to_lowercase(),
        _ => value.to_string(),
    }
}

/// Replace an opacity which matches a weather band by the band's name.
pub fn condense_tau_band(calculation: &mut Calculation, code: &str) -> CalcResult<()> {
    let Some(tau) = calculation.input.get(code).and_then(Value::as_float) else {
        return Ok(());
    };
    let Some(band) = band_for_tau(tau) else {
        return Ok(());
    };

    calculation.input.insert(code, band.name);
    calculation.inputs.replace_item_where(
        |f| f.code == code,
        |f| Some(f.with_format(FieldFormat::Text).with_unit(None)),
        SectionSelector::All,
        Some(1),
    );
    Ok(())
}
