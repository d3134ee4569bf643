//! JSON form of the settings, as exchanged with peer instances
//!
//! ```text
//! {"deviceHwType": "FCDPro", "tx": 0, "fcdProSettings": {"centerFrequency": 435000000, ...}}
//! ```
//!
//! Booleans travel as `0`/`1`. The remote mirror target itself is never part
//! of the document.

use serde_json::{json, Map, Value};

use super::keys::SettingsKey;
use super::model::FcdProSettings;
use super::options::option_field;
use crate::error::SettingsError;

pub const DEVICE_HW_TYPE: &str = "FCDPro";

/// Field value as a JSON value
pub fn field_value(settings: &FcdProSettings, key: SettingsKey) -> Value {
    if let Some(field) = option_field(key) {
        return json!((field.get)(settings));
    }

    match key {
        SettingsKey::CenterFrequency => json!(settings.center_frequency),
        SettingsKey::LoPpmTenths => json!(settings.lo_ppm_tenths),
        SettingsKey::DcBlock => json!(settings.dc_block as i32),
        SettingsKey::IqCorrection => json!(settings.iq_correction as i32),
        SettingsKey::TransverterMode => json!(settings.transverter_mode as i32),
        SettingsKey::TransverterDeltaFrequency => json!(settings.transverter_delta_frequency),
        SettingsKey::FileRecordName => json!(settings.file_record_name),
        // Indexed keys are handled above
        _ => Value::Null,
    }
}

/// Object holding only `keys`
pub fn fields_to_json<I>(settings: &FcdProSettings, keys: I) -> Map<String, Value>
where
    I: IntoIterator<Item = SettingsKey>,
{
    keys.into_iter()
        .map(|key| (key.as_str().to_string(), field_value(settings, key)))
        .collect()
}

/// Full document around a field object
pub fn device_settings_document(fields: Map<String, Value>) -> Value {
    json!({
        "deviceHwType": DEVICE_HW_TYPE,
        "tx": 0,
        "fcdProSettings": Value::Object(fields),
    })
}

fn as_i64(key: SettingsKey, value: &Value) -> Result<i64, SettingsError> {
    value.as_i64().ok_or_else(|| SettingsError::InvalidValue {
        key: key.as_str().to_string(),
        reason: format!("expected integer, got {}", value),
    })
}

fn as_i32(key: SettingsKey, value: &Value) -> Result<i32, SettingsError> {
    let wide = as_i64(key, value)?;
    i32::try_from(wide).map_err(|_| SettingsError::InvalidValue {
        key: key.as_str().to_string(),
        reason: format!("{} does not fit in 32 bits", wide),
    })
}

fn as_flag(key: SettingsKey, value: &Value) -> Result<bool, SettingsError> {
    match value {
        Value::Bool(b) => Ok(*b),
        other => Ok(as_i64(key, other)? != 0),
    }
}

/// Overwrite the fields named in `fields` onto `settings`
///
/// Returns the keys that were present. Fields are validated before any of
/// them is written, so a bad document leaves `settings` untouched. Option
/// indices must fall inside their table.
pub fn apply_json_fields(
    settings: &mut FcdProSettings,
    fields: &Map<String, Value>,
) -> Result<Vec<SettingsKey>, SettingsError> {
    let mut updated = settings.clone();
    let mut keys = Vec::with_capacity(fields.len());

    for (name, value) in fields {
        let key = SettingsKey::from_name(name)
            .ok_or_else(|| SettingsError::UnknownKey(name.clone()))?;

        if let Some(field) = option_field(key) {
            let index = as_i32(key, value)?;
            if !field.is_valid(index) {
                return Err(SettingsError::InvalidValue {
                    key: key.as_str().to_string(),
                    reason: format!("index {} out of range [0, {})", index, field.len()),
                });
            }
            (field.set)(&mut updated, index);
        } else {
            match key {
                SettingsKey::CenterFrequency => updated.center_frequency = as_i64(key, value)?,
                SettingsKey::LoPpmTenths => updated.lo_ppm_tenths = as_i32(key, value)?,
                SettingsKey::DcBlock => updated.dc_block = as_flag(key, value)?,
                SettingsKey::IqCorrection => updated.iq_correction = as_flag(key, value)?,
                SettingsKey::TransverterMode => updated.transverter_mode = as_flag(key, value)?,
                SettingsKey::TransverterDeltaFrequency => {
                    updated.transverter_delta_frequency = as_i64(key, value)?
                }
                SettingsKey::FileRecordName => {
                    updated.file_record_name = value
                        .as_str()
                        .ok_or_else(|| SettingsError::InvalidValue {
                            key: key.as_str().to_string(),
                            reason: "expected string".to_string(),
                        })?
                        .to_string()
                }
                _ => {}
            }
        }
        keys.push(key);
    }

    *settings = updated;
    Ok(keys)
}
