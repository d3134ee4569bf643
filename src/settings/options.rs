//! Enumerated option tables of the FCD Pro tuner and the static descriptor
//! table the reconciliation engine iterates over.
//!
//! Every indexed setting is an index into one of these tables; the entry's
//! `value` is the raw byte sent with the matching HID command.

use super::keys::SettingsKey;
use super::model::FcdProSettings;
use crate::hardware::hid;

/// One selectable value of a tuner option
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OptionEntry {
    /// Raw value sent to the tuner
    pub value: u8,
    /// Human readable label
    pub label: &'static str,
}

const fn opt(value: u8, label: &'static str) -> OptionEntry {
    OptionEntry { value, label }
}

pub const LNA_GAINS: &[OptionEntry] = &[
    opt(0, "-5.0dB"),
    opt(1, "-2.5dB"),
    opt(4, "+0.0dB"),
    opt(5, "+2.5dB"),
    opt(6, "+5.0dB"),
    opt(7, "+7.5dB"),
    opt(8, "+10.0dB"),
    opt(9, "+12.5dB"),
    opt(10, "+15.0dB"),
    opt(11, "+17.5dB"),
    opt(12, "+20.0dB"),
    opt(13, "+25.0dB"),
    opt(14, "+30.0dB"),
];

pub const RF_FILTERS: &[OptionEntry] = &[
    opt(0, "0-4M"),
    opt(1, "4-8M"),
    opt(2, "8-16M"),
    opt(3, "16-32M"),
    opt(4, "32-75M"),
    opt(5, "75-125M"),
    opt(6, "125-250M"),
    opt(7, "145M"),
    opt(8, "410-875M"),
    opt(9, "435M"),
    opt(10, "875M-2G"),
];

pub const LNA_ENHANCES: &[OptionEntry] = &[
    opt(0, "Off"),
    opt(1, "0"),
    opt(3, "1"),
    opt(5, "2"),
    opt(7, "3"),
];

pub const BANDS: &[OptionEntry] = &[
    opt(0, "VHF II"),
    opt(1, "VHF III"),
    opt(2, "UHF"),
    opt(3, "L"),
];

pub const MIXER_GAINS: &[OptionEntry] = &[opt(0, "4dB"), opt(1, "12dB")];

pub const MIXER_FILTERS: &[OptionEntry] = &[
    opt(0, "27.0M"),
    opt(8, "4.6M"),
    opt(9, "4.2M"),
    opt(10, "3.8M"),
    opt(11, "3.4M"),
    opt(12, "3.0M"),
    opt(13, "2.7M"),
    opt(14, "2.3M"),
    opt(15, "1.9M"),
];

pub const BIAS_CURRENTS: &[OptionEntry] = &[
    opt(0, "L band"),
    opt(1, "1"),
    opt(2, "2"),
    opt(3, "V band"),
];

pub const IF_GAIN_MODES: &[OptionEntry] = &[opt(0, "Linearity"), opt(1, "Sensitivity")];

pub const IF_GAINS1: &[OptionEntry] = &[opt(0, "-3dB"), opt(1, "+6dB")];

pub const IF_RC_FILTERS: &[OptionEntry] = &[
    opt(0, "21.4M"),
    opt(1, "21.0M"),
    opt(2, "17.6M"),
    opt(3, "14.7M"),
    opt(4, "12.4M"),
    opt(5, "10.6M"),
    opt(6, "9.0M"),
    opt(7, "7.7M"),
    opt(8, "6.4M"),
    opt(9, "5.3M"),
    opt(10, "4.4M"),
    opt(11, "3.4M"),
    opt(12, "2.6M"),
    opt(13, "1.8M"),
    opt(14, "1.2M"),
    opt(15, "1.0M"),
];

pub const IF_GAINS2: &[OptionEntry] = &[opt(0, "+0dB"), opt(1, "+3dB"), opt(2, "+6dB"), opt(3, "+9dB")];

pub const IF_GAINS3: &[OptionEntry] = &[opt(0, "+0dB"), opt(1, "+3dB"), opt(2, "+6dB"), opt(3, "+9dB")];

pub const IF_GAINS4: &[OptionEntry] = &[opt(0, "+0dB"), opt(1, "+1dB"), opt(2, "+2dB")];

pub const IF_FILTERS: &[OptionEntry] = &[
    opt(0, "5.50M"),
    opt(1, "5.30M"),
    opt(2, "5.00M"),
    opt(3, "4.80M"),
    opt(4, "4.60M"),
    opt(5, "4.40M"),
    opt(6, "4.30M"),
    opt(7, "4.10M"),
    opt(8, "3.90M"),
    opt(9, "3.80M"),
    opt(10, "3.70M"),
    opt(11, "3.60M"),
    opt(12, "3.40M"),
    opt(13, "3.00M"),
    opt(14, "2.70M"),
    opt(15, "2.30M"),
    opt(16, "2.20M"),
    opt(17, "2.10M"),
    opt(18, "1.90M"),
    opt(19, "1.80M"),
    opt(20, "1.70M"),
    opt(21, "1.60M"),
    opt(22, "1.55M"),
    opt(23, "1.50M"),
    opt(24, "1.45M"),
    opt(25, "1.40M"),
    opt(26, "1.30M"),
    opt(27, "1.20M"),
    opt(28, "1.10M"),
    opt(29, "1.00M"),
    opt(30, "0.95M"),
    opt(31, "0.90M"),
];

pub const IF_GAINS5: &[OptionEntry] = &[
    opt(0, "+3dB"),
    opt(1, "+6dB"),
    opt(2, "+9dB"),
    opt(3, "+12dB"),
    opt(4, "+15dB"),
];

pub const IF_GAINS6: &[OptionEntry] = &[
    opt(0, "+3dB"),
    opt(1, "+6dB"),
    opt(2, "+9dB"),
    opt(3, "+12dB"),
    opt(4, "+15dB"),
];

/// Static description of one indexed setting: where it lives in the model,
/// which table bounds it and which HID command pushes it.
pub struct OptionField {
    pub key: SettingsKey,
    pub table: &'static [OptionEntry],
    pub command: u8,
    pub get: fn(&FcdProSettings) -> i32,
    pub set: fn(&mut FcdProSettings, i32),
}

impl OptionField {
    /// Table entry for `index`, `None` when out of range
    pub fn entry(&self, index: i32) -> Option<&'static OptionEntry> {
        usize::try_from(index).ok().and_then(|i| self.table.get(i))
    }

    pub fn is_valid(&self, index: i32) -> bool {
        self.entry(index).is_some()
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }
}

macro_rules! option_field {
    ($key:ident, $field:ident, $table:expr, $command:expr) => {
        OptionField {
            key: SettingsKey::$key,
            table: $table,
            command: $command,
            get: |s| s.$field,
            set: |s, v| s.$field = v,
        }
    };
}

/// Indexed settings, in the order they are pushed to the tuner
pub static OPTION_FIELDS: [OptionField; 16] = [
    option_field!(LnaGainIndex, lna_gain_index, LNA_GAINS, hid::SET_LNA_GAIN),
    option_field!(RfFilterIndex, rf_filter_index, RF_FILTERS, hid::SET_RF_FILTER),
    option_field!(LnaEnhanceIndex, lna_enhance_index, LNA_ENHANCES, hid::SET_LNA_ENHANCE),
    option_field!(BandIndex, band_index, BANDS, hid::SET_BAND),
    option_field!(MixerGainIndex, mixer_gain_index, MIXER_GAINS, hid::SET_MIXER_GAIN),
    option_field!(MixerFilterIndex, mixer_filter_index, MIXER_FILTERS, hid::SET_MIXER_FILTER),
    option_field!(BiasCurrentIndex, bias_current_index, BIAS_CURRENTS, hid::SET_BIAS_CURRENT),
    option_field!(ModeIndex, mode_index, IF_GAIN_MODES, hid::SET_IF_GAIN_MODE),
    option_field!(Gain1Index, gain1_index, IF_GAINS1, hid::SET_IF_GAIN1),
    option_field!(RcFilterIndex, rc_filter_index, IF_RC_FILTERS, hid::SET_IF_RC_FILTER),
    option_field!(Gain2Index, gain2_index, IF_GAINS2, hid::SET_IF_GAIN2),
    option_field!(Gain3Index, gain3_index, IF_GAINS3, hid::SET_IF_GAIN3),
    option_field!(Gain4Index, gain4_index, IF_GAINS4, hid::SET_IF_GAIN4),
    option_field!(IfFilterIndex, if_filter_index, IF_FILTERS, hid::SET_IF_FILTER),
    option_field!(Gain5Index, gain5_index, IF_GAINS5, hid::SET_IF_GAIN5),
    option_field!(Gain6Index, gain6_index, IF_GAINS6, hid::SET_IF_GAIN6),
];

/// Descriptor for an indexed key, `None` for the other keys
pub fn option_field(key: SettingsKey) -> Option<&'static OptionField> {
    OPTION_FIELDS.iter().find(|f| f.key == key)
}
