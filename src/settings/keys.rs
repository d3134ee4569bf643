//! Settings keys and the per-apply change set

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Identifier of one device setting, named as on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SettingsKey {
    #[serde(rename = "centerFrequency")]
    CenterFrequency,
    #[serde(rename = "LOppmTenths")]
    LoPpmTenths,
    #[serde(rename = "lnaGainIndex")]
    LnaGainIndex,
    #[serde(rename = "rfFilterIndex")]
    RfFilterIndex,
    #[serde(rename = "lnaEnhanceIndex")]
    LnaEnhanceIndex,
    #[serde(rename = "bandIndex")]
    BandIndex,
    #[serde(rename = "mixerGainIndex")]
    MixerGainIndex,
    #[serde(rename = "mixerFilterIndex")]
    MixerFilterIndex,
    #[serde(rename = "biasCurrentIndex")]
    BiasCurrentIndex,
    #[serde(rename = "modeIndex")]
    ModeIndex,
    #[serde(rename = "gain1Index")]
    Gain1Index,
    #[serde(rename = "rcFilterIndex")]
    RcFilterIndex,
    #[serde(rename = "gain2Index")]
    Gain2Index,
    #[serde(rename = "gain3Index")]
    Gain3Index,
    #[serde(rename = "gain4Index")]
    Gain4Index,
    #[serde(rename = "ifFilterIndex")]
    IfFilterIndex,
    #[serde(rename = "gain5Index")]
    Gain5Index,
    #[serde(rename = "gain6Index")]
    Gain6Index,
    #[serde(rename = "dcBlock")]
    DcBlock,
    #[serde(rename = "iqCorrection")]
    IqCorrection,
    #[serde(rename = "transverterMode")]
    TransverterMode,
    #[serde(rename = "transverterDeltaFrequency")]
    TransverterDeltaFrequency,
    #[serde(rename = "fileRecordName")]
    FileRecordName,
}

impl SettingsKey {
    pub const ALL: [SettingsKey; 23] = [
        SettingsKey::CenterFrequency,
        SettingsKey::LoPpmTenths,
        SettingsKey::LnaGainIndex,
        SettingsKey::RfFilterIndex,
        SettingsKey::LnaEnhanceIndex,
        SettingsKey::BandIndex,
        SettingsKey::MixerGainIndex,
        SettingsKey::MixerFilterIndex,
        SettingsKey::BiasCurrentIndex,
        SettingsKey::ModeIndex,
        SettingsKey::Gain1Index,
        SettingsKey::RcFilterIndex,
        SettingsKey::Gain2Index,
        SettingsKey::Gain3Index,
        SettingsKey::Gain4Index,
        SettingsKey::IfFilterIndex,
        SettingsKey::Gain5Index,
        SettingsKey::Gain6Index,
        SettingsKey::DcBlock,
        SettingsKey::IqCorrection,
        SettingsKey::TransverterMode,
        SettingsKey::TransverterDeltaFrequency,
        SettingsKey::FileRecordName,
    ];

    /// Wire name
    pub fn as_str(&self) -> &'static str {
        match self {
            SettingsKey::CenterFrequency => "centerFrequency",
            SettingsKey::LoPpmTenths => "LOppmTenths",
            SettingsKey::LnaGainIndex => "lnaGainIndex",
            SettingsKey::RfFilterIndex => "rfFilterIndex",
            SettingsKey::LnaEnhanceIndex => "lnaEnhanceIndex",
            SettingsKey::BandIndex => "bandIndex",
            SettingsKey::MixerGainIndex => "mixerGainIndex",
            SettingsKey::MixerFilterIndex => "mixerFilterIndex",
            SettingsKey::BiasCurrentIndex => "biasCurrentIndex",
            SettingsKey::ModeIndex => "modeIndex",
            SettingsKey::Gain1Index => "gain1Index",
            SettingsKey::RcFilterIndex => "rcFilterIndex",
            SettingsKey::Gain2Index => "gain2Index",
            SettingsKey::Gain3Index => "gain3Index",
            SettingsKey::Gain4Index => "gain4Index",
            SettingsKey::IfFilterIndex => "ifFilterIndex",
            SettingsKey::Gain5Index => "gain5Index",
            SettingsKey::Gain6Index => "gain6Index",
            SettingsKey::DcBlock => "dcBlock",
            SettingsKey::IqCorrection => "iqCorrection",
            SettingsKey::TransverterMode => "transverterMode",
            SettingsKey::TransverterDeltaFrequency => "transverterDeltaFrequency",
            SettingsKey::FileRecordName => "fileRecordName",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|k| k.as_str() == name)
    }

    /// Keys whose change moves the tuned frequency
    pub fn affects_frequency(&self) -> bool {
        matches!(
            self,
            SettingsKey::CenterFrequency
                | SettingsKey::TransverterMode
                | SettingsKey::TransverterDeltaFrequency
                | SettingsKey::LoPpmTenths
        )
    }
}

impl fmt::Display for SettingsKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Keys whose value differed in one apply (or all keys, if forced)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    keys: BTreeSet<SettingsKey>,
}

impl ChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn all() -> Self {
        Self {
            keys: SettingsKey::ALL.iter().copied().collect(),
        }
    }

    pub fn insert(&mut self, key: SettingsKey) {
        self.keys.insert(key);
    }

    pub fn contains(&self, key: SettingsKey) -> bool {
        self.keys.contains(&key)
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_complete(&self) -> bool {
        self.keys.len() == SettingsKey::ALL.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = SettingsKey> + '_ {
        self.keys.iter().copied()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.iter().map(|k| k.as_str()).collect()
    }
}

impl FromIterator<SettingsKey> for ChangeSet {
    fn from_iter<I: IntoIterator<Item = SettingsKey>>(iter: I) -> Self {
        Self {
            keys: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_match_serde() {
        for key in SettingsKey::ALL {
            let json = serde_json::to_string(&key).unwrap();
            assert_eq!(json, format!("\"{}\"", key.as_str()));
            assert_eq!(SettingsKey::from_name(key.as_str()), Some(key));
        }
        assert_eq!(SettingsKey::from_name("bogus"), None);
    }

    #[test]
    fn test_changeset_all() {
        let all = ChangeSet::all();
        assert!(all.is_complete());
        assert_eq!(all.len(), SettingsKey::ALL.len());

        let mut partial = ChangeSet::new();
        partial.insert(SettingsKey::BandIndex);
        partial.insert(SettingsKey::BandIndex);
        assert_eq!(partial.names(), vec!["bandIndex"]);
        assert!(!partial.is_complete());
    }
}
