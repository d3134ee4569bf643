//! Settings reconciliation
//!
//! Diffs a requested settings record against the stored one and pushes only
//! what changed to the tuner. Indexed options go through the static
//! descriptor table; the frequency group and the DC/IQ correction pair are
//! handled as coupled groups.

use crate::constants::FCDPRO_SAMPLE_RATE;
use crate::settings::{ChangeSet, FcdProSettings, SettingsKey, OPTION_FIELDS};

use super::engine::SignalNotification;
use super::lifecycle::OpenTuner;

/// Outcome of one apply
#[derive(Debug, Clone, PartialEq)]
pub struct Applied {
    pub changes: ChangeSet,
    /// `(dc_block, iq_correction)` to hand to the DSP engine
    pub corrections: Option<(bool, bool)>,
    /// Rate / frequency update for the DSP engine and the recorder
    pub notification: Option<SignalNotification>,
    /// Mirror target moved: the peer needs every key
    pub mirror_target_changed: bool,
}

impl Applied {
    /// Whether a mirror update should carry every key
    pub fn full_update(&self, force: bool) -> bool {
        force || self.mirror_target_changed
    }
}

/// Owner of the authoritative settings record
#[derive(Debug, Clone, Default)]
pub struct Reconciler {
    settings: FcdProSettings,
}

impl Reconciler {
    pub fn new(settings: FcdProSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &FcdProSettings {
        &self.settings
    }

    /// Replace out-of-range indices of `new` with the stored value
    fn sanitize(&self, new: &mut FcdProSettings) {
        for field in OPTION_FIELDS.iter() {
            let requested = (field.get)(new);
            if !field.is_valid(requested) {
                let current = (field.get)(&self.settings);
                tracing::warn!(
                    "{} index {} out of range [0, {}), keeping {}",
                    field.key,
                    requested,
                    field.len(),
                    current
                );
                (field.set)(new, current);
            }
        }
    }

    fn diff(&self, new: &FcdProSettings) -> ChangeSet {
        let old = &self.settings;
        let mut changes: ChangeSet = OPTION_FIELDS
            .iter()
            .filter(|f| (f.get)(old) != (f.get)(new))
            .map(|f| f.key)
            .collect();

        let scalar = [
            (SettingsKey::CenterFrequency, old.center_frequency != new.center_frequency),
            (SettingsKey::LoPpmTenths, old.lo_ppm_tenths != new.lo_ppm_tenths),
            (SettingsKey::DcBlock, old.dc_block != new.dc_block),
            (SettingsKey::IqCorrection, old.iq_correction != new.iq_correction),
            (SettingsKey::TransverterMode, old.transverter_mode != new.transverter_mode),
            (
                SettingsKey::TransverterDeltaFrequency,
                old.transverter_delta_frequency != new.transverter_delta_frequency,
            ),
            (SettingsKey::FileRecordName, old.file_record_name != new.file_record_name),
        ];
        for (key, changed) in scalar {
            if changed {
                changes.insert(key);
            }
        }

        changes
    }

    /// Reconcile `new` against the stored record
    ///
    /// `tuner` is `None` while the device is closed: changes are then only
    /// recorded and reach the hardware on the next forced apply.
    pub fn apply(
        &mut self,
        mut new: FcdProSettings,
        force: bool,
        mut tuner: Option<OpenTuner<'_>>,
    ) -> Applied {
        self.sanitize(&mut new);

        let changes = if force {
            ChangeSet::all()
        } else {
            self.diff(&new)
        };

        if let Some(tuner) = tuner.as_mut() {
            if changes.iter().any(|k| k.affects_frequency()) {
                let freq = new.corrected_device_frequency().round() as u64;
                match tuner.set_frequency(freq) {
                    Ok(()) => tracing::debug!("Tuned to {} Hz", freq),
                    Err(e) => tracing::warn!("Could not tune to {} Hz: {}", freq, e),
                }
            }

            for field in OPTION_FIELDS.iter().filter(|f| changes.contains(f.key)) {
                // Sanitized above
                let Some(entry) = field.entry((field.get)(&new)) else {
                    continue;
                };
                if let Err(e) = tuner.set_param(field.command, entry.value) {
                    tracing::warn!("{} -> {} not applied: {}", field.key, entry.label, e);
                }
            }
        } else if !changes.is_empty() {
            tracing::debug!("Device closed, deferring {} change(s)", changes.len());
        }

        let corrections = (changes.contains(SettingsKey::DcBlock)
            || changes.contains(SettingsKey::IqCorrection))
        .then_some((new.dc_block, new.iq_correction));

        let notification = (force
            || changes.contains(SettingsKey::CenterFrequency)
            || changes.contains(SettingsKey::TransverterMode)
            || changes.contains(SettingsKey::TransverterDeltaFrequency))
        .then_some(SignalNotification {
            sample_rate: FCDPRO_SAMPLE_RATE,
            center_frequency: new.center_frequency,
        });

        let mirror_target_changed = new.remote_mirror != self.settings.remote_mirror;

        self.settings = new;

        Applied {
            changes,
            corrections,
            notification,
            mirror_target_changed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::lifecycle::{Acquisition, CaptureParams};
    use crate::hardware::hid;
    use crate::hardware::sim::{SimulatedTuner, ToneSource, TunerProbe};
    use crate::settings::options::RF_FILTERS;
    use proptest::prelude::*;

    fn open_acquisition() -> (Acquisition, TunerProbe) {
        let tuner = SimulatedTuner::new();
        let probe = tuner.probe();
        let mut acq = Acquisition::new(
            Box::new(tuner),
            Box::new(ToneSource::new(1_000.0, 64)),
            0,
            CaptureParams {
                endpoint_name: "FUNcube".into(),
                chunk_size: 64,
                fifo_chunks: 2,
            },
        );
        acq.open_device().unwrap();
        probe.clear();
        (acq, probe)
    }

    #[test]
    fn test_only_changed_fields_are_pushed() {
        let (mut acq, probe) = open_acquisition();
        let mut reconciler = Reconciler::default();

        let mut new = reconciler.settings().clone();
        new.lna_gain_index = 3;
        new.if_filter_index = 12;
        let applied = reconciler.apply(new, false, acq.open_tuner());

        assert_eq!(applied.changes.names(), vec!["lnaGainIndex", "ifFilterIndex"]);
        assert_eq!(probe.param_writes(hid::SET_LNA_GAIN), vec![5]);
        assert_eq!(probe.param_writes(hid::SET_IF_FILTER), vec![12]);
        assert!(probe.frequency_writes().is_empty());
        assert_eq!(probe.write_count(), 2);
        assert!(applied.notification.is_none());
        assert!(applied.corrections.is_none());
    }

    #[test]
    fn test_frequency_group_single_push() {
        let (mut acq, probe) = open_acquisition();
        let mut reconciler = Reconciler::default();

        let mut new = reconciler.settings().clone();
        new.center_frequency = 10_368_100_000;
        new.transverter_mode = true;
        new.transverter_delta_frequency = 10_224_000_000;
        new.lo_ppm_tenths = 10;
        let applied = reconciler.apply(new, false, acq.open_tuner());

        // 144.1 MHz plus 1 ppm
        assert_eq!(probe.frequency_writes(), vec![144_100_144]);
        assert_eq!(
            applied.notification,
            Some(SignalNotification {
                sample_rate: 96_000,
                center_frequency: 10_368_100_000
            })
        );
    }

    #[test]
    fn test_ppm_change_retunes_without_notification() {
        let (mut acq, probe) = open_acquisition();
        let mut reconciler = Reconciler::default();

        let mut new = reconciler.settings().clone();
        new.lo_ppm_tenths = -5;
        let applied = reconciler.apply(new, false, acq.open_tuner());

        assert_eq!(probe.frequency_writes().len(), 1);
        assert!(applied.notification.is_none());
    }

    #[test]
    fn test_corrections_combined() {
        let mut reconciler = Reconciler::default();

        let mut new = reconciler.settings().clone();
        new.iq_correction = true;
        let applied = reconciler.apply(new, false, None);

        assert_eq!(applied.corrections, Some((false, true)));
    }

    #[test]
    fn test_deferred_apply_while_closed() {
        let (mut acq, probe) = open_acquisition();
        acq.close_device();
        probe.clear();

        let mut reconciler = Reconciler::default();
        let mut new = reconciler.settings().clone();
        new.lna_gain_index = 4;
        let applied = reconciler.apply(new, false, acq.open_tuner());

        assert!(applied.changes.contains(SettingsKey::LnaGainIndex));
        assert_eq!(reconciler.settings().lna_gain_index, 4);
        assert_eq!(probe.write_count(), 0);

        // Forced re-apply after opening pushes it exactly once
        acq.open_device().unwrap();
        let snapshot = reconciler.settings().clone();
        reconciler.apply(snapshot, true, acq.open_tuner());
        assert_eq!(probe.param_writes(hid::SET_LNA_GAIN), vec![6]);
    }

    #[test]
    fn test_out_of_range_index_keeps_current() {
        let (mut acq, probe) = open_acquisition();
        let mut reconciler = Reconciler::default();

        let mut new = reconciler.settings().clone();
        new.rf_filter_index = RF_FILTERS.len() as i32;
        let applied = reconciler.apply(new, false, acq.open_tuner());

        assert!(applied.changes.is_empty());
        assert_eq!(reconciler.settings().rf_filter_index, 0);
        assert_eq!(probe.write_count(), 0);
    }

    #[test]
    fn test_rejected_field_does_not_abort() {
        let (mut acq, probe) = open_acquisition();
        probe.reject(hid::SET_BAND);
        let mut reconciler = Reconciler::default();

        let mut new = reconciler.settings().clone();
        new.band_index = 2;
        new.mixer_gain_index = 1;
        reconciler.apply(new, false, acq.open_tuner());

        assert_eq!(reconciler.settings().band_index, 2);
        assert_eq!(probe.param_writes(hid::SET_MIXER_GAIN), vec![1]);
    }

    #[test]
    fn test_mirror_target_change_flagged() {
        let mut reconciler = Reconciler::default();
        let mut new = reconciler.settings().clone();
        new.remote_mirror.port = 9000;

        let applied = reconciler.apply(new, false, None);
        assert!(applied.changes.is_empty());
        assert!(applied.full_update(false));
    }

    #[test]
    fn test_forced_apply_pushes_everything() {
        let (mut acq, probe) = open_acquisition();
        let mut reconciler = Reconciler::default();

        let snapshot = reconciler.settings().clone();
        let applied = reconciler.apply(snapshot, true, acq.open_tuner());

        assert!(applied.changes.is_complete());
        assert_eq!(probe.frequency_writes(), vec![435_000_000]);
        assert_eq!(probe.write_count(), OPTION_FIELDS.len() + 1);
        assert!(applied.notification.is_some());
        assert_eq!(applied.corrections, Some((false, false)));
    }

    fn arb_settings() -> impl Strategy<Value = FcdProSettings> {
        (
            -1_000_000i64..3_000_000_000,
            -200i32..200,
            proptest::collection::vec(-2i32..40, 16),
            any::<(bool, bool, bool)>(),
            -1_000_000_000i64..1_000_000_000,
        )
            .prop_map(|(center, ppm, indices, (dc, iq, xv), delta)| {
                let mut s = FcdProSettings {
                    center_frequency: center,
                    lo_ppm_tenths: ppm,
                    dc_block: dc,
                    iq_correction: iq,
                    transverter_mode: xv,
                    transverter_delta_frequency: delta,
                    ..Default::default()
                };
                for (field, index) in OPTION_FIELDS.iter().zip(indices) {
                    (field.set)(&mut s, index);
                }
                s
            })
    }

    proptest! {
        #[test]
        fn prop_second_apply_is_empty(new in arb_settings()) {
            let mut reconciler = Reconciler::default();
            reconciler.apply(new.clone(), false, None);
            let again = reconciler.apply(new, false, None);
            prop_assert!(again.changes.is_empty());
            prop_assert!(again.notification.is_none());
        }

        #[test]
        fn prop_forced_apply_is_total(new in arb_settings()) {
            let mut reconciler = Reconciler::default();
            let applied = reconciler.apply(new, true, None);
            prop_assert!(applied.changes.is_complete());
        }

        #[test]
        fn prop_stored_indices_stay_in_range(new in arb_settings()) {
            let mut reconciler = Reconciler::default();
            reconciler.apply(new, false, None);
            for field in OPTION_FIELDS.iter() {
                prop_assert!(field.is_valid((field.get)(reconciler.settings())));
            }
        }

        #[test]
        fn prop_device_frequency_never_negative(new in arb_settings()) {
            let (mut acq, probe) = open_acquisition();
            let mut reconciler = Reconciler::default();
            let expected = new.corrected_device_frequency();
            reconciler.apply(new, true, acq.open_tuner());
            prop_assert!(expected >= 0.0);
            prop_assert_eq!(probe.frequency_writes(), vec![expected.round() as u64]);
        }
    }
}
