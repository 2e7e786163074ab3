//! Back-EMF characterization records.
//!
//! During the indication window each half-cycle produces one
//! [`BackEmfSample`]: three readings taken in a fixed order around the
//! drive-to-coast edge.
//!
//! | Reading | Taken |
//! |---------|-------|
//! | `drive` | `active - margin` after drive start, still driving |
//! | `immediate` | right after the bridge switches to coast |
//! | `settled` | after the filter settle delay |
//!
//! The sense amplifier shifts the ±3.3 V terminal voltage into the ADC range
//! around a 1.65 V bias through a 2:1 divider. [`pin_to_back_emf_mv`] undoes
//! both.

use crate::traits::Direction;

/// ADC bias of the back-EMF sense network.
pub const BACK_EMF_BIAS_MV: i32 = 1650;

/// Converts an ADC pin voltage to terminal back-EMF.
///
/// ```
/// use bilateral_haptic::backemf::pin_to_back_emf_mv;
///
/// assert_eq!(pin_to_back_emf_mv(1650), 0);
/// assert_eq!(pin_to_back_emf_mv(3300), 3300);
/// assert_eq!(pin_to_back_emf_mv(0), -3300);
/// ```
#[inline]
pub const fn pin_to_back_emf_mv(pin_mv: i32) -> i32 {
    2 * (pin_mv - BACK_EMF_BIAS_MV)
}

/// One timestamped reading.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Reading {
    /// Back-EMF in millivolts.
    pub millivolts: i32,
    /// Clock time of the read.
    pub at_ms: u64,
}

/// A complete three-phase measurement of one half-cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BackEmfSample {
    /// Half-cycle polarity.
    pub direction: Direction,
    /// Clock time the drive started.
    pub drive_started_ms: u64,
    /// Reading near the end of drive.
    pub drive: Reading,
    /// Reading at the start of coast.
    pub immediate: Reading,
    /// Reading after the settle delay.
    pub settled: Reading,
}

impl BackEmfSample {
    /// Returns `true` when the readings were taken in protocol order.
    pub fn is_ordered(&self) -> bool {
        self.drive_started_ms <= self.drive.at_ms
            && self.drive.at_ms < self.immediate.at_ms
            && self.immediate.at_ms < self.settled.at_ms
    }

    /// Offset of the `drive` reading from the drive start.
    pub fn drive_offset_ms(&self) -> u64 {
        self.drive.at_ms.saturating_sub(self.drive_started_ms)
    }
}

/// Receives completed samples.
///
/// The controller always logs each sample; a sink adds a second consumer
/// (tests, telemetry).
pub trait SampleSink {
    /// Called once per completed sample.
    fn record(&mut self, sample: &BackEmfSample);
}

/// Discards samples.
impl SampleSink for () {
    fn record(&mut self, _sample: &BackEmfSample) {}
}

#[cfg(feature = "std")]
impl SampleSink for std::sync::mpsc::Sender<BackEmfSample> {
    fn record(&mut self, sample: &BackEmfSample) {
        // a dropped receiver only means nobody is listening
        let _ = self.send(*sample);
    }
}

/// Logs a completed sample in the `FWD`/`REV` line format.
pub fn log_sample(sample: &BackEmfSample) {
    log::info!(
        "{}: drive={}mV immediate={}mV settled={}mV",
        sample.direction.label(),
        sample.drive.millivolts,
        sample.immediate.millivolts,
        sample.settled.millivolts
    );
}
