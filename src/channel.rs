use gnss_rs::sv::SV;
use rustfft::num_complex::Complex64;
use std::fmt;

use crate::acquisition::AcquisitionResult;
use crate::bit_sync::{IntegratorEvent, NavBitIntegrator};
use crate::code::Code;
use crate::config::Config;
use crate::ephemeris::Subframe;
use crate::navigation::SubframeDecoder;
use crate::tracker::Tracker;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DropReason {
    BitPhaseAmbiguous { confidence: f64 },
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            DropReason::BitPhaseAmbiguous { confidence } => {
                write!(f, "bit phase ambiguous (confidence {confidence:.1})")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    SubframeReady(Subframe),
    Dropped(DropReason),
}

/// Per-satellite processing pipeline: tracker, bit integrator, subframe
/// decoder. Owns exactly one of each while the satellite is tracked.
pub struct Channel {
    pub sv: SV,
    pub tracker: Tracker,
    integrator: NavBitIntegrator,
    decoder: SubframeDecoder,
}

impl Channel {
    pub fn new(code: &Code, acq: &AcquisitionResult, config: &Config) -> Self {
        Self {
            sv: acq.sv,
            tracker: Tracker::new(code, acq, config),
            integrator: NavBitIntegrator::new(acq.sv, config),
            decoder: SubframeDecoder::new(acq.sv),
        }
    }

    pub fn process_samples(&mut self, ts_sec: f64, samples: &[Complex64]) -> Vec<ChannelEvent> {
        let pseudosymbol = self.tracker.process_samples(ts_sec, samples);

        let mut out = Vec::new();
        for event in self.integrator.process_pseudosymbol(pseudosymbol) {
            match event {
                IntegratorEvent::DeterminedBitPhase { .. } => {}
                IntegratorEvent::CannotDetermineBitPhase { confidence } => {
                    out.push(ChannelEvent::Dropped(DropReason::BitPhaseAmbiguous {
                        confidence,
                    }));
                }
                IntegratorEvent::EmitNavigationBit { bit } => {
                    if let Some(subframe) = self.decoder.process_bit(bit) {
                        out.push(ChannelEvent::SubframeReady(subframe));
                    }
                }
            }
        }
        out
    }

    pub fn is_locked(&self) -> bool {
        self.tracker.is_locked()
    }
}
