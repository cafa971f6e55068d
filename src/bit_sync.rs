use gnss_rs::sv::SV;

use crate::config::Config;
use crate::constants::PSEUDOSYMBOLS_PER_BIT;
use crate::util::mean;

// Pseudosymbols buffered before the first bit-phase determination attempt.
const DETERMINATION_SYMBOLS: usize = 40;

#[derive(Debug, Clone, PartialEq)]
pub enum IntegratorEvent {
    DeterminedBitPhase { bit_phase: usize, confidence: f64 },
    CannotDetermineBitPhase { confidence: f64 },
    EmitNavigationBit { bit: u8 },
}

enum SyncState {
    Determining,
    Synced,
    Failed,
}

/// Folds 1 kHz pseudosymbols into 50 Hz navigation bits once the 20-symbol
/// bit phase has been determined with enough confidence.
pub struct NavBitIntegrator {
    sv: SV,
    state: SyncState,
    buffered: Vec<i8>,
    acc: i32,
    count: usize,
    confidence_threshold: f64,
}

impl NavBitIntegrator {
    pub fn new(sv: SV, config: &Config) -> Self {
        Self {
            sv,
            state: SyncState::Determining,
            buffered: Vec::with_capacity(DETERMINATION_SYMBOLS),
            acc: 0,
            count: 0,
            confidence_threshold: config.bit_phase_confidence_threshold,
        }
    }

    pub fn process_pseudosymbol(&mut self, pseudosymbol: i8) -> Vec<IntegratorEvent> {
        match self.state {
            SyncState::Failed => vec![],
            SyncState::Synced => self.integrate(pseudosymbol).into_iter().collect(),
            SyncState::Determining => {
                self.buffered.push(pseudosymbol);
                if self.buffered.len() < DETERMINATION_SYMBOLS {
                    return vec![];
                }
                self.determine_bit_phase()
            }
        }
    }

    fn integrate(&mut self, pseudosymbol: i8) -> Option<IntegratorEvent> {
        self.acc += pseudosymbol as i32;
        self.count += 1;
        if self.count < PSEUDOSYMBOLS_PER_BIT {
            return None;
        }
        let bit = (self.acc >= 0) as u8;
        self.acc = 0;
        self.count = 0;
        Some(IntegratorEvent::EmitNavigationBit { bit })
    }

    fn determine_bit_phase(&mut self) -> Vec<IntegratorEvent> {
        let mut bit_phase = 0;
        let mut confidence = f64::MIN;
        for roll in 0..PSEUDOSYMBOLS_PER_BIT {
            let sums: Vec<f64> = self.buffered[roll..]
                .chunks_exact(PSEUDOSYMBOLS_PER_BIT)
                .map(|chunk| (chunk.iter().map(|&s| s as i32).sum::<i32>() as f64).abs())
                .collect();
            let score = mean(&sums);
            if score > confidence {
                confidence = score;
                bit_phase = roll;
            }
        }

        if confidence < self.confidence_threshold {
            log::warn!(
                "{}: cannot determine bit phase, confidence {:.1}",
                self.sv,
                confidence
            );
            self.state = SyncState::Failed;
            return vec![IntegratorEvent::CannotDetermineBitPhase { confidence }];
        }

        log::info!(
            "{}: bit phase {} determined, confidence {:.1}",
            self.sv,
            bit_phase,
            confidence
        );
        let mut events = vec![IntegratorEvent::DeterminedBitPhase {
            bit_phase,
            confidence,
        }];

        // Fold the symbols buffered past the bit boundary so no bits are lost.
        let buffered = std::mem::take(&mut self.buffered);
        self.state = SyncState::Synced;
        for &sym in &buffered[bit_phase..] {
            events.extend(self.integrate(sym));
        }
        events
    }
}
