use colored::Colorize;
use gnss_rs::sv::SV;
use rustfft::FftPlanner;
use rustfft::num_complex::Complex64;
use std::collections::VecDeque;

use crate::acquisition::AcquisitionResult;
use crate::code::Code;
use crate::config::Config;
use crate::constants::{PI, SAMPLE_RATE, SAMPLES_PER_MSEC, TRACKER_HISTORY_LEN};
use crate::util::{calc_correlation, get_norm_max_with_idx, variance};

const TAU: f64 = 2.0 * PI;
const DAMPING_FACTOR: f64 = std::f64::consts::FRAC_1_SQRT_2;

#[derive(Default)]
pub struct History {
    pub doppler_hz: VecDeque<f64>,
    pub carrier_phase: VecDeque<f64>,
    pub phase_error: VecDeque<f64>,
    pub corr_prompt: VecDeque<Complex64>,
    pub pseudosymbols: VecDeque<i8>,
}

fn push_bounded<T>(ring: &mut VecDeque<T>, v: T) {
    if ring.len() == TRACKER_HISTORY_LEN {
        ring.pop_front();
    }
    ring.push_back(v);
}

/// Code tracking (DLL) coupled with a Costas carrier loop. One call per
/// millisecond of samples, one pseudosymbol out.
pub struct Tracker {
    pub sv: SV,
    prn_code: Vec<Complex64>,
    fft_planner: FftPlanner<f64>,
    config: Config,

    pub doppler_hz: f64,
    pub carrier_phase: f64, // [0, 2pi)
    pub code_phase: usize,  // [0, 2046)
    locked: bool,
    num_tracking_samples: usize,

    pub hist: History,

    mixed: Vec<Complex64>,
    rotated: Vec<Complex64>,
}

impl Tracker {
    pub fn new(code: &Code, acq: &AcquisitionResult, config: &Config) -> Self {
        Self {
            sv: acq.sv,
            prn_code: code.replica(acq.sv.prn).to_vec(),
            fft_planner: FftPlanner::new(),
            config: config.clone(),
            doppler_hz: acq.doppler_hz,
            carrier_phase: acq.carrier_phase.rem_euclid(TAU),
            code_phase: acq.code_phase % SAMPLES_PER_MSEC,
            locked: false,
            num_tracking_samples: 0,
            hist: History::default(),
            mixed: vec![Complex64::default(); SAMPLES_PER_MSEC],
            rotated: vec![Complex64::default(); SAMPLES_PER_MSEC],
        }
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    fn loop_gains(&self) -> (f64, f64) {
        let bandwidth = if self.locked {
            self.config.loop_bandwidth_locked_hz
        } else {
            self.config.loop_bandwidth_unlocked_hz
        };
        let t = 1.0 / SAMPLE_RATE;
        let alpha = 4.0 * DAMPING_FACTOR * bandwidth * t;
        let beta = 4.0 * bandwidth * bandwidth * t;
        (alpha, beta)
    }

    pub fn process_samples(&mut self, ts_sec: f64, samples: &[Complex64]) -> i8 {
        assert_eq!(samples.len(), SAMPLES_PER_MSEC);

        // carrier wipe-off
        for (n, (m, s)) in self.mixed.iter_mut().zip(samples).enumerate() {
            let t = ts_sec + n as f64 / SAMPLE_RATE;
            let phi = TAU * self.doppler_hz * t + self.carrier_phase;
            *m = *s * Complex64::from_polar(1.0, -phi);
        }

        // correlate against the replica rotated by the current code phase
        let split = SAMPLES_PER_MSEC - self.code_phase;
        self.rotated[self.code_phase..].copy_from_slice(&self.prn_code[..split]);
        self.rotated[..self.code_phase].copy_from_slice(&self.prn_code[split..]);

        let mut rotated_fft = self.rotated.clone();
        self.fft_planner
            .plan_fft_forward(SAMPLES_PER_MSEC)
            .process(&mut rotated_fft);
        let corr = calc_correlation(&mut self.fft_planner, &self.mixed, &rotated_fft);

        // DLL: slew the code phase one sample toward the measured offset
        let (peak_idx, _) = get_norm_max_with_idx(&corr);
        let centered = if peak_idx <= SAMPLES_PER_MSEC / 2 {
            peak_idx as i64
        } else {
            peak_idx as i64 - SAMPLES_PER_MSEC as i64
        };
        if centered > 0 {
            self.code_phase = (self.code_phase + 1) % SAMPLES_PER_MSEC;
        } else if centered < 0 {
            self.code_phase = (self.code_phase + SAMPLES_PER_MSEC - 1) % SAMPLES_PER_MSEC;
        }

        // Costas discriminator on the prompt peak; ambiguous by pi, which the
        // decoder's preamble polarity search absorbs.
        let prompt = corr[peak_idx];
        let phase_error = prompt.re * prompt.im;

        let (alpha, beta) = self.loop_gains();
        self.carrier_phase = (self.carrier_phase + alpha * phase_error).rem_euclid(TAU);
        self.doppler_hz += beta * phase_error;

        let pseudosymbol: i8 = if prompt.re < 0.0 { -1 } else { 1 };

        push_bounded(&mut self.hist.doppler_hz, self.doppler_hz);
        push_bounded(&mut self.hist.carrier_phase, self.carrier_phase);
        push_bounded(&mut self.hist.phase_error, phase_error);
        push_bounded(&mut self.hist.corr_prompt, prompt);
        push_bounded(&mut self.hist.pseudosymbols, pseudosymbol);

        self.num_tracking_samples += 1;
        self.update_lock_state(ts_sec);
        self.log_periodically(ts_sec);

        pseudosymbol
    }

    fn update_lock_state(&mut self, ts_sec: f64) {
        if self.hist.phase_error.len() < self.config.lock_history_ms {
            return;
        }
        let locked = self.evaluate_lock();
        if locked != self.locked {
            let label = if locked {
                "LOCKED".green()
            } else {
                "UNLOCKED".red()
            };
            log::warn!(
                "{}: {label} dopp={:5.0} code_phase={:4} ts_sec={:.3}",
                self.sv,
                self.doppler_hz,
                self.code_phase,
                ts_sec,
            );
        }
        self.locked = locked;
    }

    fn evaluate_lock(&self) -> bool {
        let n = self.config.lock_history_ms;

        let errors: Vec<f64> = self.hist.phase_error.iter().rev().take(n).copied().collect();
        if variance(&errors) >= self.config.phase_error_variance_lock_threshold {
            return false;
        }

        let prompts: Vec<Complex64> = self.hist.corr_prompt.iter().rev().take(n).copied().collect();

        // A locked I channel clusters tightly around two poles; measure the
        // spread around each pole separately.
        let positive: Vec<f64> = prompts.iter().map(|c| c.re).filter(|&i| i >= 0.0).collect();
        let negative: Vec<f64> = prompts.iter().map(|c| c.re).filter(|&i| i < 0.0).collect();
        if positive.len() > 1 && negative.len() > 1 {
            let spread = (variance(&positive) + variance(&negative)) / 2.0;
            if spread >= self.config.i_channel_variance_lock_threshold {
                return false;
            }
        }

        // Residual rotation of the constellation, read off the left pole.
        let left: Vec<Complex64> = prompts.iter().filter(|c| c.re < 0.0).copied().collect();
        if left.len() > 1 {
            let centre = left.iter().sum::<Complex64>() / left.len() as f64;
            let angle = 180.0 - centre.im.atan2(centre.re).to_degrees().rem_euclid(180.0);
            let centered_angle = if angle < 90.0 { angle } else { 180.0 - angle };
            if centered_angle.abs() >= self.config.constellation_angle_lock_threshold_deg {
                return false;
            }
        }

        true
    }

    fn log_periodically(&self, ts_sec: f64) {
        if self.num_tracking_samples % 1000 != 0 {
            return;
        }
        log::info!(
            "{}: TRCK locked={} dopp={:5.0} code_phase={:4} phi={:.2} ts_sec={:.3}",
            self.sv,
            self.locked,
            self.doppler_hz,
            self.code_phase,
            self.carrier_phase,
            ts_sec,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::CODE_PERIOD_SEC;
    use gnss_rs::constellation::Constellation;

    fn acq(prn: u8, doppler_hz: f64, carrier_phase: f64, code_phase: usize) -> AcquisitionResult {
        AcquisitionResult {
            sv: SV::new(Constellation::GPS, prn),
            doppler_hz,
            carrier_phase,
            code_phase,
            peak_to_mean: 10.0,
        }
    }

    // One millisecond of a clean satellite signal. `phase_fn` is the carrier
    // phase integrated from t=0 so Doppler ramps stay coherent.
    fn synth_msec(
        code: &Code,
        prn: u8,
        ms: usize,
        phase_fn: impl Fn(f64) -> f64,
        code_phase: usize,
        amplitude: f64,
        bit_fn: impl Fn(i64) -> f64,
    ) -> Vec<Complex64> {
        let replica = code.replica(prn);
        (0..SAMPLES_PER_MSEC)
            .map(|i| {
                let n = (ms * SAMPLES_PER_MSEC + i) as i64;
                let chip =
                    replica[(n - code_phase as i64).rem_euclid(SAMPLES_PER_MSEC as i64) as usize].re;
                let period = (n - code_phase as i64).div_euclid(SAMPLES_PER_MSEC as i64);
                let t = n as f64 / SAMPLE_RATE;
                Complex64::from_polar(amplitude * chip * bit_fn(period), phase_fn(t))
            })
            .collect()
    }

    #[test]
    fn clean_signal_locks_and_holds_invariants() {
        let code = Code::new();
        let config = Config::default();
        let mut tracker = Tracker::new(&code, &acq(1, 1200.0, 0.3, 500), &config);

        let phase = |t: f64| TAU * 1200.0 * t + 0.3;
        let mut first_lock_ms = None;
        for ms in 0..600 {
            let samples = synth_msec(&code, 1, ms, phase, 500, 0.1, |_| 1.0);
            let sym = tracker.process_samples(ms as f64 * CODE_PERIOD_SEC, &samples);
            assert!(sym == 1 || sym == -1);
            assert!(tracker.code_phase < SAMPLES_PER_MSEC);
            assert!((0.0..TAU).contains(&tracker.carrier_phase));
            if tracker.is_locked() && first_lock_ms.is_none() {
                first_lock_ms = Some(ms);
            }
        }
        assert!(first_lock_ms.is_some_and(|ms| ms <= 500));
        assert!(tracker.is_locked());
        assert!((tracker.doppler_hz - 1200.0).abs() < 5.0);
        assert_eq!(tracker.code_phase, 500);
    }

    #[test]
    fn code_phase_converges_from_offset_estimate() {
        let code = Code::new();
        let config = Config::default();
        // acquisition handed us a code phase 4 samples off
        let mut tracker = Tracker::new(&code, &acq(5, 0.0, 0.0, 496), &config);

        for ms in 0..50 {
            let samples = synth_msec(&code, 5, ms, |_| 0.0, 500, 0.1, |_| 1.0);
            tracker.process_samples(ms as f64 * CODE_PERIOD_SEC, &samples);
        }
        assert_eq!(tracker.code_phase, 500);
    }

    #[test]
    fn pseudosymbols_follow_bit_flips() {
        let code = Code::new();
        let config = Config::default();
        let mut tracker = Tracker::new(&code, &acq(2, 0.0, 0.0, 0), &config);

        // navigation bits alternate every 20 code periods
        let bit = |period: i64| {
            if (period.div_euclid(20)) % 2 == 0 {
                1.0
            } else {
                -1.0
            }
        };
        let mut symbols = vec![];
        for ms in 0..120 {
            let samples = synth_msec(&code, 2, ms, |_| 0.0, 0, 0.1, bit);
            symbols.push(tracker.process_samples(ms as f64 * CODE_PERIOD_SEC, &samples));
        }
        // skip the first bit in case the loop needed a moment to settle
        for (ms, &sym) in symbols.iter().enumerate().skip(20) {
            let expected = if (ms / 20) % 2 == 0 { 1 } else { -1 };
            assert_eq!(sym, expected, "ms {ms}");
        }
    }

    #[test]
    fn tracks_doppler_ramp() {
        let code = Code::new();
        // a sweeping carrier keeps the discriminator at a rate-dependent
        // equilibrium that moves when the bandwidth swaps; keep the variance
        // gate out of the way so the loop settles in the narrow bandwidth
        let config = Config {
            phase_error_variance_lock_threshold: 1e8,
            ..Config::default()
        };
        let mut tracker = Tracker::new(&code, &acq(4, 1000.0, 0.0, 100), &config);

        // 100 Hz/s sweep starting at 1000 Hz
        let rate = 100.0;
        let phase = move |t: f64| TAU * (1000.0 * t + 0.5 * rate * t * t);
        for ms in 0..2000 {
            let samples = synth_msec(&code, 4, ms, phase, 100, 0.1, |_| 1.0);
            tracker.process_samples(ms as f64 * CODE_PERIOD_SEC, &samples);
        }
        let truth = 1000.0 + rate * 2.0;
        assert!(tracker.is_locked());
        assert!(
            (tracker.doppler_hz - truth).abs() <= 5.0,
            "estimate {} truth {}",
            tracker.doppler_hz,
            truth
        );
    }

    #[test]
    fn lock_requires_enough_history() {
        let code = Code::new();
        let config = Config::default();
        let mut tracker = Tracker::new(&code, &acq(6, 0.0, 0.0, 0), &config);
        for ms in 0..config.lock_history_ms - 1 {
            let samples = synth_msec(&code, 6, ms, |_| 0.0, 0, 0.1, |_| 1.0);
            tracker.process_samples(ms as f64 * CODE_PERIOD_SEC, &samples);
        }
        assert!(!tracker.is_locked());
    }
}
