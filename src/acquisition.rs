use colored::Colorize;
use gnss_rs::sv::SV;
use rayon::prelude::*;
use rustfft::FftPlanner;
use rustfft::num_complex::Complex64;

use crate::code::Code;
use crate::config::Config;
use crate::constants::{CODE_PERIOD_SEC, PI, SAMPLE_RATE, SAMPLES_PER_MSEC};
use crate::util::{calc_correlation, doppler_shift, get_max_with_idx, mean};

#[derive(Clone, Copy, Debug)]
pub struct AcquisitionResult {
    pub sv: SV,
    pub doppler_hz: f64,
    pub carrier_phase: f64,
    pub code_phase: usize,
    pub peak_to_mean: f64,
}

/// Search the Doppler x code-phase grid for every eligible satellite over a
/// coherent buffer of `acquisition_integration_period_ms` milliseconds.
/// `buffer_ts_sec` is the receiver time of the first sample in the buffer.
pub fn search_satellites(
    code: &Code,
    eligible: &[SV],
    iq_buffer: &[Complex64],
    buffer_ts_sec: f64,
    config: &Config,
) -> Vec<AcquisitionResult> {
    if iq_buffer.len() < config.acquisition_integration_period_ms * SAMPLES_PER_MSEC {
        return vec![];
    }

    eligible
        .par_iter()
        .filter_map(|&sv| try_acquisition_one_sat(code, sv, iq_buffer, buffer_ts_sec, config))
        .collect()
}

fn try_acquisition_one_sat(
    code: &Code,
    sv: SV,
    iq_buffer: &[Complex64],
    buffer_ts_sec: f64,
    config: &Config,
) -> Option<AcquisitionResult> {
    let mut fft_planner = FftPlanner::new();
    let prn_code_fft = code.replica_fft(sv.prn);
    let num_msec = config.acquisition_integration_period_ms;
    let num_bins =
        (2.0 * config.doppler_search_range_hz / config.doppler_search_step_hz).round() as usize + 1;

    let mut best: Option<AcquisitionResult> = None;

    for bin in 0..num_bins {
        let doppler_hz =
            -config.doppler_search_range_hz + bin as f64 * config.doppler_search_step_hz;

        let mut non_coherent = vec![0.0f64; SAMPLES_PER_MSEC];
        let mut first_slice = Vec::new();
        for idx in 0..num_msec {
            let lo = idx * SAMPLES_PER_MSEC;
            let mut slice = iq_buffer[lo..lo + SAMPLES_PER_MSEC].to_vec();
            let t0 = buffer_ts_sec + idx as f64 * CODE_PERIOD_SEC;
            doppler_shift(&mut slice, doppler_hz, t0, 0.0, SAMPLE_RATE);
            let corr = calc_correlation(&mut fft_planner, &slice, prn_code_fft);
            for (acc, c) in non_coherent.iter_mut().zip(&corr) {
                *acc += c.norm();
            }
            if idx == 0 {
                first_slice = corr;
            }
        }

        let (code_phase, peak) = get_max_with_idx(&non_coherent);
        let peak_to_mean = peak / mean(&non_coherent);

        if best.is_none_or(|b| peak_to_mean > b.peak_to_mean) {
            best = Some(AcquisitionResult {
                sv,
                doppler_hz,
                carrier_phase: first_slice[code_phase].arg().rem_euclid(2.0 * PI),
                code_phase,
                peak_to_mean,
            });
        }
    }

    let best = best?;
    if best.peak_to_mean < config.acquisition_peak_to_mean_threshold {
        return None;
    }
    log::info!(
        "{}: {} dopp={:5.0} code_phase={:4} p2m={:.1}",
        sv,
        "DETECTED".yellow(),
        best.doppler_hz,
        best.code_phase,
        best.peak_to_mean,
    );
    Some(best)
}
