use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub acquisition_integration_period_ms: usize,
    pub acquisition_peak_to_mean_threshold: f64,
    pub target_tracked_satellites: usize,
    pub doppler_search_range_hz: f64,
    pub doppler_search_step_hz: f64,
    pub loop_bandwidth_locked_hz: f64,
    pub loop_bandwidth_unlocked_hz: f64,
    pub lock_history_ms: usize,
    pub phase_error_variance_lock_threshold: f64,
    pub i_channel_variance_lock_threshold: f64,
    pub constellation_angle_lock_threshold_deg: f64,
    pub bit_phase_confidence_threshold: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            acquisition_integration_period_ms: 20,
            acquisition_peak_to_mean_threshold: 5.0,
            target_tracked_satellites: 4,
            doppler_search_range_hz: 7000.0,
            doppler_search_step_hz: 200.0,
            loop_bandwidth_locked_hz: 3.0,
            loop_bandwidth_unlocked_hz: 6.0,
            lock_history_ms: 250,
            phase_error_variance_lock_threshold: 900.0,
            i_channel_variance_lock_threshold: 2.0,
            constellation_angle_lock_threshold_deg: 6.0,
            bit_phase_confidence_threshold: 15.0,
        }
    }
}
