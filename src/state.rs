use gnss_rs::sv::SV;
use serde::Serialize;

use crate::world::OrbitalParameters;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum SatelliteStatus {
    Eligible,
    Provisional,
    Locked,
    Dropped(String),
}

#[derive(Debug, Clone, Serialize)]
pub struct SatelliteSnapshot {
    pub sv: SV,
    pub status: SatelliteStatus,
    pub doppler_hz: Option<f64>,
    pub code_phase: Option<usize>,
    pub orbit: OrbitalParameters,
}

pub struct UpdateFunc {
    pub func: Box<dyn Fn() + Send + Sync>,
}

/// Snapshot pushed to the dashboard after every receiver step.
#[derive(Serialize)]
pub struct ReceiverState {
    pub receiver_timestamp_sec: f64,
    pub eligible_satellites: Vec<u8>,
    pub tracked_satellite_count: usize,
    pub processed_subframe_count: usize,
    pub satellites: Vec<SatelliteSnapshot>,
    #[serde(skip)]
    pub update_func: UpdateFunc,
}

impl Default for ReceiverState {
    fn default() -> Self {
        Self {
            receiver_timestamp_sec: 0.0,
            eligible_satellites: vec![],
            tracked_satellite_count: 0,
            processed_subframe_count: 0,
            satellites: vec![],
            update_func: UpdateFunc {
                func: Box::new(|| {}),
            },
        }
    }
}

impl ReceiverState {
    pub fn set_update_func(&mut self, func: Box<dyn Fn() + Send + Sync>) {
        self.update_func.func = func;
    }
}
