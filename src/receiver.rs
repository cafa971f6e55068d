use colored::Colorize;
use gnss_rs::constellation::Constellation;
use gnss_rs::sv::SV;
use rayon::prelude::*;
use rustfft::num_complex::Complex64;
use std::collections::{HashMap, VecDeque};
use std::error::Error;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::acquisition;
use crate::channel::{Channel, ChannelEvent};
use crate::code::Code;
use crate::config::Config;
use crate::constants::{CODE_PERIOD_SEC, NUM_GPS_SATS, SAMPLES_PER_MSEC};
use crate::recording::SampleSource;
use crate::state::{ReceiverState, SatelliteSnapshot, SatelliteStatus};
use crate::world::WorldModel;

pub fn get_sat_list(sats: &str) -> Vec<SV> {
    let mut sat_vec = vec![];
    if !sats.is_empty() {
        for s in sats.split(',') {
            let prn = s.parse::<u8>().unwrap();
            sat_vec.push(SV::new(Constellation::GPS, prn));
        }
    } else {
        for prn in 1..=NUM_GPS_SATS as u8 {
            sat_vec.push(SV::new(Constellation::GPS, prn));
        }
    }
    sat_vec
}

/// Drives the whole receiver: one step consumes one millisecond of antenna
/// samples and fans it out to acquisition and to every tracked satellite.
pub struct Receiver {
    provider: Box<dyn SampleSource>,
    code: Code,
    config: Config,
    eligible: Vec<SV>,
    rolling_buffer: VecDeque<Vec<Complex64>>,
    channels: HashMap<SV, Channel>,
    world: WorldModel,
    drop_reasons: HashMap<SV, String>,
    exit_req: Arc<AtomicBool>,
    pub_state: Arc<Mutex<ReceiverState>>,
}

impl Receiver {
    pub fn new(
        provider: Box<dyn SampleSource>,
        sats: &str,
        config: Config,
        exit_req: Arc<AtomicBool>,
        pub_state: Arc<Mutex<ReceiverState>>,
    ) -> Self {
        Self {
            provider,
            code: Code::new(),
            eligible: get_sat_list(sats),
            rolling_buffer: VecDeque::with_capacity(config.acquisition_integration_period_ms),
            channels: HashMap::new(),
            world: WorldModel::default(),
            drop_reasons: HashMap::new(),
            config,
            exit_req,
            pub_state,
        }
    }

    pub fn step(&mut self) -> Result<(), Box<dyn Error>> {
        let cursor = self.provider.cursor();
        let samples = self.provider.get_samples(SAMPLES_PER_MSEC)?;
        let ts_sec = self.provider.seconds_since_start(cursor);

        if self.rolling_buffer.len() == self.config.acquisition_integration_period_ms {
            self.rolling_buffer.pop_front();
        }
        self.rolling_buffer.push_back(samples.clone());

        if self.channels.len() < self.config.target_tracked_satellites {
            self.try_acquisition(ts_sec);
        }

        let results: Vec<(SV, Vec<ChannelEvent>)> = self
            .channels
            .par_iter_mut()
            .map(|(&sv, channel)| (sv, channel.process_samples(ts_sec, &samples)))
            .collect();

        for (sv, events) in results {
            for event in events {
                match event {
                    ChannelEvent::SubframeReady(subframe) => {
                        if let Some(orbit) = self.world.handle_subframe(sv, &subframe) {
                            log::warn!(
                                "{}: {} {:?}",
                                sv,
                                "ORBIT DETERMINED".green(),
                                orbit.parameters,
                            );
                        }
                    }
                    ChannelEvent::Dropped(reason) => {
                        log::warn!("{}: {} {}", sv, "DROP".red(), reason);
                        self.channels.remove(&sv);
                        self.drop_reasons.insert(sv, reason.to_string());
                        self.eligible.push(sv);
                    }
                }
            }
        }

        self.publish_state(ts_sec);
        Ok(())
    }

    pub fn run_loop(&mut self, num_msec: usize) {
        let mut n = 0;
        loop {
            if let Err(err) = self.step() {
                log::info!("stopping: {err}");
                break;
            }
            if self.exit_req.load(Ordering::SeqCst) {
                log::info!("exit requested");
                break;
            }
            n += 1;
            if num_msec != 0 && n >= num_msec {
                break;
            }
        }
    }

    fn try_acquisition(&mut self, ts_sec: f64) {
        let period = self.config.acquisition_integration_period_ms;
        if self.rolling_buffer.len() < period {
            log::debug!("acquisition skipped: rolling buffer not primed yet");
            return;
        }

        let iq_buffer: Vec<Complex64> = self.rolling_buffer.iter().flatten().copied().collect();
        let buffer_ts_sec = ts_sec - (period as f64 - 1.0) * CODE_PERIOD_SEC;
        let results = acquisition::search_satellites(
            &self.code,
            &self.eligible,
            &iq_buffer,
            buffer_ts_sec,
            &self.config,
        );

        for res in results {
            log::warn!(
                "{}: {} dopp={:5.0} code_phase={:4} strength={:.1} ts_sec={:.3}",
                res.sv,
                "ACQUIRED".green(),
                res.doppler_hz,
                res.code_phase,
                res.peak_to_mean,
                ts_sec,
            );
            self.eligible.retain(|&sv| sv != res.sv);
            self.drop_reasons.remove(&res.sv);
            self.channels
                .insert(res.sv, Channel::new(&self.code, &res, &self.config));
        }
    }

    fn publish_state(&self, ts_sec: f64) {
        let mut satellites: Vec<SatelliteSnapshot> = Vec::new();
        for &sv in &self.eligible {
            let status = match self.drop_reasons.get(&sv) {
                Some(reason) => SatelliteStatus::Dropped(reason.clone()),
                None => SatelliteStatus::Eligible,
            };
            satellites.push(SatelliteSnapshot {
                sv,
                status,
                doppler_hz: None,
                code_phase: None,
                orbit: self.world.orbital_parameters(sv).copied().unwrap_or_default(),
            });
        }
        for (&sv, channel) in &self.channels {
            let status = if channel.is_locked() {
                SatelliteStatus::Locked
            } else {
                SatelliteStatus::Provisional
            };
            satellites.push(SatelliteSnapshot {
                sv,
                status,
                doppler_hz: Some(channel.tracker.doppler_hz),
                code_phase: Some(channel.tracker.code_phase),
                orbit: self.world.orbital_parameters(sv).copied().unwrap_or_default(),
            });
        }
        satellites.sort_by_key(|s| s.sv.prn);

        let mut state = self.pub_state.lock().unwrap();
        state.receiver_timestamp_sec = ts_sec;
        state.eligible_satellites = self.eligible.iter().map(|sv| sv.prn).collect();
        state.tracked_satellite_count = self.channels.len();
        state.processed_subframe_count = self.world.processed_subframes;
        state.satellites = satellites;
        (state.update_func.func)();
    }
}
