use gnss_rs::sv::SV;
use serde::Serialize;
use std::collections::HashMap;

use crate::ephemeris::Subframe;

/// Classical Keplerian elements, filled in progressively as subframes arrive.
/// Angles are in semi-circles, straight from the navigation message.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct OrbitalParameters {
    pub semi_major_axis_m: Option<f64>,
    pub eccentricity: Option<f64>,
    pub inclination_sc: Option<f64>,
    pub longitude_of_ascending_node_sc: Option<f64>,
    pub argument_of_perigee_sc: Option<f64>,
    pub mean_anomaly_sc: Option<f64>,
}

impl OrbitalParameters {
    pub fn is_complete(&self) -> bool {
        self.semi_major_axis_m.is_some()
            && self.eccentricity.is_some()
            && self.inclination_sc.is_some()
            && self.longitude_of_ascending_node_sc.is_some()
            && self.argument_of_perigee_sc.is_some()
            && self.mean_anomaly_sc.is_some()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct TimeParameters {
    pub week_number: Option<u32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeterminedOrbit {
    pub sv: SV,
    pub parameters: OrbitalParameters,
}

/// Aggregates decoded subframes into per-satellite orbit models.
#[derive(Default)]
pub struct WorldModel {
    orbits: HashMap<SV, OrbitalParameters>,
    times: HashMap<SV, TimeParameters>,
    pub processed_subframes: usize,
}

impl WorldModel {
    pub fn handle_subframe(&mut self, sv: SV, subframe: &Subframe) -> Option<DeterminedOrbit> {
        self.processed_subframes += 1;
        let orbit = self.orbits.entry(sv).or_default();
        let was_complete = orbit.is_complete();

        match subframe {
            Subframe::One(sf) => {
                self.times.entry(sv).or_default().week_number = Some(sf.week);
            }
            Subframe::Two(sf) => {
                orbit.mean_anomaly_sc = Some(sf.m0);
                orbit.eccentricity = Some(sf.ecc);
                // transmitted as the square root
                orbit.semi_major_axis_m = Some(sf.sqrt_a * sf.sqrt_a);
            }
            Subframe::Three(sf) => {
                orbit.inclination_sc = Some(sf.i0);
                orbit.argument_of_perigee_sc = Some(sf.omega);
                orbit.longitude_of_ascending_node_sc = Some(sf.omega0);
            }
            Subframe::Four(_) | Subframe::Five(_) => {}
        }

        if !was_complete && orbit.is_complete() {
            return Some(DeterminedOrbit {
                sv,
                parameters: *orbit,
            });
        }
        None
    }

    pub fn orbital_parameters(&self, sv: SV) -> Option<&OrbitalParameters> {
        self.orbits.get(&sv)
    }

    pub fn time_parameters(&self, sv: SV) -> Option<&TimeParameters> {
        self.times.get(&sv)
    }
}
