use rustfft::FftPlanner;
use rustfft::num_complex::Complex64;

use crate::constants::{NUM_GPS_SATS, PRN_CODE_LEN, SAMPLES_PER_MSEC};

// G2 shift per PRN, IS-GPS-200 table 3-I
const G2_DELAY: [usize; NUM_GPS_SATS] = [
    5, 6, 7, 8, 17, 18, 139, 140, 141, 251, 252, 254, 255, 256, 257, 258, 469, 470, 471, 472, 473,
    474, 509, 512, 513, 514, 515, 516, 859, 860, 861, 862,
];

/// C/A code replicas for all 32 satellites, generated once at startup.
pub struct Code {
    replicas: Vec<Vec<Complex64>>,
    replica_ffts: Vec<Vec<Complex64>>,
}

impl Code {
    pub fn new() -> Self {
        let mut fft_planner = FftPlanner::new();
        let fft = fft_planner.plan_fft_forward(SAMPLES_PER_MSEC);
        let mut replicas = Vec::with_capacity(NUM_GPS_SATS);
        let mut replica_ffts = Vec::with_capacity(NUM_GPS_SATS);

        for prn in 1..=NUM_GPS_SATS as u8 {
            let chips = Self::gen_ca_code(prn);
            // 2 samples per chip, bipolar, zero imaginary part
            let replica: Vec<Complex64> = (0..SAMPLES_PER_MSEC)
                .map(|n| Complex64::new(1.0 - 2.0 * chips[n / 2] as f64, 0.0))
                .collect();
            let mut replica_fft = replica.clone();
            fft.process(&mut replica_fft);
            replicas.push(replica);
            replica_ffts.push(replica_fft);
        }

        Self {
            replicas,
            replica_ffts,
        }
    }

    pub fn gen_ca_code(prn: u8) -> Vec<u8> {
        let mut g1 = [1u8; 10];
        let mut g2 = [1u8; 10];
        let mut g1_seq = [0u8; PRN_CODE_LEN];
        let mut g2_seq = [0u8; PRN_CODE_LEN];

        for i in 0..PRN_CODE_LEN {
            g1_seq[i] = g1[9];
            g2_seq[i] = g2[9];
            let f1 = g1[2] ^ g1[9];
            let f2 = g2[1] ^ g2[2] ^ g2[5] ^ g2[7] ^ g2[8] ^ g2[9];
            g1.rotate_right(1);
            g2.rotate_right(1);
            g1[0] = f1;
            g2[0] = f2;
        }

        let delay = G2_DELAY[(prn - 1) as usize];
        (0..PRN_CODE_LEN)
            .map(|i| g1_seq[i] ^ g2_seq[(i + PRN_CODE_LEN - delay) % PRN_CODE_LEN])
            .collect()
    }

    pub fn replica(&self, prn: u8) -> &[Complex64] {
        &self.replicas[(prn - 1) as usize]
    }

    pub fn replica_fft(&self, prn: u8) -> &[Complex64] {
        &self.replica_ffts[(prn - 1) as usize]
    }
}

impl Default for Code {
    fn default() -> Self {
        Self::new()
    }
}
