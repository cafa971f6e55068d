use rustfft::FftPlanner;
use rustfft::num_complex::Complex64;

use crate::constants::PI;

pub fn doppler_shift(
    iq_vec: &mut [Complex64],
    doppler_hz: f64,
    t0_sec: f64,
    carrier_phase: f64,
    fs: f64,
) {
    for (n, s) in iq_vec.iter_mut().enumerate() {
        let t = t0_sec + n as f64 / fs;
        let phi = 2.0 * PI * doppler_hz * t + carrier_phase;
        *s *= Complex64::from_polar(1.0, -phi);
    }
}

/// Cyclic cross-correlation against a pre-computed replica spectrum.
pub fn calc_correlation(
    fft_planner: &mut FftPlanner<f64>,
    iq_vec: &[Complex64],
    prn_code_fft: &[Complex64],
) -> Vec<Complex64> {
    let num_samples = iq_vec.len();
    assert_eq!(num_samples, prn_code_fft.len());

    let mut v = iq_vec.to_vec();
    fft_planner.plan_fft_forward(num_samples).process(&mut v);

    for (x, p) in v.iter_mut().zip(prn_code_fft) {
        *x *= p.conj();
    }

    fft_planner.plan_fft_inverse(num_samples).process(&mut v);

    let scale = 1.0 / num_samples as f64;
    v.iter_mut().for_each(|x| *x *= scale);
    v
}

pub fn get_max_with_idx(v: &[f64]) -> (usize, f64) {
    let mut idx = 0;
    let mut max = f64::MIN;
    for (i, &x) in v.iter().enumerate() {
        if x > max {
            max = x;
            idx = i;
        }
    }
    (idx, max)
}

pub fn get_norm_max_with_idx(v: &[Complex64]) -> (usize, f64) {
    let mut idx = 0;
    let mut max = f64::MIN;
    for (i, x) in v.iter().enumerate() {
        let norm = x.norm();
        if norm > max {
            max = norm;
            idx = i;
        }
    }
    (idx, max)
}

pub fn mean(v: &[f64]) -> f64 {
    if v.is_empty() {
        return 0.0;
    }
    v.iter().sum::<f64>() / v.len() as f64
}

pub fn variance(v: &[f64]) -> f64 {
    if v.is_empty() {
        return 0.0;
    }
    let m = mean(v);
    v.iter().map(|&x| (x - m) * (x - m)).sum::<f64>() / v.len() as f64
}

// RTKLIB-style bit-field access on a packed, MSB-first buffer.

pub fn getbitu(buf: &[u8], pos: u32, len: u32) -> u32 {
    let mut bits = 0u32;
    for i in pos..pos + len {
        bits = (bits << 1) | ((buf[(i / 8) as usize] >> (7 - i % 8)) & 1) as u32;
    }
    bits
}

pub fn getbits(buf: &[u8], pos: u32, len: u32) -> i32 {
    let bits = getbitu(buf, pos, len);
    if len == 0 || len >= 32 || bits & (1 << (len - 1)) == 0 {
        return bits as i32;
    }
    (bits | (!0u32 << len)) as i32
}

pub fn getbitu2(buf: &[u8], p1: u32, l1: u32, p2: u32, l2: u32) -> u32 {
    (getbitu(buf, p1, l1) << l2) + getbitu(buf, p2, l2)
}

pub fn getbits2(buf: &[u8], p1: u32, l1: u32, p2: u32, l2: u32) -> i32 {
    if getbitu(buf, p1, 1) != 0 {
        (getbits(buf, p1, l1) << l2) + getbitu(buf, p2, l2) as i32
    } else {
        getbitu2(buf, p1, l1, p2, l2) as i32
    }
}

pub fn pack_bits(bits: &[u8], data: &mut [u8]) {
    data.iter_mut().for_each(|b| *b = 0);
    for (i, &bit) in bits.iter().enumerate() {
        if bit != 0 {
            data[i / 8] |= 1 << (7 - i % 8);
        }
    }
}

pub fn xor_bits(v: u32) -> u8 {
    (v.count_ones() & 1) as u8
}

pub fn hex_str(data: &[u8], num_bits: usize) -> String {
    let num_bytes = num_bits.div_ceil(8);
    data[..num_bytes].iter().map(|b| format!("{b:02x}")).collect()
}
