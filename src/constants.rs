pub const PI: f64 = std::f64::consts::PI;

pub const SAMPLE_RATE: f64 = 2.046e6;
pub const SAMPLES_PER_MSEC: usize = 2046;
pub const PRN_CODE_LEN: usize = 1023;
pub const NUM_GPS_SATS: usize = 32;
pub const CODE_PERIOD_SEC: f64 = 1e-3;

pub const PSEUDOSYMBOLS_PER_BIT: usize = 20;
pub const BITS_PER_SUBFRAME: usize = 300;
pub const WORDS_PER_SUBFRAME: usize = 10;
pub const TRACKER_HISTORY_LEN: usize = 1000;

// GPS LNAV scale factors, IS-GPS-200 table 20-I
pub const P2_5: f64 = 3.125e-2;
pub const P2_19: f64 = 1.907348632812500e-6;
pub const P2_29: f64 = 1.862645149230957e-9;
pub const P2_31: f64 = 4.656612873077393e-10;
pub const P2_33: f64 = 1.164153218269348e-10;
pub const P2_43: f64 = 1.136868377216160e-13;
pub const P2_55: f64 = 2.775557561562891e-17;
