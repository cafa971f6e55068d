use colored::Colorize;
use gnss_rs::sv::SV;

use crate::constants::{P2_5, P2_19, P2_29, P2_31, P2_33, P2_43, P2_55};
use crate::util::{getbits, getbits2, getbitu, getbitu2};

// Field positions index the full 300-bit frame, parity bits included.
// Angles stay in semi-circles, the unit the navigation message uses.

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Subframe {
    One(Subframe1),
    Two(Subframe2),
    Three(Subframe3),
    Four(PageSubframe),
    Five(PageSubframe),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Subframe1 {
    pub tow: u32,
    pub week: u32,
    pub code_on_l2: u32,
    pub ura_index: u32,
    pub sv_health: u32,
    pub iodc: u32,
    pub tgd: f64,
    pub toc: u32,
    pub af2: f64,
    pub af1: f64,
    pub af0: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Subframe2 {
    pub tow: u32,
    pub iode: u32,
    pub crs: f64,
    pub delta_n: f64,
    pub m0: f64,
    pub cuc: f64,
    pub ecc: f64,
    pub cus: f64,
    pub sqrt_a: f64,
    pub toe: u32,
    pub fit_interval: u32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Subframe3 {
    pub tow: u32,
    pub cic: f64,
    pub omega0: f64,
    pub cis: f64,
    pub i0: f64,
    pub crc: f64,
    pub omega: f64,
    pub omega_dot: f64,
    pub iode: u32,
    pub idot: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageSubframe {
    pub tow: u32,
    pub data_id: u32,
    pub page_sv_id: u32,
}

impl Subframe {
    pub fn decode(data: &[u8], sv: SV) -> Option<Subframe> {
        let id = getbitu(data, 49, 3);
        let tlm = getbitu(data, 8, 14);
        let _alert = getbitu(data, 47, 1);
        let _anti_spoof = getbitu(data, 48, 1);
        log::debug!("{sv}: tlm={tlm}");

        match id {
            1 => Some(Subframe::One(Subframe1::decode(data, sv))),
            2 => Some(Subframe::Two(Subframe2::decode(data, sv))),
            3 => Some(Subframe::Three(Subframe3::decode(data, sv))),
            4 => Some(Subframe::Four(PageSubframe::decode(data, sv, id))),
            5 => Some(Subframe::Five(PageSubframe::decode(data, sv, id))),
            _ => {
                log::warn!("{sv}: invalid subframe id={id}");
                None
            }
        }
    }

    pub fn id(&self) -> u32 {
        match self {
            Subframe::One(_) => 1,
            Subframe::Two(_) => 2,
            Subframe::Three(_) => 3,
            Subframe::Four(_) => 4,
            Subframe::Five(_) => 5,
        }
    }

    pub fn tow(&self) -> u32 {
        match self {
            Subframe::One(sf) => sf.tow,
            Subframe::Two(sf) => sf.tow,
            Subframe::Three(sf) => sf.tow,
            Subframe::Four(sf) | Subframe::Five(sf) => sf.tow,
        }
    }
}

impl Subframe1 {
    fn decode(buf: &[u8], sv: SV) -> Self {
        let sf = Self {
            tow: getbitu(buf, 30, 17) * 6,
            week: getbitu(buf, 60, 10) + 2048,
            code_on_l2: getbitu(buf, 70, 2),
            ura_index: getbitu(buf, 72, 4),
            sv_health: getbitu(buf, 76, 6),
            iodc: getbitu2(buf, 82, 2, 210, 8),
            tgd: getbits(buf, 196, 8) as f64 * P2_31,
            toc: getbitu(buf, 218, 16) * 16,
            af2: getbits(buf, 240, 8) as f64 * P2_55,
            af1: getbits(buf, 248, 16) as f64 * P2_43,
            af0: getbits(buf, 270, 22) as f64 * P2_31,
        };
        log::info!(
            "{sv}: {} tow={} week={} ura={} svh={} iodc={} tgd={:+e} toc={} af0={:+e} af1={:+e} af2={:+e}",
            "subframe-1".blue(),
            sf.tow,
            sf.week,
            sf.ura_index,
            sf.sv_health,
            sf.iodc,
            sf.tgd,
            sf.toc,
            sf.af0,
            sf.af1,
            sf.af2,
        );
        sf
    }
}

impl Subframe2 {
    fn decode(buf: &[u8], sv: SV) -> Self {
        let sf = Self {
            tow: getbitu(buf, 30, 17) * 6,
            iode: getbitu(buf, 60, 8),
            crs: getbits(buf, 68, 16) as f64 * P2_5,
            delta_n: getbits(buf, 90, 16) as f64 * P2_43,
            m0: getbits2(buf, 106, 8, 120, 24) as f64 * P2_31,
            cuc: getbits(buf, 150, 16) as f64 * P2_29,
            ecc: getbitu2(buf, 166, 8, 180, 24) as f64 * P2_33,
            cus: getbits(buf, 210, 16) as f64 * P2_29,
            sqrt_a: getbitu2(buf, 226, 8, 240, 24) as f64 * P2_19,
            toe: getbitu(buf, 270, 16) * 16,
            fit_interval: getbitu(buf, 286, 1),
        };
        log::info!(
            "{sv}: {} tow={} iode={} crs={} deln={:+e} m0={} cuc={:+e} ecc={} cus={:+e} sqrt_a={} toe={}",
            "subframe-2".blue(),
            sf.tow,
            sf.iode,
            sf.crs,
            sf.delta_n,
            sf.m0,
            sf.cuc,
            sf.ecc,
            sf.cus,
            sf.sqrt_a,
            sf.toe,
        );
        sf
    }
}

impl Subframe3 {
    fn decode(buf: &[u8], sv: SV) -> Self {
        let sf = Self {
            tow: getbitu(buf, 30, 17) * 6,
            cic: getbits(buf, 60, 16) as f64 * P2_29,
            omega0: getbits2(buf, 76, 8, 90, 24) as f64 * P2_31,
            cis: getbits(buf, 120, 16) as f64 * P2_29,
            i0: getbits2(buf, 136, 8, 150, 24) as f64 * P2_31,
            crc: getbits(buf, 180, 16) as f64 * P2_5,
            omega: getbits2(buf, 196, 8, 210, 24) as f64 * P2_31,
            omega_dot: getbits(buf, 240, 24) as f64 * P2_43,
            iode: getbitu(buf, 270, 8),
            idot: getbits(buf, 278, 14) as f64 * P2_43,
        };
        log::info!(
            "{sv}: {} tow={} cic={:+e} cis={:+e} omega={} omega0={} omega_dot={:+e} i0={} idot={:+e}",
            "subframe-3".blue(),
            sf.tow,
            sf.cic,
            sf.cis,
            sf.omega,
            sf.omega0,
            sf.omega_dot,
            sf.i0,
            sf.idot,
        );
        sf
    }
}

impl PageSubframe {
    fn decode(buf: &[u8], sv: SV, id: u32) -> Self {
        let sf = Self {
            tow: getbitu(buf, 30, 17) * 6,
            data_id: getbitu(buf, 60, 2),
            page_sv_id: getbitu(buf, 62, 6),
        };
        log::info!(
            "{sv}: subframe-{id} tow={} data_id={} svid={}",
            sf.tow,
            sf.data_id,
            sf.page_sv_id,
        );
        sf
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::pack_bits;
    use gnss_rs::constellation::Constellation;

    fn set_bits(frame: &mut [u8], pos: usize, len: usize, value: u64) {
        for i in 0..len {
            frame[pos + i] = ((value >> (len - 1 - i)) & 1) as u8;
        }
    }

    fn packed(frame: &[u8]) -> [u8; 38] {
        let mut data = [0u8; 38];
        pack_bits(frame, &mut data);
        data
    }

    fn sv() -> SV {
        SV::new(Constellation::GPS, 23)
    }

    #[test]
    fn subframe1_fields() {
        let mut frame = [0u8; 300];
        set_bits(&mut frame, 30, 17, 4321);
        set_bits(&mut frame, 49, 3, 1);
        set_bits(&mut frame, 60, 10, 221);
        set_bits(&mut frame, 72, 4, 3);
        set_bits(&mut frame, 76, 6, 0);
        set_bits(&mut frame, 82, 2, 0b10);
        set_bits(&mut frame, 210, 8, 0x5A);
        set_bits(&mut frame, 196, 8, 0xFE); // -2 once sign extended
        set_bits(&mut frame, 218, 16, 1000);

        let sf = match Subframe::decode(&packed(&frame), sv()).unwrap() {
            Subframe::One(sf) => sf,
            _ => panic!("expected subframe 1"),
        };
        assert_eq!(sf.tow, 4321 * 6);
        assert_eq!(sf.week, 221 + 2048);
        assert_eq!(sf.ura_index, 3);
        assert_eq!(sf.iodc, (0b10 << 8) | 0x5A);
        assert!((sf.tgd - (-2.0 * P2_31)).abs() < 1e-18);
        assert_eq!(sf.toc, 16000);
    }

    #[test]
    fn subframe2_fields() {
        let mut frame = [0u8; 300];
        set_bits(&mut frame, 30, 17, 1);
        set_bits(&mut frame, 49, 3, 2);
        set_bits(&mut frame, 60, 8, 17);
        // sqrt(a) for a typical GPS orbit, ~5153.6 m^1/2
        let sqrt_a_raw: u64 = 2_701_970_637;
        set_bits(&mut frame, 226, 8, sqrt_a_raw >> 24);
        set_bits(&mut frame, 240, 24, sqrt_a_raw & 0xFF_FFFF);
        let ecc_raw: u64 = 85_899_346; // ~0.01
        set_bits(&mut frame, 166, 8, ecc_raw >> 24);
        set_bits(&mut frame, 180, 24, ecc_raw & 0xFF_FFFF);
        set_bits(&mut frame, 270, 16, 37800 / 16);

        let sf = match Subframe::decode(&packed(&frame), sv()).unwrap() {
            Subframe::Two(sf) => sf,
            _ => panic!("expected subframe 2"),
        };
        assert_eq!(sf.iode, 17);
        assert!((sf.sqrt_a - sqrt_a_raw as f64 * P2_19).abs() < 1e-9);
        assert!((sf.sqrt_a - 5153.6).abs() < 0.1);
        assert!((sf.ecc - 0.01).abs() < 1e-4);
        assert_eq!(sf.toe, 37800 / 16 * 16);
    }

    #[test]
    fn subframe3_signed_fields() {
        let mut frame = [0u8; 300];
        set_bits(&mut frame, 49, 3, 3);
        // omega0 = -0.25 semi-circles: -0.25 / 2^-31 as a 32-bit two's complement
        let omega0_raw = (-536_870_912i64) as u64 & 0xFFFF_FFFF;
        set_bits(&mut frame, 76, 8, omega0_raw >> 24);
        set_bits(&mut frame, 90, 24, omega0_raw & 0xFF_FFFF);
        // i0 = +0.3 semi-circles
        let i0_raw = (0.3 / P2_31) as u64;
        set_bits(&mut frame, 136, 8, i0_raw >> 24);
        set_bits(&mut frame, 150, 24, i0_raw & 0xFF_FFFF);

        let sf = match Subframe::decode(&packed(&frame), sv()).unwrap() {
            Subframe::Three(sf) => sf,
            _ => panic!("expected subframe 3"),
        };
        assert!((sf.omega0 - (-0.25)).abs() < 1e-9);
        assert!((sf.i0 - 0.3).abs() < 1e-9);
    }

    #[test]
    fn invalid_subframe_id_rejected() {
        let mut frame = [0u8; 300];
        set_bits(&mut frame, 49, 3, 7);
        assert!(Subframe::decode(&packed(&frame), sv()).is_none());
        set_bits(&mut frame, 49, 3, 0);
        assert!(Subframe::decode(&packed(&frame), sv()).is_none());
    }
}
