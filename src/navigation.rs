use colored::Colorize;
use gnss_rs::sv::SV;

use crate::constants::{BITS_PER_SUBFRAME, WORDS_PER_SUBFRAME};
use crate::ephemeris::Subframe;
use crate::util::{hex_str, pack_bits, xor_bits};

pub const PREAMBLE: [u8; 8] = [1, 0, 0, 0, 1, 0, 1, 1];

// Parity masks over (D29*, D30*, d1..d24), IS-GPS-200 table 20-XIV.
pub const PARITY_MASK: [u32; 6] = [
    0x2EC7CD2, 0x1763E69, 0x2BB1F34, 0x15D8F9A, 0x1AEC7CD, 0x22DEA27,
];

enum DecoderState {
    SearchPreamble,
    CollectFrame { start: usize, reversed: bool },
}

/// Turns the 50 Hz bit stream into parity-checked subframes. Bits arriving
/// while a candidate frame is open keep accumulating; a parity failure
/// re-anchors the search one bit past the false preamble.
pub struct SubframeDecoder {
    sv: SV,
    bits: Vec<u8>,
    state: DecoderState,
    pub count_ok: usize,
    pub count_err: usize,
}

impl SubframeDecoder {
    pub fn new(sv: SV) -> Self {
        Self {
            sv,
            bits: Vec::new(),
            state: DecoderState::SearchPreamble,
            count_ok: 0,
            count_err: 0,
        }
    }

    pub fn process_bit(&mut self, bit: u8) -> Option<Subframe> {
        self.bits.push(bit & 1);
        loop {
            match self.state {
                DecoderState::SearchPreamble => {
                    let len = self.bits.len();
                    if len < PREAMBLE.len() {
                        return None;
                    }
                    match self.polarity_at(len - PREAMBLE.len()) {
                        Some(reversed) => {
                            log::debug!(
                                "{}: frame sync, polarity {}",
                                self.sv,
                                if reversed { "reversed" } else { "normal" }
                            );
                            self.state = DecoderState::CollectFrame {
                                start: len - PREAMBLE.len(),
                                reversed,
                            };
                        }
                        None => {
                            self.bits.drain(..len - PREAMBLE.len());
                            return None;
                        }
                    }
                }
                DecoderState::CollectFrame { start, reversed } => {
                    if self.bits.len() < start + BITS_PER_SUBFRAME {
                        return None;
                    }
                    if let Some(subframe) = self.decode_frame(start, reversed) {
                        self.bits.drain(..start + BITS_PER_SUBFRAME);
                        self.state = DecoderState::SearchPreamble;
                        return Some(subframe);
                    }
                    // False preamble: drop the bad anchor and rescan what we kept.
                    self.bits.drain(..start + 1);
                    self.state = self.find_anchor();
                }
            }
        }
    }

    fn polarity_at(&self, pos: usize) -> Option<bool> {
        let window = &self.bits[pos..pos + PREAMBLE.len()];
        if *window == PREAMBLE {
            Some(false)
        } else if window.iter().zip(&PREAMBLE).all(|(&b, &p)| b == (p ^ 1)) {
            Some(true)
        } else {
            None
        }
    }

    fn find_anchor(&self) -> DecoderState {
        if self.bits.len() >= PREAMBLE.len() {
            for pos in 0..=self.bits.len() - PREAMBLE.len() {
                if let Some(reversed) = self.polarity_at(pos) {
                    return DecoderState::CollectFrame {
                        start: pos,
                        reversed,
                    };
                }
            }
        }
        DecoderState::SearchPreamble
    }

    fn decode_frame(&mut self, start: usize, reversed: bool) -> Option<Subframe> {
        let mut frame = [0u8; BITS_PER_SUBFRAME];
        frame.copy_from_slice(&self.bits[start..start + BITS_PER_SUBFRAME]);
        if reversed {
            frame.iter_mut().for_each(|b| *b ^= 1);
        }

        if !Self::parity_ok(&frame) {
            self.count_err += 1;
            log::warn!("{}: {}", self.sv, "PARITY ERROR".red());
            return None;
        }
        self.count_ok += 1;

        Self::deinvert_data_bits(&mut frame);
        let mut data = [0u8; BITS_PER_SUBFRAME.div_ceil(8)];
        pack_bits(&frame, &mut data);

        let subframe = Subframe::decode(&data, self.sv);
        if let Some(sf) = &subframe {
            log::info!(
                "{}: {} id={} -- {}",
                self.sv,
                "PARITY OK".green(),
                sf.id(),
                hex_str(&data, BITS_PER_SUBFRAME)
            );
        }
        subframe
    }

    // Rolling 32-bit register: two trailing parity bits of the previous word,
    // then the 30 bits of the current one. D29*/D30* are zero entering a
    // subframe because words 2 and 10 force them so.
    fn parity_ok(frame: &[u8]) -> bool {
        assert_eq!(frame.len(), BITS_PER_SUBFRAME);
        let mut reg: u32 = 0;
        for word in 0..WORDS_PER_SUBFRAME {
            for bit in 0..30 {
                reg = (reg << 1) | frame[word * 30 + bit] as u32;
            }
            if reg & (1 << 30) != 0 {
                reg ^= 0x3FFF_FFC0;
            }
            for (j, mask) in PARITY_MASK.iter().enumerate() {
                let v0 = (reg >> 6) & mask;
                let v1 = ((reg >> (5 - j)) & 1) as u8;
                if xor_bits(v0) != v1 {
                    return false;
                }
            }
        }
        true
    }

    // A word's 24 data bits are transmitted inverted when the previous word's
    // D30 is set; undo that before field extraction.
    fn deinvert_data_bits(frame: &mut [u8]) {
        let mut d30_star = 0u8;
        for word in 0..WORDS_PER_SUBFRAME {
            let base = word * 30;
            if d30_star == 1 {
                frame[base..base + 24].iter_mut().for_each(|b| *b ^= 1);
            }
            d30_star = frame[base + 29];
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ephemeris::Subframe;
    use gnss_rs::constellation::Constellation;

    fn sv() -> SV {
        SV::new(Constellation::GPS, 11)
    }

    // -- test-side LNAV encoder, sharing the decoder's parity masks --

    fn set_bits(frame: &mut [u8], pos: usize, len: usize, value: u32) {
        for i in 0..len {
            frame[pos + i] = ((value >> (len - 1 - i)) & 1) as u8;
        }
    }

    fn word_bits(frame: &[u8], word: usize) -> u32 {
        frame[word * 30..word * 30 + 24]
            .iter()
            .fold(0, |acc, &b| (acc << 1) | b as u32)
    }

    fn parity_of(d24: u32, d29s: u8, d30s: u8) -> [u8; 6] {
        let src = ((d29s as u32) << 25) | ((d30s as u32) << 24) | d24;
        let mut parity = [0u8; 6];
        for (j, mask) in PARITY_MASK.iter().enumerate() {
            parity[j] = xor_bits(src & mask);
        }
        parity
    }

    // Encode the parity tails in place, inverting data bits as transmitted.
    // Words 2 and 10 get their spare bits solved so D29/D30 end up zero.
    fn encode_parity(frame: &mut [u8; 300]) {
        let mut d29s = 0u8;
        let mut d30s = 0u8;
        for word in 0..10 {
            let base = word * 30;
            if word == 1 || word == 9 {
                for t in 0..4u32 {
                    set_bits(frame, base + 22, 2, t);
                    let parity = parity_of(word_bits(frame, word), d29s, d30s);
                    if parity[4] == 0 && parity[5] == 0 {
                        break;
                    }
                }
            }
            let d24 = word_bits(frame, word);
            let parity = parity_of(d24, d29s, d30s);
            let transmitted = if d30s == 1 { d24 ^ 0xFF_FFFF } else { d24 };
            set_bits(frame, base, 24, transmitted);
            for j in 0..6 {
                frame[base + 24 + j] = parity[j];
            }
            d29s = parity[4];
            d30s = parity[5];
        }
    }

    fn build_subframe(id: u32, tow: u32) -> [u8; 300] {
        let mut frame = [0u8; 300];
        for (i, &b) in PREAMBLE.iter().enumerate() {
            frame[i] = b;
        }
        set_bits(&mut frame, 8, 14, 0x1A5); // telemetry message
        set_bits(&mut frame, 30, 17, tow);
        set_bits(&mut frame, 49, 3, id);
        frame
    }

    fn decode_stream(decoder: &mut SubframeDecoder, bits: &[u8]) -> Vec<Subframe> {
        bits.iter()
            .filter_map(|&b| decoder.process_bit(b))
            .collect()
    }

    #[test]
    fn decodes_a_clean_subframe() {
        let mut frame = build_subframe(4, 1000);
        encode_parity(&mut frame);

        let mut decoder = SubframeDecoder::new(sv());
        let mut stream = vec![0u8; 12]; // quiet lead-in
        stream.extend_from_slice(&frame);
        let subframes = decode_stream(&mut decoder, &stream);
        assert_eq!(subframes.len(), 1);
        match subframes[0] {
            Subframe::Four(page) => assert_eq!(page.tow, 1000 * 6),
            _ => panic!("wrong subframe id"),
        }
        assert_eq!(decoder.count_ok, 1);
        assert_eq!(decoder.count_err, 0);
    }

    #[test]
    fn decodes_inverted_polarity() {
        let mut frame = build_subframe(5, 2345);
        encode_parity(&mut frame);

        let mut decoder = SubframeDecoder::new(sv());
        let mut stream = vec![1u8; 12];
        stream.extend(frame.iter().map(|&b| b ^ 1));
        let subframes = decode_stream(&mut decoder, &stream);
        assert_eq!(subframes.len(), 1);
        match subframes[0] {
            Subframe::Five(page) => assert_eq!(page.tow, 2345 * 6),
            _ => panic!("wrong subframe id"),
        }
    }

    #[test]
    fn parity_failure_discards_frame() {
        let mut frame = build_subframe(4, 1000);
        encode_parity(&mut frame);
        frame[100] ^= 1;

        let mut decoder = SubframeDecoder::new(sv());
        assert!(decode_stream(&mut decoder, &frame).is_empty());
        assert_eq!(decoder.count_ok, 0);
        assert_eq!(decoder.count_err, 1);
    }

    #[test]
    fn false_preamble_then_real_frame() {
        let mut frame = build_subframe(4, 7);
        encode_parity(&mut frame);

        // preamble-shaped garbage that cannot pass parity
        let mut stream = PREAMBLE.to_vec();
        stream.extend_from_slice(&[1u8; 292]);
        stream.extend_from_slice(&frame);
        let mut decoder = SubframeDecoder::new(sv());
        let subframes = decode_stream(&mut decoder, &stream);
        assert_eq!(subframes.len(), 1);
        assert_eq!(decoder.count_err, 1);
        assert_eq!(decoder.count_ok, 1);
    }

    #[test]
    fn consecutive_subframes_re_anchor() {
        let mut decoder = SubframeDecoder::new(sv());
        let mut stream = vec![];
        for id in [1u32, 2, 3] {
            let mut frame = build_subframe(id, 100 + id);
            encode_parity(&mut frame);
            stream.extend_from_slice(&frame);
        }
        let subframes = decode_stream(&mut decoder, &stream);
        assert_eq!(subframes.len(), 3);
        assert_eq!(
            subframes.iter().map(|s| s.id()).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
    }
}
