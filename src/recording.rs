use bytesize::ByteSize;
use colored::Colorize;
use rustfft::num_complex::Complex64;
use std::error::Error;
use std::fmt;
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::Path;
use std::str::FromStr;

use crate::constants::SAMPLE_RATE;

/// Antenna front-end abstraction: file playback or live SDR.
pub trait SampleSource {
    fn cursor(&self) -> usize;
    fn get_samples(&mut self, num_samples: usize) -> Result<Vec<Complex64>, Box<dyn Error>>;
    fn seconds_since_start(&self, sample_index: usize) -> f64 {
        sample_index as f64 / SAMPLE_RATE
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SampleFormat {
    F32Pair,
    I16Pair,
    I8Mono,
    RtlSdrU8,
}

// (format, CLI token, bytes per complex sample)
static SAMPLE_FORMATS: [(SampleFormat, &str, usize); 4] = [
    (SampleFormat::F32Pair, "f32", 8),
    (SampleFormat::I16Pair, "i16", 4),
    (SampleFormat::I8Mono, "i8", 1),
    (SampleFormat::RtlSdrU8, "rtlsdr", 2),
];

impl SampleFormat {
    fn descriptor(self) -> &'static (SampleFormat, &'static str, usize) {
        SAMPLE_FORMATS
            .iter()
            .find(|(format, _, _)| *format == self)
            .unwrap()
    }

    pub fn bytes_per_sample(self) -> usize {
        self.descriptor().2
    }
}

impl FromStr for SampleFormat {
    type Err = Box<dyn Error>;
    fn from_str(input: &str) -> Result<SampleFormat, Self::Err> {
        SAMPLE_FORMATS
            .iter()
            .find(|(_, token, _)| *token == input)
            .map(|&(format, _, _)| format)
            .ok_or_else(|| format!("unknown IQ sample format '{input}'").into())
    }
}

impl fmt::Display for SampleFormat {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.descriptor().1)
    }
}

pub struct IQRecording {
    reader: BufReader<File>,
    format: SampleFormat,
    cursor: usize,
}

impl IQRecording {
    pub fn new(
        file_path: &Path,
        format: SampleFormat,
        off_samples: usize,
    ) -> Result<Self, Box<dyn Error>> {
        let file_size = file_path.metadata()?.len();
        let sample_size = format.bytes_per_sample();
        let recording_duration_sec = file_size as f64 / SAMPLE_RATE / sample_size as f64;

        println!(
            "file: {} -- {format} {} duration: {:.1} secs",
            file_path.display().to_string().green(),
            ByteSize::b(file_size).display().iec().to_string().bold(),
            recording_duration_sec
        );

        let mut file = File::open(file_path)?;
        file.seek(SeekFrom::Start((off_samples * sample_size) as u64))?;

        Ok(Self {
            reader: BufReader::new(file),
            format,
            cursor: 0,
        })
    }
}

impl SampleSource for IQRecording {
    fn cursor(&self) -> usize {
        self.cursor
    }

    fn get_samples(&mut self, num_samples: usize) -> Result<Vec<Complex64>, Box<dyn Error>> {
        let mut buf = vec![0u8; num_samples * self.format.bytes_per_sample()];
        self.reader.read_exact(&mut buf)?;

        let mut iq_vec = Vec::with_capacity(num_samples);
        match self.format {
            SampleFormat::RtlSdrU8 => {
                for off in (0..buf.len()).step_by(2) {
                    iq_vec.push(Complex64 {
                        re: (buf[off] as f64 - 127.0) / 128.0,
                        im: (buf[off + 1] as f64 - 127.0) / 128.0,
                    });
                }
            }
            SampleFormat::I8Mono => {
                for &b in &buf {
                    iq_vec.push(Complex64 {
                        re: b as i8 as f64 / i8::MAX as f64,
                        im: 0.0,
                    });
                }
            }
            SampleFormat::I16Pair => {
                for off in (0..buf.len()).step_by(4) {
                    let i = i16::from_le_bytes([buf[off], buf[off + 1]]);
                    let q = i16::from_le_bytes([buf[off + 2], buf[off + 3]]);
                    iq_vec.push(Complex64 {
                        re: i as f64 / i16::MAX as f64,
                        im: q as f64 / i16::MAX as f64,
                    });
                }
            }
            SampleFormat::F32Pair => {
                for off in (0..buf.len()).step_by(8) {
                    let i = f32::from_le_bytes([buf[off], buf[off + 1], buf[off + 2], buf[off + 3]]);
                    let q = f32::from_le_bytes([
                        buf[off + 4],
                        buf[off + 5],
                        buf[off + 6],
                        buf[off + 7],
                    ]);
                    iq_vec.push(Complex64 {
                        re: i as f64,
                        im: q as f64,
                    });
                }
            }
        }

        self.cursor += num_samples;
        Ok(iq_vec)
    }
}
