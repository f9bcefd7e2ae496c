//! Audio helpers shared by the capture and synthesis adapters.
//!
//! The telephony side speaks narrowband audio (G.711 μ-law or linear 16-bit
//! at 8 kHz); the HTTP speech services speak linear PCM at their own rates.
//! Everything in here converts between the two worlds.

pub mod g711;
pub mod resample;
pub mod wav;

use serde::{Deserialize, Serialize};

pub use g711::{linear_to_ulaw, ulaw_to_linear};
pub use resample::resample;

/// Sample encoding negotiated for a media stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AudioEncoding {
    /// G.711 μ-law, one byte per sample
    #[serde(rename = "PCMU")]
    Pcmu,
    /// Linear 16-bit little-endian PCM
    #[serde(rename = "L16")]
    L16,
}

impl AudioEncoding {
    /// Decode wire bytes into linear samples
    pub fn decode(&self, data: &[u8]) -> Vec<i16> {
        match self {
            AudioEncoding::Pcmu => data.iter().map(|b| ulaw_to_linear(*b)).collect(),
            AudioEncoding::L16 => pcm16_from_le_bytes(data),
        }
    }

    /// Encode linear samples into wire bytes
    pub fn encode(&self, samples: &[i16]) -> Vec<u8> {
        match self {
            AudioEncoding::Pcmu => samples.iter().map(|s| linear_to_ulaw(*s)).collect(),
            AudioEncoding::L16 => pcm16_to_le_bytes(samples),
        }
    }

    /// Bytes per sample on the wire
    pub fn bytes_per_sample(&self) -> usize {
        match self {
            AudioEncoding::Pcmu => 1,
            AudioEncoding::L16 => 2,
        }
    }
}

impl std::fmt::Display for AudioEncoding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AudioEncoding::Pcmu => write!(f, "PCMU"),
            AudioEncoding::L16 => write!(f, "L16"),
        }
    }
}

/// Interpret little-endian byte pairs as 16-bit samples.
///
/// A trailing odd byte is ignored.
pub fn pcm16_from_le_bytes(data: &[u8]) -> Vec<i16> {
    data.chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect()
}

pub fn pcm16_to_le_bytes(samples: &[i16]) -> Vec<u8> {
    let mut out = Vec::with_capacity(samples.len() * 2);
    for sample in samples {
        out.extend_from_slice(&sample.to_le_bytes());
    }
    out
}

/// Root-mean-square level of a block of samples, normalized to 0.0..=1.0
pub fn rms(samples: &[i16]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum: f64 = samples
        .iter()
        .map(|s| {
            let v = *s as f64 / 32768.0;
            v * v
        })
        .sum();
    (sum / samples.len() as f64).sqrt() as f32
}
