//! Audio fixtures for end-to-end tests

use super::constants::MOCK_SAMPLE_RATE;
use std::io::Cursor;
use std::path::Path;

fn wav_spec() -> hound::WavSpec {
    hound::WavSpec {
        channels: 1,
        sample_rate: MOCK_SAMPLE_RATE,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    }
}

/// An in-memory mono WAV of a 440 Hz tone.
pub fn wav_bytes(seconds: f64) -> Vec<u8> {
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer =
            hound::WavWriter::new(&mut cursor, wav_spec()).expect("Failed to create WAV writer");
        let samples = (seconds * MOCK_SAMPLE_RATE as f64) as u32;
        for i in 0..samples {
            let t = i as f64 / MOCK_SAMPLE_RATE as f64;
            let sample = (t * 440.0 * 2.0 * std::f64::consts::PI).sin() * i16::MAX as f64 * 0.3;
            writer
                .write_sample(sample as i16)
                .expect("Failed to write sample");
        }
        writer.finalize().expect("Failed to finalize WAV");
    }
    cursor.into_inner()
}

pub fn write_wav(path: &Path, seconds: f64) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, wav_bytes(seconds))
}
