//! Audio helpers: transcoding and upload sniffing.

mod converter;

pub use converter::{AudioTranscoder, ConversionError, FfmpegTranscoder};

/// File extension for an uploaded audio buffer, if it is audio at all.
pub fn sniff_audio_extension(bytes: &[u8]) -> Option<&'static str> {
    infer::get(bytes)
        .filter(|kind| kind.matcher_type() == infer::MatcherType::Audio)
        .map(|kind| kind.extension())
}
