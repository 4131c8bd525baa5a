//! Sample format tags carried by frames

use std::fmt;

/// Layout tag describing how a frame's planes are to be interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SampleFormat {
    /// Unspecified
    #[default]
    None,
    /// Planar YUV 4:2:0, three planes
    Yuv420p,
    /// Planar YUV 4:2:2, three planes
    Yuv422p,
    /// Packed RGB 8:8:8, one plane
    Rgb24,
    /// Interleaved signed 16-bit PCM, one plane
    S16,
    /// Planar 32-bit float PCM, one plane per channel
    F32p,
    /// Opaque byte payload (compressed elementary stream, muxed packet)
    Bytes,
}

impl SampleFormat {
    /// Short lowercase name
    pub fn as_str(&self) -> &'static str {
        match self {
            SampleFormat::None => "none",
            SampleFormat::Yuv420p => "yuv420p",
            SampleFormat::Yuv422p => "yuv422p",
            SampleFormat::Rgb24 => "rgb24",
            SampleFormat::S16 => "s16",
            SampleFormat::F32p => "f32p",
            SampleFormat::Bytes => "bytes",
        }
    }

    /// Parse a short name as produced by [`SampleFormat::as_str`]
    pub fn from_name(name: &str) -> Option<Self> {
        let fmt = match name {
            "none" => SampleFormat::None,
            "yuv420p" => SampleFormat::Yuv420p,
            "yuv422p" => SampleFormat::Yuv422p,
            "rgb24" => SampleFormat::Rgb24,
            "s16" => SampleFormat::S16,
            "f32p" => SampleFormat::F32p,
            "bytes" => SampleFormat::Bytes,
            _ => return None,
        };
        Some(fmt)
    }

    /// Whether the format is a video pixel format
    pub fn is_video(&self) -> bool {
        matches!(
            self,
            SampleFormat::Yuv420p | SampleFormat::Yuv422p | SampleFormat::Rgb24
        )
    }
}

impl fmt::Display for SampleFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
