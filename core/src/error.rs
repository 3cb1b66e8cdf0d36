use std::fmt;
use std::path::PathBuf;

use crate::image_source::Pixel;

/// Coarse classification of a [`HarnessError`], used to pick an exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Preflight,
    ContentMismatch,
    FramingViolation,
    Timeout,
}

impl FailureKind {
    pub const SUCCESS_CODE: u8 = 0;

    pub fn exit_code(self) -> u8 {
        match self {
            FailureKind::Preflight => 1,
            FailureKind::ContentMismatch => 2,
            FailureKind::FramingViolation => 3,
            FailureKind::Timeout => 4,
        }
    }
}

/// Which boundary flag of the reconstructed stream disagreed with the oracle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundaryFlag {
    RowLast,
    FrameLast,
}

impl fmt::Display for BoundaryFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BoundaryFlag::RowLast => f.write_str("row-last"),
            BoundaryFlag::FrameLast => f.write_str("frame-last"),
        }
    }
}

/// A reconstructed pixel that differs from the oracle image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentMismatch {
    pub x: u32,
    pub y: u32,
    pub expected: Pixel,
    pub actual: Pixel,
    /// The oracle pixels following `(x, y)` in raster order.
    pub following: Vec<Pixel>,
}

impl fmt::Display for ContentMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "pixel[{:3},{:3}] expected {} != {} (pixel out)",
            self.x, self.y, self.expected, self.actual
        )?;
        if !self.following.is_empty() {
            f.write_str("\n... ")?;
            for (i, px) in self.following.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{px}")?;
            }
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum HarnessError {
    #[error("could not open '{}': {source}", path.display())]
    ImageOpen {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("'{}' does not appear to be an image file", path.display())]
    NotAnImage { path: PathBuf },
    #[error("image decode failed: {0}")]
    ImageDecode(#[from] image::ImageError),
    #[error("image is {width}x{height}, both dimensions must be at least {min}", min = crate::image_source::MIN_DIMENSION)]
    ImageTooSmall { width: u32, height: u32 },
    #[error("pixel[{x},{y}] has alpha {alpha:#04x}, only fully opaque images are supported")]
    TranslucentPixel { x: u32, y: u32, alpha: u8 },
    #[error("could not open output '{}': {source}", path.display())]
    Output {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("waveform trace write failed: {0}")]
    Trace(#[source] std::io::Error),
    #[error("byte stream write failed: {0}")]
    Capture(#[source] std::io::Error),
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("{0}")]
    ContentMismatch(Box<ContentMismatch>),
    #[error("{flag} flag mismatch at pixel[{x},{y}]: expected {expected}, got {actual}")]
    FramingViolation {
        x: u32,
        y: u32,
        flag: BoundaryFlag,
        expected: bool,
        actual: bool,
    },
    #[error("picture not produced after {cycles} cycles (budget {budget})")]
    Timeout { cycles: u64, budget: u64 },
}

impl HarnessError {
    pub fn kind(&self) -> FailureKind {
        match self {
            HarnessError::ContentMismatch(_) => FailureKind::ContentMismatch,
            HarnessError::FramingViolation { .. } => FailureKind::FramingViolation,
            HarnessError::Timeout { .. } => FailureKind::Timeout,
            _ => FailureKind::Preflight,
        }
    }

    pub fn exit_code(&self) -> u8 {
        self.kind().exit_code()
    }
}

impl From<ContentMismatch> for HarnessError {
    fn from(mismatch: ContentMismatch) -> Self {
        HarnessError::ContentMismatch(Box::new(mismatch))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_failures_have_distinct_exit_codes() {
        let codes = [
            FailureKind::Preflight.exit_code(),
            FailureKind::ContentMismatch.exit_code(),
            FailureKind::FramingViolation.exit_code(),
            FailureKind::Timeout.exit_code(),
        ];
        for (i, a) in codes.iter().enumerate() {
            assert_ne!(*a, FailureKind::SUCCESS_CODE);
            for b in &codes[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn mismatch_message_names_coordinate_and_context() {
        let err: HarnessError = ContentMismatch {
            x: 2,
            y: 1,
            expected: Pixel::new(0x123456),
            actual: Pixel::new(0x654321),
            following: vec![Pixel::new(0xaaaaaa), Pixel::new(0xbbbbbb)],
        }
        .into();
        let msg = err.to_string();
        assert!(msg.contains("pixel[  2,  1]"), "{msg}");
        assert!(msg.contains("123456"), "{msg}");
        assert!(msg.contains("654321"), "{msg}");
        assert!(msg.contains("aaaaaa, bbbbbb"), "{msg}");
        assert_eq!(err.kind(), FailureKind::ContentMismatch);
    }

    #[test]
    fn timeout_reports_cycles_and_budget() {
        let err = HarnessError::Timeout { cycles: 250, budget: 250 };
        assert_eq!(err.to_string(), "picture not produced after 250 cycles (budget 250)");
        assert_eq!(err.exit_code(), 4);
    }
}
