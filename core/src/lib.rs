#![forbid(unsafe_code)]

//! Streaming conformance harness for a pixel codec core.
//!
//! A reference image is pushed through the codec's input port under a
//! valid/ready handshake while the compressed byte bursts are captured to a
//! file and the reconstructed pixel stream is checked against the image,
//! pixel for pixel, including its row and frame boundary flags.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::image_source::{Frame, ImageSource};
use crate::model::CodecModel;
use crate::testbench::{RunSummary, Testbench, TestbenchOptions};
use crate::trace::VcdTrace;

pub mod checker;
pub mod error;
pub mod image_source;
pub mod log_buffer;
pub mod model;
pub mod ports;
pub mod raster;
pub mod sink;
pub mod stimulus;
pub mod testbench;
pub mod trace;

pub use error::{FailureKind, HarnessError};

pub const DEFAULT_EXTENSION: &str = "qoi";
pub const DEFAULT_TRACE_FILE: &str = "trace.vcd";

/// Where the captured byte stream for `image` is written: a sibling file with
/// the same stem and `extension`.
pub fn output_path_for(image: &Path, extension: &str) -> PathBuf {
    image.with_extension(extension)
}

/// One verification run of an image file against a built-in codec model.
#[derive(Debug, Clone)]
pub struct Verification {
    pub image: PathBuf,
    pub output: PathBuf,
    pub trace: Option<PathBuf>,
    pub model: CodecModel,
    pub options: TestbenchOptions,
}

impl Verification {
    pub fn new(image: impl Into<PathBuf>) -> Self {
        let image = image.into();
        Self {
            output: output_path_for(&image, DEFAULT_EXTENSION),
            image,
            trace: Some(PathBuf::from(DEFAULT_TRACE_FILE)),
            model: CodecModel::default(),
            options: TestbenchOptions::default(),
        }
    }

    /// Loads and validates the image, opens every output file, then replays
    /// the frame. All pre-flight failures surface before the first cycle.
    pub fn run(&self) -> Result<RunSummary, HarnessError> {
        self.options.validate()?;
        let frame = Frame::open(&self.image)?;
        log::info!("Image size: {:4} x {:4}", frame.width(), frame.height());

        let capture = create(&self.output)?;
        let trace = match &self.trace {
            Some(path) => {
                let out: Box<dyn Write> = Box::new(create(path)?);
                Some(VcdTrace::new(out).map_err(HarnessError::Trace)?)
            }
            None => None,
        };

        let core = self.model.build(frame.width(), frame.height());
        let mut bench = Testbench::new(core, frame, capture, self.options.clone());
        if let Some(trace) = trace {
            bench = bench.with_trace(trace);
        }
        let summary = bench.run()?;
        if let (_, Some(mut capture)) = bench.into_parts() {
            capture.flush().map_err(HarnessError::Capture)?;
        }
        Ok(summary)
    }
}

fn create(path: &Path) -> Result<BufWriter<File>, HarnessError> {
    File::create(path)
        .map(BufWriter::new)
        .map_err(|source| HarnessError::Output {
            path: path.to_path_buf(),
            source,
        })
}
