pub mod identity;
pub mod qoi;

pub use identity::IdentityCore;
pub use qoi::QoiCore;

use std::fmt;
use std::str::FromStr;

use crate::ports::{Clocked, CodecCore};

/// Selects one of the built-in codec models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CodecModel {
    #[default]
    Qoi,
    Identity,
}

impl CodecModel {
    pub fn build(self, width: u32, height: u32) -> Box<dyn CodecCore> {
        match self {
            CodecModel::Qoi => Box::new(Clocked::new(QoiCore::new(width, height))),
            CodecModel::Identity => Box::new(Clocked::new(IdentityCore::default())),
        }
    }
}

impl fmt::Display for CodecModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CodecModel::Qoi => f.write_str("qoi"),
            CodecModel::Identity => f.write_str("identity"),
        }
    }
}

impl FromStr for CodecModel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "qoi" => Ok(CodecModel::Qoi),
            "identity" => Ok(CodecModel::Identity),
            other => Err(format!("unknown codec model '{other}' (expected qoi or identity)")),
        }
    }
}
