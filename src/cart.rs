use crate::error::ParseError;
use crate::memory::CartSnapshot;
use std::path::{Path, PathBuf};

/// where a cart comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CartSource {
    Path(PathBuf),
    Buffer(Vec<u8>),
}

impl CartSource {
    pub fn path(&self) -> Option<&Path> {
        match self {
            CartSource::Path(p) => Some(p),
            CartSource::Buffer(_) => None,
        }
    }

    /// name for log lines and error reports
    pub fn describe(&self) -> String {
        match self {
            CartSource::Path(p) => p.display().to_string(),
            CartSource::Buffer(b) => format!("<buffer of {} bytes>", b.len()),
        }
    }
}

/// what the container parser hands back
#[derive(Debug, Clone)]
pub struct ParsedCart {
    pub snapshot: CartSnapshot,
    /// None when the container held no script
    pub script: Option<String>,
}

/// decodes a cart container into a memory image and script text
pub trait CartParser {
    fn parse(&self, source: &CartSource) -> Result<ParsedCart, ParseError>;
}

/// How well a cart is expected to run. `Full`, `Partial` and `Unsupported`
/// are the checker's Ok, Some and None classifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Compatibility {
    Full,
    Partial,
    Unsupported,
}

/// classifies a cart against this runtime before it first runs
pub trait CompatibilityChecker {
    fn check(&self, path: Option<&Path>, script: &str) -> Compatibility;
}
