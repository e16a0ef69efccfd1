//! Error types for manifest augmentation.
//!
//! Every variant carries enough context (representation id, segment index,
//! file path) to diagnose a failed run from the message alone.

use std::path::PathBuf;
use thiserror::Error;

use crate::mpd::template::TemplateError;

pub type Result<T> = std::result::Result<T, ManifestError>;

#[derive(Error, Debug)]
pub enum ManifestError {
    /// Options rejected before any processing started
    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    #[error("Failed to read manifest {path}")]
    ManifestRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Input is not well-formed XML
    #[error("Malformed manifest {path} near byte {position}: {reason}")]
    ManifestParse {
        path: PathBuf,
        position: u64,
        reason: String,
    },

    #[error("Could not find an AdaptationSet under any Period")]
    AdaptationSetNotFound,

    #[error("AdaptationSet has no SegmentTemplate to derive segment paths from")]
    SegmentTemplateMissing,

    #[error("<{element}> is missing required attribute '{attribute}'")]
    MissingAttribute { element: String, attribute: String },

    #[error("<{element}> has invalid {attribute}=\"{value}\": {reason}")]
    InvalidAttribute {
        element: String,
        attribute: String,
        value: String,
        reason: String,
    },

    #[error(transparent)]
    Template(#[from] TemplateError),

    /// The glob matched nothing, or the index range starting at startNumber is empty
    #[error("No segments found for representation {representation_id} (pattern {pattern}, {segment_count} matching files, startNumber {start_number})")]
    NoSegmentsFound {
        representation_id: String,
        pattern: String,
        segment_count: u64,
        start_number: u64,
    },

    #[error("Failed to scan segments of representation {representation_id} under {path}")]
    SegmentScan {
        representation_id: String,
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("Segment {index} of representation {representation_id} not found at {path}")]
    SegmentFileNotFound {
        representation_id: String,
        index: u64,
        path: PathBuf,
    },

    #[error("Failed to query size of segment {index} of representation {representation_id} at {path}")]
    SegmentIo {
        representation_id: String,
        index: u64,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Every segment is empty, so the ratio would be undefined
    #[error("Representation {representation_id} has an average chunk size of zero")]
    DegenerateRatio { representation_id: String },

    #[error("Failed to serialize manifest: {reason}")]
    Serialize { reason: String },

    #[error("Failed to write manifest {path}")]
    ManifestWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write report {path}: {reason}")]
    ReportWrite { path: PathBuf, reason: String },
}

impl ManifestError {
    pub fn invalid_config<S: Into<String>>(reason: S) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }

    pub fn missing_attribute(element: &str, attribute: &str) -> Self {
        Self::MissingAttribute {
            element: element.to_string(),
            attribute: attribute.to_string(),
        }
    }

    pub fn invalid_attribute<R: ToString>(element: &str, attribute: &str, value: &str, reason: R) -> Self {
        Self::InvalidAttribute {
            element: element.to_string(),
            attribute: attribute.to_string(),
            value: value.to_string(),
            reason: reason.to_string(),
        }
    }
}
