pub mod chunks;
pub mod converter;
pub mod error;
pub mod mpd;

pub use chunks::{analyze_representation, analyze_representations, ChunkAnalysis};
pub use converter::{augment_document, convert_manifest, ConversionSummary, ConvertOptions};
pub use error::{ManifestError, Result};
pub use mpd::{Element, ManifestDocument, Node};
