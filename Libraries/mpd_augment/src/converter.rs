//! End-to-end conversion: load, locate, analyze, mutate, write.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::chunks::{analyze_representations, ChunkAnalysis};
use crate::error::{ManifestError, Result};
use crate::mpd::locator::{locate_adaptation_set, representations};
use crate::mpd::mutator::augment_adaptation_set;
use crate::mpd::parser::load_manifest;
use crate::mpd::segment_template::SegmentTemplate;
use crate::mpd::writer::{output_path_for, write_manifest, DEFAULT_SUFFIX};
use crate::mpd::ManifestDocument;

#[derive(Debug, Clone)]
pub struct ConvertOptions {
    pub manifest_path: PathBuf,
    /// Written next to the input with `suffix` appended when unset
    pub output_path: Option<PathBuf>,
    pub suffix: String,
    /// Analyze representations on the rayon pool
    pub parallel: bool,
}

impl ConvertOptions {
    pub fn new<P: Into<PathBuf>>(manifest_path: P) -> Self {
        Self {
            manifest_path: manifest_path.into(),
            output_path: None,
            suffix: DEFAULT_SUFFIX.to_string(),
            parallel: true,
        }
    }

    pub fn output_path(&self) -> PathBuf {
        match &self.output_path {
            Some(path) => path.clone(),
            None => output_path_for(&self.manifest_path, &self.suffix),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.manifest_path.as_os_str().is_empty() {
            return Err(ManifestError::invalid_config("manifest path is empty"));
        }
        if !self.manifest_path.is_file() {
            return Err(ManifestError::invalid_config(format!(
                "manifest {} does not exist or is not a file",
                self.manifest_path.display()
            )));
        }
        if self.output_path.is_none() {
            if self.suffix.is_empty() {
                return Err(ManifestError::invalid_config("output suffix is empty"));
            }
            if self.suffix.contains(['/', '\\']) {
                return Err(ManifestError::invalid_config(format!(
                    "output suffix '{}' contains a path separator",
                    self.suffix
                )));
            }
        }

        let output = self.output_path();
        if same_file(&output, &self.manifest_path) {
            return Err(ManifestError::invalid_config(format!(
                "output {} would overwrite the input manifest",
                output.display()
            )));
        }
        if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
            if !parent.is_dir() {
                return Err(ManifestError::invalid_config(format!(
                    "output directory {} does not exist",
                    parent.display()
                )));
            }
        }
        Ok(())
    }
}

fn same_file(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ConversionSummary {
    pub input: PathBuf,
    pub output: PathBuf,
    pub generated_at: DateTime<Utc>,
    pub representations: Vec<ChunkAnalysis>,
}

impl ConversionSummary {
    pub fn write_report(&self, path: &Path) -> Result<()> {
        let report_error = |reason: String| ManifestError::ReportWrite {
            path: path.to_path_buf(),
            reason,
        };
        let json = serde_json::to_string_pretty(self).map_err(|e| report_error(e.to_string()))?;
        std::fs::write(path, json).map_err(|e| report_error(e.to_string()))
    }
}

/// Locate the AdaptationSet, measure every Representation's segments under
/// `base_dir` and write the results into the tree. Nothing in the tree is
/// touched unless every Representation was analyzed successfully.
pub fn augment_document(
    document: &mut ManifestDocument,
    base_dir: &Path,
    parallel: bool,
) -> Result<Vec<ChunkAnalysis>> {
    let adaptation = locate_adaptation_set(document.root_mut())?;
    let infos = representations(adaptation)?;
    if infos.is_empty() {
        warn!("AdaptationSet has no Representations, nothing to augment");
        return Ok(Vec::new());
    }

    let template = SegmentTemplate::extract(adaptation)?;
    let analyses = analyze_representations(base_dir, &template, &infos, parallel)?;
    augment_adaptation_set(adaptation, &template, &analyses)?;
    Ok(analyses)
}

pub fn convert_manifest(options: &ConvertOptions) -> Result<ConversionSummary> {
    options.validate()?;
    let output = options.output_path();
    info!("MPD: {}", options.manifest_path.display());

    let mut loaded = load_manifest(&options.manifest_path)?;
    info!("Root dir: {}", loaded.base_dir.display());

    let analyses = augment_document(&mut loaded.document, &loaded.base_dir, options.parallel)?;
    write_manifest(&loaded.document, &output)?;
    info!(
        "Wrote {} with {} augmented representations",
        output.display(),
        analyses.len()
    );

    Ok(ConversionSummary {
        input: options.manifest_path.clone(),
        output,
        generated_at: Utc::now(),
        representations: analyses,
    })
}
