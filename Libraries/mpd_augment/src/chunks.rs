//! Per-representation segment size statistics.
//!
//! For every Representation the segment files on disk are counted through a
//! glob derived from the shared `media` template, then each index from
//! `startNumber` through that count (inclusive) is resolved and its size
//! recorded in bits.
//!
//! The average used for `maxAvgRatio` is `sum / last_index`, where
//! `last_index` is the final index visited. With `startNumber > 1` this is
//! not the number of recorded chunks.

use rayon::prelude::*;
use regex::Regex;
use serde::Serialize;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::error::{ManifestError, Result};
use crate::mpd::locator::RepresentationInfo;
use crate::mpd::segment_template::SegmentTemplate;
use crate::mpd::template::{MediaTemplate, Placeholder, TemplateError, TemplatePart, TemplateValues};

/// Statistics for one Representation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChunkAnalysis {
    pub representation_id: String,
    pub bandwidth: u64,
    /// Files matching the segment glob
    pub segment_count: u64,
    pub last_index: u64,
    /// Segment sizes in bits, by ascending index
    pub chunk_sizes: Vec<u64>,
    pub max_avg_ratio: f64,
}

impl ChunkAnalysis {
    /// Comma separated sizes, as written into `<chunks>`.
    pub fn chunks_text(&self) -> String {
        self.chunk_sizes
            .iter()
            .map(|size| size.to_string())
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Shortest round-trip decimal form, always with a fractional part (`2.0`).
    pub fn ratio_text(&self) -> String {
        format_ratio(self.max_avg_ratio)
    }
}

pub fn format_ratio(ratio: f64) -> String {
    if ratio.is_finite() && ratio.fract() == 0.0 {
        format!("{:.1}", ratio)
    } else {
        format!("{}", ratio)
    }
}

#[derive(Debug, Default)]
struct ChunkAccumulator {
    chunk_sizes: Vec<u64>,
    total_bits: u64,
    peak_bits: u64,
    last_index: Option<u64>,
}

impl ChunkAccumulator {
    fn push(&mut self, index: u64, bits: u64) {
        self.chunk_sizes.push(bits);
        self.total_bits += bits;
        self.peak_bits = self.peak_bits.max(bits);
        self.last_index = Some(index);
    }

    fn finish(
        self,
        representation: &RepresentationInfo,
        segment_count: u64,
        no_segments: impl FnOnce() -> ManifestError,
    ) -> Result<ChunkAnalysis> {
        let last_index = match self.last_index {
            Some(index) if index > 0 => index,
            _ => return Err(no_segments()),
        };

        let average = self.total_bits as f64 / last_index as f64;
        if average <= 0.0 {
            return Err(ManifestError::DegenerateRatio {
                representation_id: representation.id.clone(),
            });
        }

        Ok(ChunkAnalysis {
            representation_id: representation.id.clone(),
            bandwidth: representation.bandwidth,
            segment_count,
            last_index,
            chunk_sizes: self.chunk_sizes,
            max_avg_ratio: self.peak_bits as f64 / average,
        })
    }
}

/// One `/`-separated piece of the segment glob.
#[derive(Debug, Default)]
struct GlobComponent {
    expr: String,
    text: String,
    wildcard: bool,
}

impl GlobComponent {
    /// `.` and the empty pieces left by `//` never appear in a walked path.
    fn is_noop(&self) -> bool {
        !self.wildcard && (self.text.is_empty() || self.text == ".")
    }
}

/// Shell-style glob over segment paths: the `$Number$` placeholder matches
/// any run of characters inside one path component. The wildcard-free leading
/// directories become the walk root; the rest is matched component-wise
/// against paths relative to it.
#[derive(Debug)]
struct SegmentGlob {
    walk_root: PathBuf,
    depth: usize,
    matcher: Regex,
    pattern: String,
}

impl SegmentGlob {
    fn new(base_dir: &Path, template: &MediaTemplate) -> Result<Self> {
        if !template.contains(Placeholder::Number) {
            return Err(TemplateError::MissingNumber {
                template: template.to_string(),
            }
            .into());
        }

        let mut components = vec![GlobComponent::default()];
        for part in template.parts() {
            let literal = match part {
                TemplatePart::Literal(text) => text.as_str(),
                TemplatePart::Escaped => "$",
                TemplatePart::Identifier { placeholder: Placeholder::Number, .. } => {
                    if let Some(component) = components.last_mut() {
                        component.expr.push_str("[^/]*");
                        component.text.push('*');
                        component.wildcard = true;
                    }
                    continue;
                }
                TemplatePart::Identifier { placeholder, .. } => {
                    return Err(TemplateError::Unresolved {
                        template: template.to_string(),
                        identifier: placeholder.identifier().to_string(),
                    }
                    .into())
                }
            };
            for (i, piece) in literal.split('/').enumerate() {
                if i > 0 {
                    components.push(GlobComponent::default());
                }
                if let Some(component) = components.last_mut() {
                    component.expr.push_str(&regex::escape(piece));
                    component.text.push_str(piece);
                }
            }
        }

        let rooted = components.len() > 1 && components[0].text.is_empty() && !components[0].wildcard;
        components.retain(|c| !c.is_noop());

        // The file name component is always matched, never walked into
        let fixed = components
            .iter()
            .take(components.len().saturating_sub(1))
            .take_while(|c| !c.wildcard)
            .count();
        let mut walk_root = if rooted {
            PathBuf::from("/")
        } else {
            base_dir.to_path_buf()
        };
        for component in &components[..fixed] {
            walk_root.push(&component.text);
        }

        let rest = &components[fixed..];
        let expr = format!(
            "^{}$",
            rest.iter().map(|c| c.expr.as_str()).collect::<Vec<_>>().join("/")
        );
        let matcher = Regex::new(&expr).map_err(|e| TemplateError::Pattern {
            template: template.to_string(),
            reason: e.to_string(),
        })?;
        let pattern = walk_root
            .join(rest.iter().map(|c| c.text.as_str()).collect::<Vec<_>>().join("/"))
            .display()
            .to_string();

        Ok(Self {
            walk_root,
            depth: rest.len(),
            matcher,
            pattern,
        })
    }

    fn count_matches(&self, representation_id: &str) -> Result<u64> {
        if !self.walk_root.is_dir() {
            return Ok(0);
        }

        let mut count = 0;
        for entry in WalkDir::new(&self.walk_root)
            .min_depth(self.depth)
            .max_depth(self.depth)
        {
            let entry = entry.map_err(|source| ManifestError::SegmentScan {
                representation_id: representation_id.to_string(),
                path: self.walk_root.clone(),
                source,
            })?;
            if !entry.path().is_file() {
                continue;
            }
            let Ok(relative) = entry.path().strip_prefix(&self.walk_root) else {
                continue;
            };
            let relative = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            if self.matcher.is_match(&relative) {
                count += 1;
            }
        }
        Ok(count)
    }

    fn no_segments(
        &self,
        representation: &RepresentationInfo,
        segment_count: u64,
        start_number: u64,
    ) -> ManifestError {
        ManifestError::NoSegmentsFound {
            representation_id: representation.id.clone(),
            pattern: self.pattern.clone(),
            segment_count,
            start_number,
        }
    }
}

/// Measure every segment of one Representation and compute its ratio.
pub fn analyze_representation(
    base_dir: &Path,
    template: &SegmentTemplate,
    representation: &RepresentationInfo,
) -> Result<ChunkAnalysis> {
    let media = template.media.substitute(
        &TemplateValues::new()
            .bandwidth(representation.bandwidth)
            .representation_id(&representation.id),
    );
    let glob = SegmentGlob::new(base_dir, &media)?;
    let segment_count = glob.count_matches(&representation.id)?;
    debug!(
        "Representation {}: {} files match {}",
        representation.id, segment_count, glob.pattern
    );

    if segment_count == 0 {
        return Err(glob.no_segments(representation, segment_count, template.start_number));
    }

    let mut accumulator = ChunkAccumulator::default();
    for index in template.start_number..=segment_count {
        let relative = media.substitute(&TemplateValues::new().number(index)).to_path()?;
        let path = base_dir.join(relative);
        let bytes = segment_size(&path, &representation.id, index)?;
        accumulator.push(index, bytes * 8);
    }

    let analysis = accumulator.finish(representation, segment_count, || {
        glob.no_segments(representation, segment_count, template.start_number)
    })?;
    info!(
        "Representation {} ({} bps): {} chunks, maxAvgRatio {}",
        analysis.representation_id,
        analysis.bandwidth,
        analysis.chunk_sizes.len(),
        analysis.ratio_text()
    );
    Ok(analysis)
}

fn segment_size(path: &Path, representation_id: &str, index: u64) -> Result<u64> {
    match std::fs::metadata(path) {
        Ok(meta) => Ok(meta.len()),
        Err(e) if e.kind() == ErrorKind::NotFound => Err(ManifestError::SegmentFileNotFound {
            representation_id: representation_id.to_string(),
            index,
            path: path.to_path_buf(),
        }),
        Err(source) => Err(ManifestError::SegmentIo {
            representation_id: representation_id.to_string(),
            index,
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Analyze all Representations, in parallel when asked. Results keep the
/// order of `representations`.
pub fn analyze_representations(
    base_dir: &Path,
    template: &SegmentTemplate,
    representations: &[RepresentationInfo],
    parallel: bool,
) -> Result<Vec<ChunkAnalysis>> {
    if parallel {
        representations
            .par_iter()
            .map(|rep| analyze_representation(base_dir, template, rep))
            .collect()
    } else {
        representations
            .iter()
            .map(|rep| analyze_representation(base_dir, template, rep))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn template(media: &str, start_number: u64) -> SegmentTemplate {
        SegmentTemplate {
            media: MediaTemplate::parse(media).unwrap(),
            start_number,
            timescale: Some("1000".to_string()),
            initialization: None,
            duration: Some("2000".to_string()),
        }
    }

    fn rep(id: &str, bandwidth: u64) -> RepresentationInfo {
        RepresentationInfo {
            id: id.to_string(),
            bandwidth,
        }
    }

    fn write_segments(dir: &Path, name: impl Fn(u64) -> String, sizes: &[usize]) {
        for (i, size) in sizes.iter().enumerate() {
            let path = dir.join(name(i as u64 + 1));
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).unwrap();
            }
            fs::write(path, vec![0u8; *size]).unwrap();
        }
    }

    #[test]
    fn test_ratio_for_three_segments() {
        let dir = tempfile::tempdir().unwrap();
        write_segments(dir.path(), |i| format!("seg_100000_{i}.m4s"), &[1000, 4000, 1000]);

        let analysis =
            analyze_representation(dir.path(), &template("seg_$Bandwidth$_$Number$.m4s", 1), &rep("v1", 100000))
                .unwrap();
        assert_eq!(analysis.chunk_sizes, vec![8000, 32000, 8000]);
        assert_eq!(analysis.segment_count, 3);
        assert_eq!(analysis.last_index, 3);
        assert_eq!(analysis.max_avg_ratio, 2.0);
        assert_eq!(analysis.chunks_text(), "8000,32000,8000");
        assert_eq!(analysis.ratio_text(), "2.0");
    }

    #[test]
    fn test_average_divides_by_last_index() {
        let dir = tempfile::tempdir().unwrap();
        write_segments(dir.path(), |i| format!("s{i}.m4s"), &[100, 200, 300, 400]);

        // Indices 2..=4 are visited: three chunks, but the average divides by 4
        let analysis = analyze_representation(dir.path(), &template("s$Number$.m4s", 2), &rep("v1", 1)).unwrap();
        assert_eq!(analysis.chunk_sizes, vec![1600, 2400, 3200]);
        assert_eq!(analysis.last_index, 4);
        let average = (1600 + 2400 + 3200) as f64 / 4.0;
        assert_eq!(analysis.max_avg_ratio, 3200.0 / average);
    }

    #[test]
    fn test_start_number_zero_reads_one_extra_index() {
        let dir = tempfile::tempdir().unwrap();
        write_segments(dir.path(), |i| format!("s{}.m4s", i - 1), &[100, 100, 100]);
        fs::write(dir.path().join("s3.m4s"), vec![0u8; 100]).unwrap();

        // Four files s0..s3: n = 4 so index 4 is expected but absent
        let err = analyze_representation(dir.path(), &template("s$Number$.m4s", 0), &rep("v0", 1)).unwrap_err();
        assert!(matches!(
            err,
            ManifestError::SegmentFileNotFound { ref representation_id, index: 4, .. } if representation_id == "v0"
        ));
    }

    #[test]
    fn test_missing_segment_in_range() {
        let dir = tempfile::tempdir().unwrap();
        write_segments(dir.path(), |i| format!("seg_{i}.m4s"), &[10, 10, 10]);
        fs::rename(dir.path().join("seg_2.m4s"), dir.path().join("seg_9.m4s")).unwrap();

        let err = analyze_representation(dir.path(), &template("seg_$Number$.m4s", 1), &rep("audio", 64000)).unwrap_err();
        match err {
            ManifestError::SegmentFileNotFound { representation_id, index, path } => {
                assert_eq!(representation_id, "audio");
                assert_eq!(index, 2);
                assert!(path.ends_with("seg_2.m4s"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_no_matching_files() {
        let dir = tempfile::tempdir().unwrap();
        let err = analyze_representation(dir.path(), &template("seg_$Number$.m4s", 1), &rep("v1", 1)).unwrap_err();
        assert!(matches!(err, ManifestError::NoSegmentsFound { segment_count: 0, .. }));
    }

    #[test]
    fn test_start_number_zero_without_files() {
        let dir = tempfile::tempdir().unwrap();
        let err = analyze_representation(dir.path(), &template("seg_$Number$.m4s", 0), &rep("v1", 1)).unwrap_err();
        assert!(matches!(
            err,
            ManifestError::NoSegmentsFound { segment_count: 0, start_number: 0, .. }
        ));
    }

    #[test]
    fn test_dot_and_repeated_separators_in_media() {
        let dir = tempfile::tempdir().unwrap();
        write_segments(dir.path(), |i| format!("seg_{i}.m4s"), &[10, 20, 10]);
        write_segments(dir.path(), |i| format!("video/s{i}.m4s"), &[5, 5]);

        let analysis = analyze_representation(dir.path(), &template("./seg_$Number$.m4s", 1), &rep("v1", 1)).unwrap();
        assert_eq!(analysis.segment_count, 3);
        assert_eq!(analysis.chunk_sizes, vec![80, 160, 80]);

        for media in ["video//s$Number$.m4s", "./video/./s$Number$.m4s"] {
            let analysis = analyze_representation(dir.path(), &template(media, 1), &rep("v2", 1)).unwrap();
            assert_eq!(analysis.segment_count, 2, "{media}");
            assert_eq!(analysis.chunk_sizes, vec![40, 40]);
        }
    }

    #[test]
    fn test_start_number_past_count() {
        let dir = tempfile::tempdir().unwrap();
        write_segments(dir.path(), |i| format!("seg_{i}.m4s"), &[10, 10]);
        let err = analyze_representation(dir.path(), &template("seg_$Number$.m4s", 5), &rep("v1", 1)).unwrap_err();
        assert!(matches!(
            err,
            ManifestError::NoSegmentsFound { segment_count: 2, start_number: 5, .. }
        ));
    }

    #[test]
    fn test_zero_sized_segments_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        write_segments(dir.path(), |i| format!("seg_{i}.m4s"), &[0, 0]);
        let err = analyze_representation(dir.path(), &template("seg_$Number$.m4s", 1), &rep("v1", 1)).unwrap_err();
        assert!(matches!(err, ManifestError::DegenerateRatio { .. }));
    }

    #[test]
    fn test_nested_directories_and_representation_id() {
        let dir = tempfile::tempdir().unwrap();
        write_segments(dir.path(), |i| format!("video/v2/250000/chunk-{i:03}.m4s"), &[500, 1000]);
        // Not counted: other bandwidth, wrong extension, init segment one level up
        fs::create_dir_all(dir.path().join("video/v2/100000")).unwrap();
        fs::write(dir.path().join("video/v2/100000/chunk-001.m4s"), b"x").unwrap();
        fs::write(dir.path().join("video/v2/250000/chunk-001.mp4"), b"x").unwrap();
        fs::write(dir.path().join("video/v2/init.mp4"), b"x").unwrap();

        let analysis = analyze_representation(
            dir.path(),
            &template("video/$RepresentationID$/$Bandwidth$/chunk-$Number%03d$.m4s", 1),
            &rep("v2", 250000),
        )
        .unwrap();
        assert_eq!(analysis.segment_count, 2);
        assert_eq!(analysis.chunk_sizes, vec![4000, 8000]);
        assert_eq!(analysis.max_avg_ratio, 8000.0 / 6000.0);
    }

    #[test]
    fn test_wildcard_in_directory_component() {
        let dir = tempfile::tempdir().unwrap();
        write_segments(dir.path(), |i| format!("seg{i}/data.m4s"), &[10, 30]);

        let analysis = analyze_representation(dir.path(), &template("seg$Number$/data.m4s", 1), &rep("v1", 1)).unwrap();
        assert_eq!(analysis.chunk_sizes, vec![80, 240]);
    }

    #[test]
    fn test_time_addressing_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let err = analyze_representation(dir.path(), &template("seg_$Time$.m4s", 1), &rep("v1", 1)).unwrap_err();
        assert!(matches!(err, ManifestError::Template(TemplateError::MissingNumber { .. })));

        let err = analyze_representation(dir.path(), &template("seg_$Time$_$Number$.m4s", 1), &rep("v1", 1)).unwrap_err();
        assert!(matches!(err, ManifestError::Template(TemplateError::Unresolved { .. })));
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let dir = tempfile::tempdir().unwrap();
        write_segments(dir.path(), |i| format!("100/s{i}.m4s"), &[10, 20, 30]);
        write_segments(dir.path(), |i| format!("200/s{i}.m4s"), &[40, 10]);
        write_segments(dir.path(), |i| format!("300/s{i}.m4s"), &[5]);

        let template = template("$Bandwidth$/s$Number$.m4s", 1);
        let reps = vec![rep("a", 100), rep("b", 200), rep("c", 300)];
        let sequential = analyze_representations(dir.path(), &template, &reps, false).unwrap();
        let parallel = analyze_representations(dir.path(), &template, &reps, true).unwrap();

        assert_eq!(sequential, parallel);
        let ids: Vec<_> = parallel.iter().map(|a| a.representation_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_format_ratio() {
        assert_eq!(format_ratio(2.0), "2.0");
        assert_eq!(format_ratio(1.5), "1.5");
        assert_eq!(format_ratio(4.0 / 3.0), "1.3333333333333333");
    }
}
