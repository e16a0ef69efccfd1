use crate::chunks::ChunkAnalysis;
use crate::error::Result;
use crate::mpd::segment_template::SegmentTemplate;
use crate::mpd::Element;

pub const MAX_AVG_RATIO_ATTRIBUTE: &str = "maxAvgRatio";
pub const CHUNKS_ELEMENT: &str = "chunks";

/// Write one analysis into its `<Representation>`: the `maxAvgRatio`
/// attribute, a representation-scoped `<SegmentTemplate>` and a `<chunks>`
/// list, both appended after the existing children in the Representation's
/// own namespace.
pub fn augment_representation(
    representation: &mut Element,
    template: &SegmentTemplate,
    analysis: &ChunkAnalysis,
) -> Result<()> {
    representation.set_attribute(MAX_AVG_RATIO_ATTRIBUTE, &analysis.ratio_text())?;
    let segment_template =
        template.for_representation(&representation.qualify("SegmentTemplate"), analysis.bandwidth);
    representation.append_child(segment_template);

    let mut chunks = Element::new(&representation.qualify(CHUNKS_ELEMENT));
    chunks.append_text(&analysis.chunks_text());
    representation.append_child(chunks);
    Ok(())
}

/// Merge analyses into the AdaptationSet's Representations. `analyses` must be
/// in the same document order the Representations were read in.
pub fn augment_adaptation_set(
    adaptation: &mut Element,
    template: &SegmentTemplate,
    analyses: &[ChunkAnalysis],
) -> Result<()> {
    let representations = adaptation
        .child_elements_mut()
        .filter(|el| el.is("Representation"));
    for (representation, analysis) in representations.zip(analyses) {
        augment_representation(representation, template, analysis)?;
    }
    Ok(())
}
