use tracing::debug;

use crate::error::{ManifestError, Result};
use crate::mpd::template::{MediaTemplate, TemplateValues};
use crate::mpd::Element;

/// startNumber assumed when the attribute is absent (DASH schema default)
pub const DEFAULT_START_NUMBER: u64 = 1;

/// The AdaptationSet-level `<SegmentTemplate>`, shared by every Representation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentTemplate {
    pub media: MediaTemplate,
    pub start_number: u64,
    /// Kept as written; only copied into the per-representation templates.
    pub timescale: Option<String>,
    pub initialization: Option<MediaTemplate>,
    pub duration: Option<String>,
}

impl SegmentTemplate {
    /// Read the AdaptationSet's SegmentTemplate. When several are present the
    /// last one in document order wins.
    pub fn extract(adaptation: &Element) -> Result<Self> {
        let element = adaptation
            .child_elements()
            .filter(|el| el.is("SegmentTemplate"))
            .last()
            .ok_or(ManifestError::SegmentTemplateMissing)?;
        let template = Self::from_element(element)?;
        debug!("Shared segment template: {:?}", template);
        Ok(template)
    }

    pub fn from_element(element: &Element) -> Result<Self> {
        let name = element.name();
        let media = MediaTemplate::parse(&element.required_attribute("media")?)?;
        let start_number = match element.attribute("startNumber")? {
            Some(raw) => raw
                .trim()
                .parse::<u64>()
                .map_err(|e| ManifestError::invalid_attribute(&name, "startNumber", &raw, e))?,
            None => DEFAULT_START_NUMBER,
        };
        let initialization = element
            .attribute("initialization")?
            .map(|raw| MediaTemplate::parse(&raw))
            .transpose()?;

        Ok(Self {
            media,
            start_number,
            timescale: element.attribute("timescale")?,
            initialization,
            duration: element.attribute("duration")?,
        })
    }

    /// Build the `<SegmentTemplate>` child for one Representation: the shared
    /// template with `$Bandwidth$` resolved, `$Number$` left for the player.
    /// `name` is the qualified tag to use.
    pub fn for_representation(&self, name: &str, bandwidth: u64) -> Element {
        let values = TemplateValues::new().bandwidth(bandwidth);
        let mut element = Element::new(name);
        if let Some(timescale) = &self.timescale {
            element.start.push_attribute(("timescale", timescale.as_str()));
        }
        element
            .start
            .push_attribute(("media", self.media.substitute(&values).to_string().as_str()));
        element
            .start
            .push_attribute(("startNumber", self.start_number.to_string().as_str()));
        if let Some(duration) = &self.duration {
            element.start.push_attribute(("duration", duration.as_str()));
        }
        if let Some(initialization) = &self.initialization {
            element.start.push_attribute((
                "initialization",
                initialization.substitute(&values).to_string().as_str(),
            ));
        }
        element
    }
}
