use tracing::debug;

use crate::error::{ManifestError, Result};
use crate::mpd::Element;

/// First AdaptationSet of the first Period that has one, in document order.
pub fn locate_adaptation_set(root: &mut Element) -> Result<&mut Element> {
    for period in root.child_elements_mut().filter(|el| el.is("Period")) {
        if let Some(adaptation) = period.child_elements_mut().find(|el| el.is("AdaptationSet")) {
            debug!("Using <{}> {:?}", adaptation.name(), adaptation.attribute("id").ok().flatten());
            return Ok(adaptation);
        }
    }
    Err(ManifestError::AdaptationSetNotFound)
}

/// Identity of one `<Representation>`, read before any segment work starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepresentationInfo {
    pub id: String,
    /// Target bitrate in bits per second
    pub bandwidth: u64,
}

impl RepresentationInfo {
    pub fn from_element(element: &Element) -> Result<Self> {
        let name = element.name();
        let id = element.required_attribute("id")?;
        let raw_bandwidth = element.required_attribute("bandwidth")?;
        let bandwidth = raw_bandwidth
            .trim()
            .parse::<u64>()
            .map_err(|e| ManifestError::invalid_attribute(&name, "bandwidth", &raw_bandwidth, e))?;
        Ok(Self { id, bandwidth })
    }
}

pub fn representations(adaptation: &Element) -> Result<Vec<RepresentationInfo>> {
    adaptation
        .child_elements()
        .filter(|el| el.is("Representation"))
        .map(RepresentationInfo::from_element)
        .collect()
}
