use quick_xml::events::{BytesStart, Event};
use quick_xml::Writer;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::debug;

use crate::error::{ManifestError, Result};
use crate::mpd::parser::base_dir_of;
use crate::mpd::{Element, ManifestDocument, Node, DASH_NAMESPACE};

pub const DEFAULT_SUFFIX: &str = "BBA2";

/// `dir/foo.mpd` -> `dir/fooBBA2.mpd` for suffix `BBA2`.
pub fn output_path_for(input: &Path, suffix: &str) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match input.extension() {
        Some(ext) => format!("{}{}.{}", stem, suffix, ext.to_string_lossy()),
        None => format!("{}{}", stem, suffix),
    };
    input.with_file_name(name)
}

/// Prefix the root binds to the DASH namespace. Tags carrying it are written
/// unprefixed, with the DASH namespace as the default.
#[derive(Debug)]
struct DashPrefix {
    prefix: Vec<u8>,
    /// The root has no default `xmlns` yet and gets one
    declare_default: bool,
}

impl DashPrefix {
    fn detect(document: &ManifestDocument) -> Result<Option<Self>> {
        let root = document.root();
        let Some(prefix) = root.start.name().prefix().map(|p| p.as_ref().to_vec()) else {
            return Ok(None);
        };
        let declaration = format!("xmlns:{}", String::from_utf8_lossy(&prefix));
        if root.attribute(&declaration)?.as_deref() != Some(DASH_NAMESPACE) {
            return Ok(None);
        }
        let declare_default = match document.default_namespace.as_deref() {
            None => true,
            Some(DASH_NAMESPACE) => false,
            // Another default namespace is in scope, keep the prefixes
            Some(_) => return Ok(None),
        };
        Ok(Some(Self { prefix, declare_default }))
    }

    fn matches(&self, element: &Element) -> bool {
        element
            .start
            .name()
            .prefix()
            .is_some_and(|p| p.as_ref() == self.prefix.as_slice())
    }

    fn unprefixed(&self, element: &Element, declare_default: bool) -> Result<BytesStart<'static>> {
        let local = String::from_utf8_lossy(element.start.local_name().as_ref()).into_owned();
        let mut start = BytesStart::new(local);
        if declare_default {
            start.push_attribute(("xmlns", DASH_NAMESPACE));
        }
        for attr in element.start.attributes() {
            let attr = attr.map_err(|e| ManifestError::Serialize { reason: e.to_string() })?;
            start.push_attribute(attr);
        }
        Ok(start)
    }
}

/// Serialize the document. Nodes are replayed as read, so untouched markup
/// keeps its original bytes; tags in a prefixed DASH namespace lose the prefix.
pub fn serialize(document: &ManifestDocument) -> Result<Vec<u8>> {
    let dash = DashPrefix::detect(document)?;
    if let Some(dash) = &dash {
        debug!("Writing '{}:' tags unprefixed", String::from_utf8_lossy(&dash.prefix));
    }

    let mut writer = Writer::new(Vec::new());
    for node in &document.nodes {
        match node {
            Node::Element(root) => {
                let declare_default = dash.as_ref().is_some_and(|d| d.declare_default);
                write_element(&mut writer, root, dash.as_ref(), declare_default, false)?;
            }
            Node::Misc(event) => emit(&mut writer, event.borrow())?,
        }
    }
    Ok(writer.into_inner())
}

/// `unbound_default` is set below a root that newly declares the default
/// namespace: unprefixed elements there were in no namespace and keep it
/// through `xmlns=""`.
fn write_element(
    writer: &mut Writer<Vec<u8>>,
    element: &Element,
    dash: Option<&DashPrefix>,
    declare_default: bool,
    unbound_default: bool,
) -> Result<()> {
    let mut children_unbound = unbound_default || declare_default;
    let start = match dash {
        Some(dash) if dash.matches(element) => dash.unprefixed(element, declare_default)?,
        _ if unbound_default && element.start.name().prefix().is_none() => {
            children_unbound = false;
            let mut start = element.start.clone();
            if element.attribute("xmlns")?.is_none() {
                start.push_attribute(("xmlns", ""));
            }
            start
        }
        _ => element.start.clone(),
    };

    if element.self_closing && element.children.is_empty() {
        return emit(writer, Event::Empty(start));
    }
    emit(writer, Event::Start(start.borrow()))?;
    for child in &element.children {
        match child {
            Node::Element(child) => write_element(writer, child, dash, false, children_unbound)?,
            Node::Misc(event) => emit(writer, event.borrow())?,
        }
    }
    emit(writer, Event::End(start.to_end()))
}

fn emit(writer: &mut Writer<Vec<u8>>, event: Event<'_>) -> Result<()> {
    writer
        .write_event(event)
        .map_err(|e| ManifestError::Serialize { reason: e.to_string() })
}

/// Serialize and write atomically: the bytes go to a temporary file next to
/// `path`, which is then renamed over it.
pub fn write_manifest(document: &ManifestDocument, path: &Path) -> Result<()> {
    let bytes = serialize(document)?;
    let write_error = |source: std::io::Error| ManifestError::ManifestWrite {
        path: path.to_path_buf(),
        source,
    };

    let mut file = NamedTempFile::new_in(base_dir_of(path)).map_err(write_error)?;
    file.write_all(&bytes).map_err(write_error)?;
    file.as_file().sync_all().map_err(write_error)?;
    file.persist(path).map_err(|e| write_error(e.error))?;

    debug!("Wrote {} bytes to {}", bytes.len(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mpd::parser::parse_manifest;

    const MANIFEST: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<MPD xmlns="urn:mpeg:dash:schema:mpd:2011" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance"  profiles="urn:mpeg:dash:profile:isoff-live:2011" type="static" mediaPresentationDuration="PT0H1M0.00S" minBufferTime="PT2.0S">
  <!-- Created with a packager -->
  <ProgramInformation moreInformationURL="http://example.com/?a=1&amp;b=2">
    <Title>Big &quot;Buck&quot; Bunny</Title>
  </ProgramInformation>
  <Period duration="PT0H1M0.00S" start="PT0S">
    <AdaptationSet segmentAlignment="true" maxWidth="1920" maxHeight="1080" >
      <SegmentTemplate timescale="1000" media="bbb_$Bandwidth$bps/seg_$Number$.m4s" startNumber="1" duration="2000" initialization="bbb_$Bandwidth$bps/init.mp4" />
      <Representation id="0" mimeType="video/mp4" codecs="avc1.42c00d" width="320" height="180" frameRate="24" sar="1:1" bandwidth="100000"/>
      <Representation id="1" mimeType="video/mp4" codecs="avc1.42c00d" width="640" height="360" frameRate="24" sar="1:1" bandwidth="250000"></Representation>
    </AdaptationSet>
  </Period>
</MPD>
"#;

    #[test]
    fn test_round_trip_is_byte_exact() {
        let document = parse_manifest(MANIFEST.as_bytes(), Path::new("bbb.mpd")).unwrap();
        let bytes = serialize(&document).unwrap();
        assert_eq!(String::from_utf8(bytes).unwrap(), MANIFEST);
    }

    #[test]
    fn test_foreign_prefix_round_trip() {
        let xml = r#"<MPD xmlns="urn:mpeg:dash:schema:mpd:2011" xmlns:cenc="urn:mpeg:cenc:2013"><Period><cenc:pssh>AAAA</cenc:pssh></Period></MPD>"#;
        let document = parse_manifest(xml.as_bytes(), Path::new("ns.mpd")).unwrap();
        assert_eq!(serialize(&document).unwrap(), xml.as_bytes());
    }

    #[test]
    fn test_dash_prefix_is_dropped() {
        let xml = r#"<mpd:MPD xmlns:mpd="urn:mpeg:dash:schema:mpd:2011" type="static"><mpd:Period><mpd:AdaptationSet id="a"><Label/></mpd:AdaptationSet></mpd:Period></mpd:MPD>"#;
        let mut document = parse_manifest(xml.as_bytes(), Path::new("ns.mpd")).unwrap();
        let mut chunks = Element::new("mpd:chunks");
        chunks.append_text("8");
        document.root_mut().append_child(chunks);

        let text = String::from_utf8(serialize(&document).unwrap()).unwrap();
        assert_eq!(
            text,
            r#"<MPD xmlns="urn:mpeg:dash:schema:mpd:2011" xmlns:mpd="urn:mpeg:dash:schema:mpd:2011" type="static"><Period><AdaptationSet id="a"><Label xmlns=""/></AdaptationSet></Period><chunks>8</chunks></MPD>"#
        );

        let reparsed = parse_manifest(text.as_bytes(), Path::new("ns.mpd")).unwrap();
        assert_eq!(reparsed.default_namespace.as_deref(), Some(DASH_NAMESPACE));
    }

    #[test]
    fn test_prefix_kept_under_foreign_default_namespace() {
        let xml = r#"<mpd:MPD xmlns="urn:example:other" xmlns:mpd="urn:mpeg:dash:schema:mpd:2011"><mpd:Period/></mpd:MPD>"#;
        let document = parse_manifest(xml.as_bytes(), Path::new("ns.mpd")).unwrap();
        assert_eq!(serialize(&document).unwrap(), xml.as_bytes());
    }

    #[test]
    fn test_appended_children_are_unprefixed() {
        let mut document = parse_manifest(MANIFEST.as_bytes(), Path::new("bbb.mpd")).unwrap();
        let mut chunks = Element::new("chunks");
        chunks.append_text("8,16");
        document.root_mut().append_child(chunks);

        let text = String::from_utf8(serialize(&document).unwrap()).unwrap();
        assert!(text.contains("<chunks>8,16</chunks></MPD>"));
        assert!(!text.contains("ns0:"));
    }

    #[test]
    fn test_output_path_for() {
        assert_eq!(output_path_for(Path::new("foo.mpd"), "BBA2"), PathBuf::from("fooBBA2.mpd"));
        assert_eq!(
            output_path_for(Path::new("/srv/dash/bbb.mpd"), "BBA2"),
            PathBuf::from("/srv/dash/bbbBBA2.mpd")
        );
        assert_eq!(output_path_for(Path::new("dash/manifest"), "_x"), PathBuf::from("dash/manifest_x"));
        assert_eq!(
            output_path_for(Path::new("a.b.mpd"), DEFAULT_SUFFIX),
            PathBuf::from("a.bBBA2.mpd")
        );
    }

    #[test]
    fn test_write_manifest_replaces_target() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("outBBA2.mpd");
        std::fs::write(&target, "stale").unwrap();

        let document = parse_manifest(MANIFEST.as_bytes(), Path::new("bbb.mpd")).unwrap();
        write_manifest(&document, &target).unwrap();

        assert_eq!(std::fs::read_to_string(&target).unwrap(), MANIFEST);
        let leftovers = std::fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(leftovers, 1);
    }

    #[test]
    fn test_write_into_missing_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("missing").join("out.mpd");
        let document = parse_manifest(MANIFEST.as_bytes(), Path::new("bbb.mpd")).unwrap();
        assert!(matches!(
            write_manifest(&document, &target),
            Err(ManifestError::ManifestWrite { .. })
        ));
        assert!(!target.exists());
    }
}
