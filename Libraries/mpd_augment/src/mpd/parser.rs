use quick_xml::events::Event;
use quick_xml::Reader;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{ManifestError, Result};
use crate::mpd::{Element, ManifestDocument, Node};

/// A manifest together with the directory its relative segment paths resolve against.
#[derive(Debug, Clone)]
pub struct LoadedManifest {
    pub document: ManifestDocument,
    pub base_dir: PathBuf,
}

pub fn load_manifest(path: &Path) -> Result<LoadedManifest> {
    let bytes = std::fs::read(path).map_err(|source| ManifestError::ManifestRead {
        path: path.to_path_buf(),
        source,
    })?;
    let document = parse_manifest(&bytes, path)?;
    let base_dir = base_dir_of(path);

    debug!(
        "Loaded {} ({} bytes), namespace {:?}, base dir {}",
        path.display(),
        bytes.len(),
        document.default_namespace,
        base_dir.display()
    );

    Ok(LoadedManifest { document, base_dir })
}

/// Directory containing the manifest; `.` for a bare file name.
pub fn base_dir_of(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// Parse raw manifest bytes. `path` is only used in error messages.
pub fn parse_manifest(bytes: &[u8], path: &Path) -> Result<ManifestDocument> {
    let mut reader = Reader::from_reader(bytes);
    let mut buf = Vec::new();
    let mut top_level: Vec<Node> = Vec::new();
    let mut open: Vec<Element> = Vec::new();

    let malformed = |position: u64, reason: String| ManifestError::ManifestParse {
        path: path.to_path_buf(),
        position,
        reason,
    };

    loop {
        let event = reader
            .read_event_into(&mut buf)
            .map_err(|e| malformed(reader.buffer_position() as u64, e.to_string()))?;

        match event {
            Event::Start(start) => open.push(Element {
                start: start.into_owned(),
                children: Vec::new(),
                self_closing: false,
            }),
            Event::Empty(start) => {
                let element = Element {
                    start: start.into_owned(),
                    children: Vec::new(),
                    self_closing: true,
                };
                attach(&mut open, &mut top_level, Node::Element(element));
            }
            Event::End(_) => {
                // End names are checked against the open tag by the reader
                let element = open.pop().ok_or_else(|| {
                    malformed(reader.buffer_position() as u64, "unexpected closing tag".to_string())
                })?;
                attach(&mut open, &mut top_level, Node::Element(element));
            }
            Event::Eof => break,
            other => attach(&mut open, &mut top_level, Node::Misc(other.into_owned())),
        }
        buf.clear();
    }

    if let Some(unclosed) = open.last() {
        return Err(malformed(
            reader.buffer_position() as u64,
            format!("unclosed element <{}>", unclosed.name()),
        ));
    }

    let mut roots = top_level
        .iter()
        .enumerate()
        .filter(|(_, node)| matches!(node, Node::Element(_)))
        .map(|(idx, _)| idx);
    let root_index = roots
        .next()
        .ok_or_else(|| malformed(bytes.len() as u64, "document has no root element".to_string()))?;
    if roots.next().is_some() {
        return Err(malformed(
            bytes.len() as u64,
            "document has more than one root element".to_string(),
        ));
    }

    ManifestDocument::new(top_level, root_index)
}

fn attach(open: &mut [Element], top_level: &mut Vec<Node>, node: Node) {
    match open.last_mut() {
        Some(parent) => parent.children.push(node),
        None => top_level.push(node),
    }
}
