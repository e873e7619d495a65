//! Uploaded-file descriptors and entities.
//!
//! # Responsibilities
//! - Recognize upload-descriptor leaves inside a merged argument tree
//! - Carry upload metadata between the two models
//! - Hold uploaded-file entities in a tree isomorphic to the parsed body
//!
//! # Design Decisions
//! - Detection is a weak shape check (string `tmp_name` + `name`, no
//!   container values); ordinary user data shaped like a descriptor is an
//!   accepted false positive, no better signal exists after the upstream
//!   merge
//! - Entities may expose their temporary file location through
//!   [`UploadedFile::temp_path`]; without it the reverse transform cannot
//!   rebuild a descriptor and reports that instead of dropping data

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_json::{Map, Number, Value};

use crate::error::{BridgeResult, TransformError};

/// Flat upload metadata as it appears as a leaf of the merged argument tree.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct UploadDescriptor {
    /// Temporary location the upload was stored at.
    pub tmp_name: String,
    /// Client-supplied file name.
    pub name: String,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub error: Option<u32>,
    /// Client-supplied media type.
    #[serde(default, rename = "type")]
    pub media_type: Option<String>,
}

impl UploadDescriptor {
    /// Weak check whether a map node might be upload metadata: `tmp_name`
    /// and `name` present as strings, and no direct value is itself a map
    /// or a sequence. A descriptor is a flat leaf, never a container of
    /// descriptors; a null or missing required field means user data.
    pub fn matches(node: &Map<String, Value>) -> bool {
        node.get("tmp_name").is_some_and(|value| value.is_string())
            && node.get("name").is_some_and(|value| value.is_string())
            && node
                .values()
                .all(|value| !value.is_object() && !value.is_array())
    }

    /// Read a matched node into a descriptor. `path` is only used for error
    /// context.
    pub fn from_map(path: &str, node: &Map<String, Value>) -> BridgeResult<Self> {
        serde_json::from_value(Value::Object(node.clone())).map_err(|err| {
            TransformError::InvalidUploadDescriptor {
                path: path.to_string(),
                reason: err.to_string(),
            }
        })
    }

    /// Rebuild the flat map form, for reinjection into an argument tree.
    pub fn to_map(&self) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert("tmp_name".to_string(), Value::String(self.tmp_name.clone()));
        map.insert("name".to_string(), Value::String(self.name.clone()));
        if let Some(size) = self.size {
            map.insert("size".to_string(), Value::Number(Number::from(size)));
        }
        if let Some(error) = self.error {
            map.insert("error".to_string(), Value::Number(Number::from(error)));
        }
        if let Some(media_type) = &self.media_type {
            map.insert("type".to_string(), Value::String(media_type.clone()));
        }
        map
    }
}

/// Uploaded-file entity of the structured model.
pub trait UploadedFile: fmt::Debug + Send + Sync {
    /// Client-supplied file name.
    fn client_filename(&self) -> &str;

    fn size(&self) -> Option<u64>;

    fn error(&self) -> Option<u32>;

    fn media_type(&self) -> Option<&str>;

    /// Original temporary location, when the entity exposes it. Required to
    /// reconstruct a unified upload descriptor; entities hiding the location
    /// return `None` and make the reverse transform fail explicitly.
    fn temp_path(&self) -> Option<&Path> {
        None
    }
}

/// Node of the uploaded-files tree. Shape-isomorphic to the parsed-body
/// subtree the descriptors were extracted from: named containers become
/// groups, sequences stay sequences.
#[derive(Debug)]
pub enum UploadNode {
    File(Box<dyn UploadedFile>),
    Group(BTreeMap<String, UploadNode>),
    Sequence(Vec<UploadNode>),
}

impl UploadNode {
    pub fn as_file(&self) -> Option<&dyn UploadedFile> {
        match self {
            UploadNode::File(file) => Some(file.as_ref()),
            _ => None,
        }
    }

    pub fn as_group(&self) -> Option<&BTreeMap<String, UploadNode>> {
        match self {
            UploadNode::Group(children) => Some(children),
            _ => None,
        }
    }

    pub fn as_sequence(&self) -> Option<&[UploadNode]> {
        match self {
            UploadNode::Sequence(items) => Some(items),
            _ => None,
        }
    }

    fn container_for(segment: &str) -> Self {
        if segment.parse::<usize>().is_ok() {
            UploadNode::Sequence(Vec::new())
        } else {
            UploadNode::Group(BTreeMap::new())
        }
    }
}

/// Insert an entity at a dotted path, creating intermediate containers. A
/// numeric segment addresses a sequence position, any other segment a group
/// key.
pub fn insert_at_path(
    tree: &mut BTreeMap<String, UploadNode>,
    path: &str,
    file: Box<dyn UploadedFile>,
) {
    let segments: Vec<&str> = path.split('.').filter(|s| !s.is_empty()).collect();
    match segments.as_slice() {
        [] => {}
        [leaf] => {
            tree.insert((*leaf).to_string(), UploadNode::File(file));
        }
        [head, rest @ ..] => {
            let entry = tree
                .entry((*head).to_string())
                .or_insert_with(|| UploadNode::container_for(rest[0]));
            insert_in_node(entry, rest, file);
        }
    }
}

fn insert_in_node(node: &mut UploadNode, segments: &[&str], file: Box<dyn UploadedFile>) {
    let Some((&head, rest)) = segments.split_first() else {
        return;
    };

    if let (UploadNode::Sequence(items), Ok(index)) = (&mut *node, head.parse::<usize>()) {
        if rest.is_empty() {
            if index < items.len() {
                items[index] = UploadNode::File(file);
            } else {
                items.push(UploadNode::File(file));
            }
            return;
        }
        let len = items.len();
        let slot = if index < len {
            &mut items[index]
        } else {
            items.push(UploadNode::container_for(rest[0]));
            &mut items[len]
        };
        insert_in_node(slot, rest, file);
        return;
    }

    // a conflicting node on the way is replaced by a group
    if node.as_group().is_none() {
        *node = UploadNode::Group(BTreeMap::new());
    }
    if let UploadNode::Group(children) = node {
        if rest.is_empty() {
            children.insert(head.to_string(), UploadNode::File(file));
            return;
        }
        let entry = children
            .entry(head.to_string())
            .or_insert_with(|| UploadNode::container_for(rest[0]));
        insert_in_node(entry, rest, file);
    }
}

/// Rebuild descriptors from an uploaded-files tree, keyed by dotted path.
///
/// Fails on the first entity that does not expose its temporary location;
/// silently emitting an empty descriptor would lose data.
pub fn descriptors_from_tree(
    tree: &BTreeMap<String, UploadNode>,
) -> BridgeResult<Vec<(String, UploadDescriptor)>> {
    let mut descriptors = Vec::new();
    walk_tree(tree, "", &mut descriptors)?;
    Ok(descriptors)
}

fn walk_tree(
    tree: &BTreeMap<String, UploadNode>,
    prefix: &str,
    descriptors: &mut Vec<(String, UploadDescriptor)>,
) -> BridgeResult<()> {
    for (key, node) in tree {
        let path = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };
        walk_node(node, &path, descriptors)?;
    }
    Ok(())
}

fn walk_node(
    node: &UploadNode,
    path: &str,
    descriptors: &mut Vec<(String, UploadDescriptor)>,
) -> BridgeResult<()> {
    match node {
        UploadNode::File(file) => {
            let temp_path = file
                .temp_path()
                .ok_or_else(|| TransformError::UploadRoundTripUnsupported {
                    path: path.to_string(),
                })?;
            descriptors.push((
                path.to_string(),
                UploadDescriptor {
                    tmp_name: temp_path.display().to_string(),
                    name: file.client_filename().to_string(),
                    size: file.size(),
                    error: file.error(),
                    media_type: file.media_type().map(str::to_string),
                },
            ));
            Ok(())
        }
        UploadNode::Group(children) => walk_tree(children, path, descriptors),
        UploadNode::Sequence(items) => {
            for (index, child) in items.iter().enumerate() {
                walk_node(child, &format!("{path}.{index}"), descriptors)?;
            }
            Ok(())
        }
    }
}

/// Default uploaded-file entity. Keeps the full descriptor, including the
/// temporary location, so descriptors round-trip.
#[derive(Debug, Clone)]
pub struct TempFileUpload {
    temp_path: PathBuf,
    client_filename: String,
    size: Option<u64>,
    error: Option<u32>,
    media_type: Option<String>,
}

impl TempFileUpload {
    pub fn from_descriptor(descriptor: &UploadDescriptor) -> Self {
        Self {
            temp_path: PathBuf::from(&descriptor.tmp_name),
            client_filename: descriptor.name.clone(),
            size: descriptor.size,
            error: descriptor.error,
            media_type: descriptor.media_type.clone(),
        }
    }
}

impl UploadedFile for TempFileUpload {
    fn client_filename(&self) -> &str {
        &self.client_filename
    }

    fn size(&self) -> Option<u64> {
        self.size
    }

    fn error(&self) -> Option<u32> {
        self.error
    }

    fn media_type(&self) -> Option<&str> {
        self.media_type.as_deref()
    }

    fn temp_path(&self) -> Option<&Path> {
        Some(&self.temp_path)
    }
}
