use crate::model::{IsdAsn, Link};
use serde::{Deserialize, Serialize};

pub const BANDWIDTH: &str = "bandwidth";
pub const LATENCY: &str = "latency";
pub const OPERATES: &str = "operates";

/// Value carried by a metadata attribute. Exactly one type per attribute.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetadataValue {
    Bool(bool),
    Int32(i32),
    String(String),
}

impl MetadataValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            MetadataValue::Bool(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_i32(&self) -> Option<i32> {
        match self {
            MetadataValue::Int32(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            MetadataValue::String(value) => Some(value),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeMetadata {
    pub name: String,
    pub node: IsdAsn,
    pub value: MetadataValue,
}

impl NodeMetadata {
    pub fn new(name: impl Into<String>, node: IsdAsn, value: MetadataValue) -> Self {
        Self {
            name: name.into(),
            node,
            value,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LinkMetadata {
    pub name: String,
    pub link: Link,
    pub value: MetadataValue,
}

impl LinkMetadata {
    pub fn new(name: impl Into<String>, link: Link, value: MetadataValue) -> Self {
        Self {
            name: name.into(),
            link,
            value,
        }
    }
}

/// Node and link attributes collected for a (source, destination) pair.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    #[serde(default)]
    pub node_info: Vec<NodeMetadata>,
    #[serde(default)]
    pub link_info: Vec<LinkMetadata>,
}

impl Metadata {
    pub fn is_empty(&self) -> bool {
        self.node_info.is_empty() && self.link_info.is_empty()
    }

    /// Appends `other` after the attributes already held. No deduplication.
    pub fn extend(&mut self, other: Metadata) {
        self.node_info.extend(other.node_info);
        self.link_info.extend(other.link_info);
    }
}

/// Concatenates bundles in iteration order.
pub fn merge_metadata<I>(bundles: I) -> Metadata
where
    I: IntoIterator<Item = Metadata>,
{
    bundles.into_iter().fold(Metadata::default(), |mut out, bundle| {
        out.extend(bundle);
        out
    })
}
