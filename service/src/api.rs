use hoppipolla_core::error::{ErrorCode, HoppipollaError};
use hoppipolla_core::metadata::{LinkMetadata, Metadata, MetadataValue, NodeMetadata};
use hoppipolla_core::model::{IsdAsn, Link, ResolvedPath};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PayloadError {
    #[error("invalid node identifier {value:?} in {field}")]
    InvalidNode { field: &'static str, value: String },
    #[error("invalid interface identifier {value:?} in {field}")]
    InvalidInterface { field: &'static str, value: String },
    #[error("metadata '{name}' must carry exactly one value, found {populated}")]
    AmbiguousValue { name: String, populated: usize },
}

fn parse_node(field: &'static str, value: &str) -> Result<IsdAsn, PayloadError> {
    value.trim().parse().map_err(|_| PayloadError::InvalidNode {
        field,
        value: value.to_string(),
    })
}

fn parse_interface(field: &'static str, value: &str) -> Result<u64, PayloadError> {
    value.trim().parse().map_err(|_| PayloadError::InvalidInterface {
        field,
        value: value.to_string(),
    })
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvePathsRequest {
    pub destination: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HopDto {
    #[serde(rename = "as")]
    pub node: String,
    pub interface_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathDto {
    pub src: String,
    pub dst: String,
    pub sequence: String,
    pub hops: Vec<HopDto>,
}

impl From<&ResolvedPath> for PathDto {
    fn from(path: &ResolvedPath) -> Self {
        Self {
            src: path.src.to_string(),
            dst: path.dst.to_string(),
            sequence: path.sequence(),
            hops: path
                .hops
                .iter()
                .map(|hop| HopDto {
                    node: hop.node.to_string(),
                    interface_id: hop.interface.to_string(),
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvePathsResponse {
    pub paths: Vec<PathDto>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshPathCacheResponse {}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkDto {
    pub as_a: String,
    pub if_a: String,
    pub as_b: String,
    pub if_b: String,
}

impl From<&Link> for LinkDto {
    fn from(link: &Link) -> Self {
        Self {
            as_a: link.as_a.to_string(),
            if_a: link.if_a.to_string(),
            as_b: link.as_b.to_string(),
            if_b: link.if_b.to_string(),
        }
    }
}

impl TryFrom<&LinkDto> for Link {
    type Error = PayloadError;

    fn try_from(dto: &LinkDto) -> Result<Self, Self::Error> {
        Ok(Link::new(
            parse_node("as_a", &dto.as_a)?,
            parse_interface("if_a", &dto.if_a)?,
            parse_node("as_b", &dto.as_b)?,
            parse_interface("if_b", &dto.if_b)?,
        ))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetMetadataRequest {
    pub src: String,
    pub dst: String,
    #[serde(default)]
    pub topology: Vec<LinkDto>,
}

/// The three optional value slots of a wire metadata record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueDto {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_bool: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_int32: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_string: Option<String>,
}

impl ValueDto {
    fn into_value(self, name: &str) -> Result<MetadataValue, PayloadError> {
        match (self.value_bool, self.value_int32, self.value_string) {
            (Some(value), None, None) => Ok(MetadataValue::Bool(value)),
            (None, Some(value), None) => Ok(MetadataValue::Int32(value)),
            (None, None, Some(value)) => Ok(MetadataValue::String(value)),
            (b, i, s) => Err(PayloadError::AmbiguousValue {
                name: name.to_string(),
                populated: [b.is_some(), i.is_some(), s.is_some()]
                    .iter()
                    .filter(|set| **set)
                    .count(),
            }),
        }
    }
}

impl From<&MetadataValue> for ValueDto {
    fn from(value: &MetadataValue) -> Self {
        match value {
            MetadataValue::Bool(value) => Self {
                value_bool: Some(*value),
                ..Self::default()
            },
            MetadataValue::Int32(value) => Self {
                value_int32: Some(*value),
                ..Self::default()
            },
            MetadataValue::String(value) => Self {
                value_string: Some(value.clone()),
                ..Self::default()
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeMetadataDto {
    pub name: String,
    #[serde(rename = "as")]
    pub node: String,
    #[serde(flatten)]
    pub value: ValueDto,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkMetadataDto {
    pub name: String,
    pub link: LinkDto,
    #[serde(flatten)]
    pub value: ValueDto,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetMetadataResponse {
    #[serde(default)]
    pub node_info: Vec<NodeMetadataDto>,
    #[serde(default)]
    pub link_info: Vec<LinkMetadataDto>,
}

impl From<&Metadata> for GetMetadataResponse {
    fn from(metadata: &Metadata) -> Self {
        Self {
            node_info: metadata
                .node_info
                .iter()
                .map(|entry| NodeMetadataDto {
                    name: entry.name.clone(),
                    node: entry.node.to_string(),
                    value: ValueDto::from(&entry.value),
                })
                .collect(),
            link_info: metadata
                .link_info
                .iter()
                .map(|entry| LinkMetadataDto {
                    name: entry.name.clone(),
                    link: LinkDto::from(&entry.link),
                    value: ValueDto::from(&entry.value),
                })
                .collect(),
        }
    }
}

impl GetMetadataResponse {
    /// Validates every record back into the domain representation.
    pub fn into_metadata(self) -> Result<Metadata, PayloadError> {
        let node_info = self
            .node_info
            .into_iter()
            .map(|dto| {
                let node = parse_node("as", &dto.node)?;
                let value = dto.value.into_value(&dto.name)?;
                Ok(NodeMetadata::new(dto.name, node, value))
            })
            .collect::<Result<Vec<_>, PayloadError>>()?;
        let link_info = self
            .link_info
            .into_iter()
            .map(|dto| {
                let link = Link::try_from(&dto.link)?;
                let value = dto.value.into_value(&dto.name)?;
                Ok(LinkMetadata::new(dto.name, link, value))
            })
            .collect::<Result<Vec<_>, PayloadError>>()?;
        Ok(Metadata {
            node_info,
            link_info,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: ErrorCode,
    pub message: String,
}

impl ErrorResponse {
    pub fn from_error<E: HoppipollaError>(err: &E) -> Self {
        Self {
            code: err.error_code(),
            message: err.to_string(),
        }
    }
}
