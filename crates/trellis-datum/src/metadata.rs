//! Node documents: maps that describe a piece of content.
//!
//! A node is a [`MapDatum`] whose `CONTENT` field holds the ids of the
//! content it stands for and whose `TYPE` field names how to read it. Graph
//! edges reference nodes, and the graph index keys on their `CONTENT` ids.

use std::sync::Arc;

use tracing::debug;
use trellis_crypto::CidScheme;
use trellis_store::Repo;
use trellis_types::ContentId;

use crate::error::DatumResult;
use crate::map::MapDatum;
use crate::set::SetDatum;

/// Well-known fields of a node document.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MetadataField {
    DataRenderer,
    Content,
    Type,
    Patterns,
}

impl MetadataField {
    pub const ALL: [MetadataField; 4] = [
        MetadataField::DataRenderer,
        MetadataField::Content,
        MetadataField::Type,
        MetadataField::Patterns,
    ];

    pub fn name(self) -> &'static str {
        match self {
            MetadataField::DataRenderer => "DATA_RENDERER",
            MetadataField::Content => "CONTENT",
            MetadataField::Type => "TYPE",
            MetadataField::Patterns => "PATTERNS",
        }
    }

    pub fn key(self, scheme: &dyn CidScheme) -> ContentId {
        MapDatum::field_key(scheme, self.name())
    }
}

/// How the content of a node is meant to be read.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TypeValue {
    Raw,
    Uri,
    Pattern,
    Text,
}

impl TypeValue {
    pub fn name(self) -> &'static str {
        match self {
            TypeValue::Raw => "RAW",
            TypeValue::Uri => "URI",
            TypeValue::Pattern => "PATTERN",
            TypeValue::Text => "TEXT",
        }
    }

    pub fn key(self, scheme: &dyn CidScheme) -> ContentId {
        scheme.key_for(self.name().as_bytes())
    }
}

/// Build, persist and freeze a node describing `content` as `kind`.
///
/// Field names and the type name are stored in `repo` alongside the node so
/// the node is readable from that store alone.
pub fn describe(repo: &Arc<dyn Repo>, content: ContentId, kind: TypeValue) -> DatumResult<MapDatum> {
    let node = MapDatum::new(repo.scheme())
        .build_field_ref(repo.as_ref(), MetadataField::Content.name(), content)?
        .build_field(repo.as_ref(), MetadataField::Type.name(), kind.name().as_bytes())?
        .freeze();
    let id = node.persist(repo.as_ref())?;
    debug!(node = %id.short_hex(), kind = kind.name(), "node described");
    Ok(node.bind(Arc::clone(repo)))
}

/// Store `data` in `repo` and [`describe`] it.
pub fn describe_bytes(repo: &Arc<dyn Repo>, data: &[u8], kind: TypeValue) -> DatumResult<MapDatum> {
    let content = repo.put(data)?;
    describe(repo, content, kind)
}

/// Whether `bytes` lay out as a node document: a map carrying at least one
/// [`MetadataField`] key. Raw content whose length happens to fit the map
/// record size does not qualify.
pub fn is_node(scheme: &dyn CidScheme, bytes: &[u8]) -> bool {
    let Ok(keys) = MapDatum::decode_keys(scheme, bytes) else {
        return false;
    };
    MetadataField::ALL
        .iter()
        .any(|field| keys.contains(&field.key(scheme)))
}

impl MapDatum {
    /// The `CONTENT` field of a node document.
    pub fn content(&self) -> Option<&SetDatum> {
        self.get_field(MetadataField::Content.name())
    }

    /// Whether the `TYPE` field names `kind`.
    pub fn has_type(&self, kind: TypeValue) -> bool {
        self.get_field(MetadataField::Type.name())
            .is_some_and(|types| types.contains(&kind.key(self.scheme().as_ref())))
    }
}
