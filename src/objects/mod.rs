//! Typed wrappers for indexed documents.
//!
//! Every hit carries a `class` discriminant. [`SumoObject::from_document`]
//! looks the class up in a constructor registry and builds the matching
//! variant; capabilities such as [`SumoObject::blob`] are dispatched on the
//! variant rather than through a type hierarchy.

mod case;
mod child;
mod document;
mod iteration;

pub use case::{Case, CaseOverview, IterationSummary};
pub use child::{BlobDecoder, Child, Cube, Dictionary, Polygons, Surface, Table};
pub use document::Document;
pub use iteration::{Iteration, Realization};

use crate::client::SearchBackend;
use crate::config::SearchSettings;
use crate::error::{ExplorerError, Result};
use bytes::Bytes;
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::sync::Arc;

/// Everything a constructor needs to build a variant
pub(crate) struct ObjectParts {
    pub backend: Arc<dyn SearchBackend>,
    pub settings: Arc<SearchSettings>,
    pub document: Document,
    pub blob: Option<Bytes>,
}

type Constructor = fn(ObjectParts) -> SumoObject;

fn child(parts: ObjectParts) -> Child {
    Child::new(parts.backend, parts.document, parts.blob)
}

static CONSTRUCTORS: Lazy<HashMap<&'static str, Constructor>> = Lazy::new(|| {
    let mut registry: HashMap<&'static str, Constructor> = HashMap::new();
    registry.insert(Case::CLASS, |p| {
        SumoObject::Case(Case::new(p.backend, p.settings, p.document))
    });
    registry.insert(Cube::CLASS, |p| SumoObject::Cube(Cube::new(child(p))));
    registry.insert(Dictionary::CLASS, |p| {
        SumoObject::Dictionary(Dictionary::new(child(p)))
    });
    registry.insert(Polygons::CLASS, |p| {
        SumoObject::Polygons(Polygons::new(child(p)))
    });
    registry.insert(Surface::CLASS, |p| SumoObject::Surface(Surface::new(child(p))));
    registry.insert(Table::CLASS, |p| SumoObject::Table(Table::new(child(p))));
    registry
});

/// Classes the registry can construct
pub fn known_classes() -> Vec<&'static str> {
    let mut classes: Vec<&'static str> = CONSTRUCTORS.keys().copied().collect();
    classes.sort_unstable();
    classes
}

#[derive(Debug)]
pub enum SumoObject {
    Case(Case),
    Cube(Cube),
    Dictionary(Dictionary),
    Polygons(Polygons),
    Surface(Surface),
    Table(Table),
}

macro_rules! variant_accessors {
    ($($as_ref:ident, $into:ident => $variant:ident),* $(,)?) => {
        $(
            pub fn $as_ref(&self) -> Option<&$variant> {
                match self {
                    SumoObject::$variant(inner) => Some(inner),
                    _ => None,
                }
            }

            pub fn $into(self) -> Option<$variant> {
                match self {
                    SumoObject::$variant(inner) => Some(inner),
                    _ => None,
                }
            }
        )*
    };
}

impl SumoObject {
    pub(crate) fn from_parts(parts: ObjectParts) -> Result<Self> {
        let class = parts
            .document
            .class()
            .ok_or_else(|| ExplorerError::protocol("document class"))?;
        let constructor = CONSTRUCTORS.get(class).ok_or_else(|| {
            ExplorerError::Protocol(format!("No constructor for class {}", class))
        })?;
        Ok(constructor(parts))
    }

    /// Build the variant matching the document's class
    pub fn from_document(
        backend: Arc<dyn SearchBackend>,
        settings: Arc<SearchSettings>,
        document: Document,
    ) -> Result<Self> {
        Self::from_parts(ObjectParts {
            backend,
            settings,
            document,
            blob: None,
        })
    }

    pub fn document(&self) -> &Document {
        match self {
            SumoObject::Case(case) => case.document(),
            SumoObject::Cube(inner) => inner.document(),
            SumoObject::Dictionary(inner) => inner.document(),
            SumoObject::Polygons(inner) => inner.document(),
            SumoObject::Surface(inner) => inner.document(),
            SumoObject::Table(inner) => inner.document(),
        }
    }

    pub fn id(&self) -> &str {
        self.document().id()
    }

    pub fn class(&self) -> &'static str {
        match self {
            SumoObject::Case(_) => Case::CLASS,
            SumoObject::Cube(_) => Cube::CLASS,
            SumoObject::Dictionary(_) => Dictionary::CLASS,
            SumoObject::Polygons(_) => Polygons::CLASS,
            SumoObject::Surface(_) => Surface::CLASS,
            SumoObject::Table(_) => Table::CLASS,
        }
    }

    /// The blob-carrying part of every non-case variant
    pub fn as_child(&self) -> Option<&Child> {
        match self {
            SumoObject::Case(_) => None,
            SumoObject::Cube(inner) => Some(&**inner),
            SumoObject::Dictionary(inner) => Some(&**inner),
            SumoObject::Polygons(inner) => Some(&**inner),
            SumoObject::Surface(inner) => Some(&**inner),
            SumoObject::Table(inner) => Some(&**inner),
        }
    }

    variant_accessors! {
        as_case, into_case => Case,
        as_cube, into_cube => Cube,
        as_dictionary, into_dictionary => Dictionary,
        as_polygons, into_polygons => Polygons,
        as_surface, into_surface => Surface,
        as_table, into_table => Table,
    }

    fn require_child(&self) -> Result<&Child> {
        self.as_child().ok_or_else(|| {
            ExplorerError::Configuration(format!("{} documents carry no blob", self.class()))
        })
    }

    pub async fn blob(&self) -> Result<Bytes> {
        self.require_child()?.blob().await
    }

    pub async fn to_binary(&self) -> Result<Vec<u8>> {
        self.require_child()?.to_binary().await
    }

    pub async fn decode<D: BlobDecoder>(&self, decoder: &D) -> Result<D::Output> {
        self.require_child()?.decode(decoder).await
    }
}
