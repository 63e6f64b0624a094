//! Realization-scoped and aggregated data objects

use crate::client::SearchBackend;
use crate::error::Result;
use crate::objects::document::Document;
use bytes::Bytes;
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::debug;

/// Turns a document's blob into a domain object (surface grid, table, ...)
pub trait BlobDecoder {
    type Output;

    fn decode(&self, document: &Document, blob: &[u8]) -> Result<Self::Output>;
}

macro_rules! str_properties {
    ($($name:ident => $path:literal),* $(,)?) => {
        $(
            #[doc = concat!("`", $path, "`")]
            pub fn $name(&self) -> Option<&str> {
                self.document.get_str($path)
            }
        )*
    };
}

/// A document with a binary payload
#[derive(Clone)]
pub struct Child {
    document: Document,
    backend: Arc<dyn SearchBackend>,
    blob: OnceCell<Bytes>,
}

impl Child {
    pub(crate) fn new(
        backend: Arc<dyn SearchBackend>,
        document: Document,
        blob: Option<Bytes>,
    ) -> Self {
        let blob = match blob {
            Some(bytes) => OnceCell::from(bytes),
            None => OnceCell::new(),
        };
        Self {
            document,
            backend,
            blob,
        }
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn id(&self) -> &str {
        self.document.id()
    }

    str_properties! {
        name => "data.name",
        tagname => "data.tagname",
        content => "data.content",
        casename => "fmu.case.name",
        iteration => "fmu.iteration.name",
        aggregation => "fmu.aggregation.operation",
        stage => "fmu.context.stage",
        format => "data.format",
        vertical_domain => "data.vertical_domain",
        relative_path => "file.relative_path",
    }

    pub fn realization(&self) -> Option<i64> {
        self.document.get_i64("fmu.realization.id")
    }

    pub fn stratigraphic(&self) -> Option<bool> {
        self.document.get_bool("data.stratigraphic")
    }

    /// Whether the blob is already held in memory
    pub fn has_blob(&self) -> bool {
        self.blob.initialized()
    }

    /// Binary payload, fetched on first access
    pub async fn blob(&self) -> Result<Bytes> {
        let bytes = self
            .blob
            .get_or_try_init(|| async {
                debug!(id = %self.id(), "Fetching blob");
                self.backend.blob(self.id()).await
            })
            .await?;
        Ok(bytes.clone())
    }

    pub async fn to_binary(&self) -> Result<Vec<u8>> {
        Ok(self.blob().await?.to_vec())
    }

    pub async fn decode<D: BlobDecoder>(&self, decoder: &D) -> Result<D::Output> {
        let blob = self.blob().await?;
        decoder.decode(&self.document, &blob)
    }
}

impl fmt::Debug for Child {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Child")
            .field("document", &self.document)
            .field("has_blob", &self.has_blob())
            .finish()
    }
}

macro_rules! child_kinds {
    ($($kind:ident => $class:literal),* $(,)?) => {
        $(
            #[doc = concat!("Document of class `", $class, "`")]
            #[derive(Debug, Clone)]
            pub struct $kind(Child);

            impl $kind {
                pub const CLASS: &'static str = $class;

                pub(crate) fn new(child: Child) -> Self {
                    Self(child)
                }

                pub fn into_child(self) -> Child {
                    self.0
                }
            }

            impl Deref for $kind {
                type Target = Child;

                fn deref(&self) -> &Child {
                    &self.0
                }
            }
        )*
    };
}

child_kinds! {
    Cube => "cube",
    Dictionary => "dictionary",
    Polygons => "polygons",
    Surface => "surface",
    Table => "table",
}
