//! Iterations and realizations.
//!
//! Neither is indexed as a document of its own. Each is represented by the
//! shared metadata sections of one of its members, and searches through a
//! context scoped by its uuid.

use crate::client::SearchBackend;
use crate::config::SearchSettings;
use crate::error::{ExplorerError, Result};
use crate::objects::document::Document;
use crate::search::{Query, SearchContext};
use serde_json::json;
use std::sync::Arc;

const ITERATION_UUID_FIELD: &str = "fmu.iteration.uuid.keyword";
const REALIZATION_UUID_FIELD: &str = "fmu.realization.uuid.keyword";

const SHARED_SECTIONS: [&str; 6] = [
    "$schema",
    "source",
    "version",
    "access",
    "masterdata",
    "fmu.case",
];

/// Metadata accessors every ensemble member shares with its case
macro_rules! case_accessors {
    () => {
        pub fn case_uuid(&self) -> Option<&str> {
            self.document.get_str("fmu.case.uuid")
        }

        pub fn case_name(&self) -> Option<&str> {
            self.document.get_str("fmu.case.name")
        }

        pub fn user(&self) -> Option<&str> {
            self.document.get_str("fmu.case.user.id")
        }

        pub fn asset(&self) -> Option<&str> {
            self.document.get_str("access.asset.name")
        }

        pub fn field(&self) -> Option<&str> {
            self.document.get_str("masterdata.smda.field[0].identifier")
        }
    };
}

/// Fetch the shared sections of one document where `field` equals `uuid`
async fn representative(
    backend: &Arc<dyn SearchBackend>,
    field: &str,
    uuid: &str,
    sections: &[&str],
) -> Result<Option<Document>> {
    let body = json!({
        "query": { "term": { field: uuid } },
        "size": 1,
        "_source": sections,
    });
    let response = backend.search(&body).await?;
    Ok(response["hits"]["hits"]
        .as_array()
        .and_then(|hits| hits.first())
        .map(|hit| Document::new(uuid, hit["_source"].clone())))
}

fn scoped(
    backend: Arc<dyn SearchBackend>,
    settings: Arc<SearchSettings>,
    field: &str,
    uuid: &str,
) -> SearchContext {
    let query = Query::new(vec![json!({ "term": { field: uuid } })], Vec::new());
    SearchContext::with_query(backend, settings, query)
}

/// One iteration (ensemble) of a case
pub struct Iteration {
    document: Document,
    context: SearchContext,
}

impl Iteration {
    pub(crate) async fn find(
        backend: Arc<dyn SearchBackend>,
        settings: Arc<SearchSettings>,
        uuid: &str,
    ) -> Result<Self> {
        let mut sections = SHARED_SECTIONS.to_vec();
        sections.push("fmu.iteration");
        let document = representative(&backend, ITERATION_UUID_FIELD, uuid, &sections)
            .await?
            .ok_or_else(|| ExplorerError::NotFound(format!("Iteration not found: {}", uuid)))?;
        Ok(Self {
            context: scoped(backend, settings, ITERATION_UUID_FIELD, uuid),
            document,
        })
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn uuid(&self) -> &str {
        self.document.id()
    }

    pub fn name(&self) -> Option<&str> {
        self.document.get_str("fmu.iteration.name")
    }

    case_accessors!();

    /// Search context restricted to this iteration
    pub fn context(&self) -> &SearchContext {
        &self.context
    }
}

/// One realization of an iteration
pub struct Realization {
    document: Document,
    context: SearchContext,
}

impl Realization {
    pub(crate) async fn find(
        backend: Arc<dyn SearchBackend>,
        settings: Arc<SearchSettings>,
        uuid: &str,
    ) -> Result<Self> {
        let mut sections = SHARED_SECTIONS.to_vec();
        sections.extend(["fmu.iteration", "fmu.realization"]);
        let document = representative(&backend, REALIZATION_UUID_FIELD, uuid, &sections)
            .await?
            .ok_or_else(|| ExplorerError::NotFound(format!("Realization not found: {}", uuid)))?;
        Ok(Self {
            context: scoped(backend, settings, REALIZATION_UUID_FIELD, uuid),
            document,
        })
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn uuid(&self) -> &str {
        self.document.id()
    }

    pub fn name(&self) -> Option<&str> {
        self.document.get_str("fmu.realization.name")
    }

    /// Realization number within its iteration
    pub fn realization_id(&self) -> Option<i64> {
        self.document.get_i64("fmu.realization.id")
    }

    pub fn iteration_uuid(&self) -> Option<&str> {
        self.document.get_str("fmu.iteration.uuid")
    }

    pub fn iteration_name(&self) -> Option<&str> {
        self.document.get_str("fmu.iteration.name")
    }

    case_accessors!();

    /// Search context restricted to this realization
    pub fn context(&self) -> &SearchContext {
        &self.context
    }
}

impl std::fmt::Debug for Iteration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Iteration").field("document", &self.document).finish()
    }
}

impl std::fmt::Debug for Realization {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Realization").field("document", &self.document).finish()
    }
}
