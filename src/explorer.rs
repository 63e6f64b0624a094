//! Entry point for exploring a Sumo environment

use crate::client::{SearchBackend, SumoClient};
use crate::config::{ExplorerConfig, SearchSettings};
use crate::error::{ExplorerError, Result};
use crate::objects::{Case, Iteration, Polygons, Realization, SumoObject, Surface, Table};
use crate::search::{BlockingSearchContext, SearchContext};
use serde_json::Value;
use std::sync::Arc;
use tracing::info;

/// Root of every search: owns the backend connection and a context over the
/// whole index
pub struct Explorer {
    backend: Arc<dyn SearchBackend>,
    settings: Arc<SearchSettings>,
    context: SearchContext,
}

impl Explorer {
    /// Connect to the backend described by `config`
    pub fn new(config: ExplorerConfig) -> Result<Self> {
        config.validate()?;
        let client = SumoClient::new(&config.backend)?;
        info!(base_url = %client.base_url(), "Created Sumo explorer");
        Ok(Self::with_backend(Arc::new(client), config.search))
    }

    /// Explorer over any backend implementation
    pub fn with_backend(backend: Arc<dyn SearchBackend>, settings: SearchSettings) -> Self {
        let settings = Arc::new(settings);
        Self {
            context: SearchContext::new(backend.clone(), settings.clone()),
            backend,
            settings,
        }
    }

    /// Context matching every document
    pub fn context(&self) -> &SearchContext {
        &self.context
    }

    /// Blocking facade over a fresh root context
    pub fn blocking(&self) -> Result<BlockingSearchContext> {
        BlockingSearchContext::new(SearchContext::new(
            self.backend.clone(),
            self.settings.clone(),
        ))
    }

    pub fn backend(&self) -> &Arc<dyn SearchBackend> {
        &self.backend
    }

    pub fn settings(&self) -> &SearchSettings {
        &self.settings
    }

    /// Permissions of the calling user, keyed by asset.
    ///
    /// With `asset`, fails with [`ExplorerError::PermissionDenied`] when the
    /// user has no permissions for it.
    pub async fn get_permissions(&self, asset: Option<&str>) -> Result<Value> {
        let permissions = self.backend.get_json("/userpermissions").await?;
        if let Some(asset) = asset {
            if permissions.get(asset).is_none() {
                return Err(ExplorerError::PermissionDenied(asset.to_string()));
            }
        }
        Ok(permissions)
    }

    async fn get_by_class(&self, class: &str, uuid: &str) -> Result<SumoObject> {
        let document = self.context.get_object(uuid).await?;
        if document.class() != Some(class) {
            return Err(ExplorerError::NotFound(format!(
                "Document of type {} not found: {}",
                class, uuid
            )));
        }
        self.context.to_object(document)
    }

    pub async fn get_case_by_uuid(&self, uuid: &str) -> Result<Case> {
        self.get_by_class(Case::CLASS, uuid)
            .await?
            .into_case()
            .ok_or_else(|| ExplorerError::NotFound(uuid.to_string()))
    }

    pub async fn get_surface_by_uuid(&self, uuid: &str) -> Result<Surface> {
        self.get_by_class(Surface::CLASS, uuid)
            .await?
            .into_surface()
            .ok_or_else(|| ExplorerError::NotFound(uuid.to_string()))
    }

    pub async fn get_polygons_by_uuid(&self, uuid: &str) -> Result<Polygons> {
        self.get_by_class(Polygons::CLASS, uuid)
            .await?
            .into_polygons()
            .ok_or_else(|| ExplorerError::NotFound(uuid.to_string()))
    }

    pub async fn get_table_by_uuid(&self, uuid: &str) -> Result<Table> {
        self.get_by_class(Table::CLASS, uuid)
            .await?
            .into_table()
            .ok_or_else(|| ExplorerError::NotFound(uuid.to_string()))
    }

    /// Iteration by its `fmu.iteration.uuid`
    pub async fn get_iteration_by_uuid(&self, uuid: &str) -> Result<Iteration> {
        Iteration::find(self.backend.clone(), self.settings.clone(), uuid).await
    }

    /// Realization by its `fmu.realization.uuid`
    pub async fn get_realization_by_uuid(&self, uuid: &str) -> Result<Realization> {
        Realization::find(self.backend.clone(), self.settings.clone(), uuid).await
    }
}
