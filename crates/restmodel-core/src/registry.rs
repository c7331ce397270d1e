// ── Model registry ──
//
// Named model types and the options shared by every model. Creating a
// model cascades instance options over the registered type, the
// registry-wide options and the library defaults.

use indexmap::IndexMap;
use tracing::{debug, info};

use crate::error::CoreError;
use crate::model::Model;
use crate::record::Record;
use crate::runtime::Runtime;
use crate::settings::{Settings, SettingsLayer};

/// Type name of models created without a registered type.
pub const AD_HOC: &str = "__ad-hoc";

/// Registered model types plus the collaborators models are built with.
pub struct Registry {
    user_options: SettingsLayer,
    models: IndexMap<String, SettingsLayer>,
    runtime: Runtime,
}

impl Registry {
    pub fn new(user_options: SettingsLayer, runtime: Runtime) -> Self {
        let mut models = IndexMap::new();
        models.insert(AD_HOC.to_owned(), SettingsLayer::new());
        Self {
            user_options,
            models,
            runtime,
        }
    }

    /// Register (or replace) a model type. The event prefix defaults to
    /// the type name.
    pub fn register(&mut self, model_type: impl Into<String>, mut options: SettingsLayer) {
        let model_type = model_type.into();
        if options.event_prefix.is_none() {
            options.event_prefix = Some(model_type.clone());
        }
        info!(model_type = %model_type, actions = options.actions.len(), "registered model type");
        self.models.insert(model_type, options);
    }

    pub fn is_registered(&self, model_type: &str) -> bool {
        self.models.contains_key(model_type)
    }

    /// Registered type names, ad-hoc excluded.
    pub fn types(&self) -> impl Iterator<Item = &str> {
        self.models
            .keys()
            .map(String::as_str)
            .filter(|t| *t != AD_HOC)
    }

    pub fn runtime(&self) -> &Runtime {
        &self.runtime
    }

    /// Effective settings for a model of `model_type` with `options`.
    pub fn settings_for(
        &self,
        model_type: &str,
        options: SettingsLayer,
    ) -> Result<Settings, CoreError> {
        let registered = self
            .models
            .get(model_type)
            .cloned()
            .ok_or_else(|| CoreError::UnknownModel {
                model_type: model_type.to_owned(),
            })?;

        Settings::resolve([options, registered, self.user_options.clone()])
    }

    /// Create a model of a registered type.
    pub fn create(
        &self,
        model_type: &str,
        data: Record,
        options: SettingsLayer,
    ) -> Result<Model, CoreError> {
        let settings = self.settings_for(model_type, options)?;
        debug!(model_type, actions = settings.actions.len(), "creating model");
        Ok(Model::build(
            Some(model_type.to_owned()),
            data,
            settings,
            self.runtime.clone(),
        ))
    }

    /// Create a model with no registered type: instance options over the
    /// registry-wide options and the library defaults.
    pub fn create_ad_hoc(&self, data: Record, options: SettingsLayer) -> Result<Model, CoreError> {
        self.create(AD_HOC, data, options)
    }

    /// Create one model per record, all sharing `options`.
    pub fn create_many(
        &self,
        model_type: &str,
        records: impl IntoIterator<Item = Record>,
        options: &SettingsLayer,
    ) -> Result<Vec<Model>, CoreError> {
        records
            .into_iter()
            .map(|data| self.create(model_type, data, options.clone()))
            .collect()
    }
}
