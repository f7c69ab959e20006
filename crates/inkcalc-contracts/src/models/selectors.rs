use super::registry::{Capability, ModelRegistry, ModelSpec};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSelection {
    pub model: ModelSpec,
    pub requested: Option<String>,
    pub fallback_reason: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ModelSelector {
    pub registry: ModelRegistry,
}

impl ModelSelector {
    pub fn new(registry: ModelRegistry) -> Self {
        Self { registry }
    }

    /// Resolves `requested` for `capability`, falling back to the first
    /// registered model with that capability. A fallback always carries a
    /// reason suitable for logging.
    pub fn select(
        &self,
        requested: Option<&str>,
        capability: Capability,
    ) -> Result<ModelSelection, String> {
        let requested = requested.map(str::trim).filter(|value| !value.is_empty());
        let fallback_reason = match requested {
            Some(name) => match self.registry.get(name) {
                Some(model) if model.supports(capability) => {
                    return Ok(ModelSelection {
                        model: model.clone(),
                        requested: Some(name.to_string()),
                        fallback_reason: None,
                    });
                }
                Some(_) => format!("Model '{name}' does not support {capability:?} input."),
                None => format!("Model '{name}' is not a known model."),
            },
            None => "No model specified; using default.".to_string(),
        };

        let Some(model) = self.registry.by_capability(capability).into_iter().next() else {
            return Err(format!("No models available for {capability:?} input."));
        };
        Ok(ModelSelection {
            model,
            requested: requested.map(str::to_string),
            fallback_reason: Some(fallback_reason),
        })
    }
}
