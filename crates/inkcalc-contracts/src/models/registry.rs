use indexmap::IndexMap;

pub const DEFAULT_VISION_MODEL: &str = "gemini-1.5-flash";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    Text,
    Vision,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSpec {
    pub name: String,
    pub provider: String,
    pub capabilities: Vec<Capability>,
    pub context_window: Option<u64>,
}

impl ModelSpec {
    pub fn supports(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }
}

/// Known models in preference order; the first vision model is the default.
#[derive(Debug, Clone)]
pub struct ModelRegistry {
    models: IndexMap<String, ModelSpec>,
}

impl Default for ModelRegistry {
    fn default() -> Self {
        Self::new(None)
    }
}

impl ModelRegistry {
    pub fn new(models: Option<IndexMap<String, ModelSpec>>) -> Self {
        Self {
            models: models.unwrap_or_else(default_models),
        }
    }

    /// Accepts both `gemini-1.5-flash` and `models/gemini-1.5-flash`.
    pub fn get(&self, name: &str) -> Option<&ModelSpec> {
        let trimmed = name.trim();
        self.models
            .get(trimmed.strip_prefix("models/").unwrap_or(trimmed))
    }

    pub fn by_capability(&self, capability: Capability) -> Vec<ModelSpec> {
        self.models
            .values()
            .filter(|model| model.supports(capability))
            .cloned()
            .collect()
    }
}

fn default_models() -> IndexMap<String, ModelSpec> {
    let mut map = IndexMap::new();

    let mut insert = |name: &str, capabilities: &[Capability], context_window: Option<u64>| {
        map.insert(
            name.to_string(),
            ModelSpec {
                name: name.to_string(),
                provider: "gemini".to_string(),
                capabilities: capabilities.to_vec(),
                context_window,
            },
        );
    };

    insert(
        DEFAULT_VISION_MODEL,
        &[Capability::Text, Capability::Vision],
        Some(1_048_576),
    );
    insert(
        "gemini-1.5-pro",
        &[Capability::Text, Capability::Vision],
        Some(2_097_152),
    );
    insert(
        "gemini-2.0-flash",
        &[Capability::Text, Capability::Vision],
        Some(1_048_576),
    );
    insert(
        "gemini-2.5-flash",
        &[Capability::Text, Capability::Vision],
        Some(1_048_576),
    );
    insert(
        "gemini-2.5-pro",
        &[Capability::Text, Capability::Vision],
        Some(1_048_576),
    );
    insert("text-embedding-004", &[Capability::Text], Some(2048));

    map
}
