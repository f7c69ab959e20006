use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::records::{ResultValue, SolutionRecord};

/// Variable name to last-known value, held by the caller and sent with every
/// request. The service only reads it; callers fold assignment records back in
/// with [`VariableBindings::absorb`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "IndexMap<String, Value>")]
pub struct VariableBindings(IndexMap<String, ResultValue>);

impl VariableBindings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&ResultValue> {
        self.0.get(name)
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<ResultValue>) {
        self.0.insert(name.into(), value.into());
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ResultValue)> {
        self.0.iter()
    }

    /// Records every assignment in `records`, later ones overwriting earlier
    /// ones. Returns how many bindings were written.
    pub fn absorb(&mut self, records: &[SolutionRecord]) -> usize {
        let mut written = 0;
        for record in records.iter().filter(|record| record.is_assignment) {
            self.0
                .insert(record.expression.clone(), record.result.clone());
            written += 1;
        }
        written
    }

    /// Pretty JSON embedded in the prompt.
    pub fn to_prompt_json(&self) -> String {
        serde_json::to_string_pretty(&self.0).unwrap_or_else(|_| "{}".to_string())
    }
}

impl From<IndexMap<String, Value>> for VariableBindings {
    fn from(raw: IndexMap<String, Value>) -> Self {
        Self(
            raw.into_iter()
                .map(|(name, value)| (name, ResultValue::from_json(Some(&value))))
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn assignments_update_bindings() {
        let mut bindings = VariableBindings::new();
        let written = bindings.absorb(&[
            SolutionRecord::assignment("x", "4"),
            SolutionRecord::assignment("y", "5"),
            SolutionRecord::new("x + y", "9"),
        ]);
        assert_eq!(written, 2);
        assert_eq!(bindings.len(), 2);
        assert_eq!(bindings.get("x"), Some(&ResultValue::text("4")));
        assert_eq!(bindings.get("y"), Some(&ResultValue::text("5")));
        assert_eq!(bindings.get("x + y"), None);
    }

    #[test]
    fn non_assignments_leave_bindings_alone() {
        let mut bindings = VariableBindings::new();
        bindings.insert("x", 4);
        bindings.absorb(&[SolutionRecord::new("x", "100")]);
        assert_eq!(bindings.get("x"), Some(&ResultValue::from(4)));
    }

    #[test]
    fn later_assignment_wins() {
        let mut bindings = VariableBindings::new();
        bindings.absorb(&[
            SolutionRecord::assignment("x", 1),
            SolutionRecord::assignment("x", 2),
        ]);
        assert_eq!(bindings.get("x"), Some(&ResultValue::from(2)));
    }

    #[test]
    fn deserializes_strings_and_numbers() -> anyhow::Result<()> {
        let bindings: VariableBindings =
            serde_json::from_value(json!({"x": 4, "y": "5", "z": 1.5}))?;
        assert_eq!(bindings.get("x"), Some(&ResultValue::from(4)));
        assert_eq!(bindings.get("y"), Some(&ResultValue::text("5")));
        assert_eq!(bindings.get("z").map(ResultValue::as_text), Some("1.5".to_string()));
        assert_eq!(serde_json::to_value(&bindings)?, json!({"x": 4, "y": "5", "z": 1.5}));
        Ok(())
    }

    #[test]
    fn prompt_json_keeps_insertion_order() {
        let mut bindings = VariableBindings::new();
        bindings.insert("b", 2);
        bindings.insert("a", "1");
        assert_eq!(bindings.to_prompt_json(), "{\n  \"b\": 2,\n  \"a\": \"1\"\n}");
        assert_eq!(VariableBindings::new().to_prompt_json(), "{}");
    }
}
