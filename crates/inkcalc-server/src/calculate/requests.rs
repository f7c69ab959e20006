use inkcalc_contracts::VariableBindings;
use serde::Deserialize;

/// Body of `POST /calculate`.
#[derive(Debug, Deserialize)]
pub struct CalculateRequest {
    /// Data URL of the drawn canvas.
    pub image: String,
    /// Absent and `null` both mean no bindings.
    #[serde(default)]
    pub dict_of_vars: Option<VariableBindings>,
    /// Overrides the server's configured prompt variant.
    #[serde(default)]
    pub step_by_step: Option<bool>,
}
