use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};

pub const UNRECOGNIZED_EXPRESSION: &str = "Unrecognized expression";
pub const UNRECOGNIZED_RESULT: &str = "Could not recognize the drawing";
pub const DEFAULT_METHOD: &str = "Standard method";
pub const RECOVERY_METHOD: &str = "Error recovery";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProblemType {
    Algebra,
    Calculus,
    Arithmetic,
    Geometry,
    #[default]
    Other,
}

impl ProblemType {
    pub const ALL: [ProblemType; 5] = [
        ProblemType::Algebra,
        ProblemType::Calculus,
        ProblemType::Arithmetic,
        ProblemType::Geometry,
        ProblemType::Other,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ProblemType::Algebra => "algebra",
            ProblemType::Calculus => "calculus",
            ProblemType::Arithmetic => "arithmetic",
            ProblemType::Geometry => "geometry",
            ProblemType::Other => "other",
        }
    }

    /// Unknown labels map to `Other`.
    pub fn from_label(raw: &str) -> Self {
        let normalized = raw.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == normalized)
            .unwrap_or_default()
    }
}

impl fmt::Display for ProblemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A computed answer. Numbers keep their JSON number form on the wire so a
/// reply of `14` is echoed back as `14`, not `"14"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResultValue {
    Number(Number),
    Text(String),
}

impl ResultValue {
    pub fn text(value: impl Into<String>) -> Self {
        ResultValue::Text(value.into())
    }

    /// Coerces any JSON value. Null and absent values become empty text;
    /// booleans, arrays and objects are rendered as compact JSON text.
    pub fn from_json(value: Option<&Value>) -> Self {
        match value {
            None | Some(Value::Null) => ResultValue::Text(String::new()),
            Some(Value::Number(number)) => ResultValue::Number(number.clone()),
            Some(Value::String(text)) => ResultValue::Text(text.clone()),
            Some(other) => ResultValue::Text(other.to_string()),
        }
    }

    pub fn as_text(&self) -> String {
        match self {
            ResultValue::Number(number) => number.to_string(),
            ResultValue::Text(text) => text.clone(),
        }
    }
}

impl fmt::Display for ResultValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResultValue::Number(number) => write!(f, "{number}"),
            ResultValue::Text(text) => f.write_str(text),
        }
    }
}

impl From<i64> for ResultValue {
    fn from(value: i64) -> Self {
        ResultValue::Number(Number::from(value))
    }
}

impl From<i32> for ResultValue {
    fn from(value: i32) -> Self {
        ResultValue::Number(Number::from(value))
    }
}

impl From<&str> for ResultValue {
    fn from(value: &str) -> Self {
        ResultValue::Text(value.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepRecord {
    pub description: String,
    pub expression: String,
}

impl StepRecord {
    fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Object(object) => Some(Self {
                description: text_field(object.get("description")),
                expression: text_field(object.get("expression")),
            }),
            Value::String(text) => Some(Self {
                description: text.trim().to_string(),
                expression: String::new(),
            }),
            _ => None,
        }
    }
}

/// One structured answer unit. Every field is always populated once a record
/// leaves [`SolutionRecord::from_model_object`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolutionRecord {
    #[serde(rename = "expr")]
    pub expression: String,
    pub result: ResultValue,
    #[serde(rename = "assign")]
    pub is_assignment: bool,
    pub problem_type: ProblemType,
    pub steps: Vec<StepRecord>,
    pub method: String,
}

impl SolutionRecord {
    pub fn new(expression: impl Into<String>, result: impl Into<ResultValue>) -> Self {
        Self {
            expression: expression.into(),
            result: result.into(),
            is_assignment: false,
            problem_type: ProblemType::Other,
            steps: Vec::new(),
            method: DEFAULT_METHOD.to_string(),
        }
    }

    pub fn assignment(name: impl Into<String>, value: impl Into<ResultValue>) -> Self {
        Self {
            is_assignment: true,
            ..Self::new(name, value)
        }
    }

    /// Placeholder returned when the model reply could not be recovered.
    pub fn unrecognized() -> Self {
        Self {
            method: RECOVERY_METHOD.to_string(),
            ..Self::new(UNRECOGNIZED_EXPRESSION, UNRECOGNIZED_RESULT)
        }
    }

    /// Builds a record from an untrusted model object, defaulting every field
    /// the model left out or filled with the wrong type.
    pub fn from_model_object(object: &Map<String, Value>) -> Self {
        let expression = text_field(object.get("expr"));
        let expression = if expression.is_empty() {
            UNRECOGNIZED_EXPRESSION.to_string()
        } else {
            expression
        };

        let steps = object
            .get("steps")
            .and_then(Value::as_array)
            .map(|items| items.iter().filter_map(StepRecord::from_json).collect())
            .unwrap_or_default();

        let method = text_field(object.get("method"));
        let method = if method.is_empty() {
            DEFAULT_METHOD.to_string()
        } else {
            method
        };

        Self {
            expression,
            result: ResultValue::from_json(object.get("result")),
            is_assignment: object.get("assign").and_then(value_as_bool).unwrap_or(false),
            problem_type: object
                .get("problem_type")
                .and_then(Value::as_str)
                .map(ProblemType::from_label)
                .unwrap_or_default(),
            steps,
            method,
        }
    }
}

fn text_field(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(text)) => text.trim().to_string(),
        Some(other) => other.to_string(),
    }
}

fn value_as_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(flag) => Some(*flag),
        Value::String(text) => match text.trim().to_ascii_lowercase().as_str() {
            "true" => Some(true),
            "false" => Some(false),
            _ => None,
        },
        _ => None,
    }
}
