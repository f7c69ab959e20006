use std::fmt;
use std::str::FromStr;

use crate::variables::VariableBindings;

/// Which reply shape the model is asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PromptVariant {
    /// `expr`, `result`, `assign` only.
    Basic,
    /// Adds `problem_type`, `steps` and `method`.
    #[default]
    Steps,
}

impl PromptVariant {
    pub fn as_str(self) -> &'static str {
        match self {
            PromptVariant::Basic => "basic",
            PromptVariant::Steps => "steps",
        }
    }

    pub fn from_step_flag(step_by_step: bool) -> Self {
        if step_by_step {
            PromptVariant::Steps
        } else {
            PromptVariant::Basic
        }
    }
}

impl fmt::Display for PromptVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PromptVariant {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "basic" | "simple" => Ok(PromptVariant::Basic),
            "steps" | "step_by_step" | "step-by-step" => Ok(PromptVariant::Steps),
            other => Err(format!(
                "unknown prompt variant '{other}' (expected basic|steps)"
            )),
        }
    }
}

const PREAMBLE: &str = "You are an expert assistant who solves mathematical problems drawn by hand in an image. \
Analyze the image and answer according to the rules below.";

const ORDER_OF_OPERATIONS: &str = "Order of operations: strictly follow PEMDAS. Evaluate parentheses first, \
then exponents, then multiplication and division from left to right, then addition and subtraction from left to right.";

const OUTPUT_RULES: &str = "Output format: reply with a JSON array of objects and nothing else. \
Quote every key and every string value with double quotes. Do not use backticks, code fences or markdown. \
Escape control characters inside strings, writing \\f as \\\\f and \\n as \\\\n.";

const BASIC_CASES: &str = r#"Cases:
1. Simple expression, e.g. 2 + 3 * 4.
   Reply: [{"expr": "2 + 3 * 4", "result": 14}]
2. System of equations, e.g. x^2 + 2x + 1 = 0 and 3y + 4x = 0.
   Reply with one entry per solved variable: [{"expr": "x", "result": -1, "assign": true}, {"expr": "y", "result": 1.3333, "assign": true}]
3. Variable assignment, e.g. x = 4, y = 5.
   Reply: [{"expr": "x", "result": 4, "assign": true}, {"expr": "y", "result": 5, "assign": true}]
   Mark every assignment with "assign": true.
4. Graphical problem: a word problem drawn as a picture (physics, geometry, charts). Use every visual cue, including colors and labels.
   Reply: [{"expr": "description of the problem", "result": "calculated answer"}]
5. Abstract concept: the drawing depicts an idea or event rather than a calculation.
   Reply: [{"expr": "explanation of the drawing", "result": "the abstract concept"}]"#;

const STEP_FIELDS: &str = r#"Every object must also carry:
- "assign": true only for variable assignments, otherwise false.
- "problem_type": one of "algebra", "calculus", "arithmetic", "geometry", "other".
- "method": the name of the technique used, e.g. "Quadratic formula".
- "steps": an ordered array of {"description": "what was done", "expression": "the expression after this step"}.
Example: [{"expr": "2x + 4 = 10", "result": "x = 3", "assign": false, "problem_type": "algebra", "method": "Linear equation solving", "steps": [{"description": "Subtract 4 from both sides", "expression": "2x = 6"}, {"description": "Divide both sides by 2", "expression": "x = 3"}]}]"#;

/// Builds the instruction sent alongside the image. The bindings are embedded
/// as pretty JSON so the model can substitute them before evaluating.
pub fn build_prompt(variant: PromptVariant, bindings: &VariableBindings) -> String {
    let mut sections = vec![
        PREAMBLE.to_string(),
        ORDER_OF_OPERATIONS.to_string(),
        format!(
            "Variables: the user has defined these variables: {}. \
If an expression in the image uses any of them, substitute the value before solving.",
            bindings.to_prompt_json()
        ),
        OUTPUT_RULES.to_string(),
        BASIC_CASES.to_string(),
    ];
    if variant == PromptVariant::Steps {
        sections.push(STEP_FIELDS.to_string());
    }
    sections.push(
        "Analyze the image and reply with the JSON array described above.".to_string(),
    );
    sections.join("\n\n")
}
