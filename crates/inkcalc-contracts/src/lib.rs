pub mod models;
pub mod prompt;
pub mod records;
pub mod recovery;
pub mod variables;

pub use prompt::{build_prompt, PromptVariant};
pub use records::{ProblemType, ResultValue, SolutionRecord, StepRecord};
pub use recovery::{parse_reply, ParsedReply, Recovery};
pub use variables::VariableBindings;
