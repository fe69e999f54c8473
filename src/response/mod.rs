//! Rule-based conditional responses

mod dispatcher;
mod model;
mod validate;

pub use dispatcher::{PublishOptions, ResponseEvent, ResponseSource, RuleDispatcher};
pub(crate) use model::duration_ms;
pub use model::{MockResponse, ResponseDefinition, Rule};
pub use validate::{validate_definition, validate_mock, validate_rule};
