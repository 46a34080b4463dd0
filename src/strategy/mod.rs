// Decision core: signal evaluation and action selection
pub mod evaluator;
pub mod selector;

pub use evaluator::{EvaluatorConfig, SignalEvaluator};
pub use selector::{dca_amount, select_action, SelectorConfig};
