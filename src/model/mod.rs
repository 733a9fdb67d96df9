//! Domain rules: which equations are active and which inputs matter.
pub mod activation;
pub mod condition;
pub mod masking;

pub use activation::{ActivationPlan, ActivationRules, Activator};
pub use condition::Condition;
pub use masking::MaskRules;
