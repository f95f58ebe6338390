//! LlamaStack Operator CRD Definitions
//!
//! Kubernetes Custom Resource Definitions and shared types for the
//! LlamaStack operator.

pub mod feature_flags;
pub mod llama_stack_distribution;
pub mod status;

pub use feature_flags::*;
pub use llama_stack_distribution::*;
pub use status::*;
