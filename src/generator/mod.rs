//! Work-item parameter sampling.
//!
//! Every pipeline work item starts from one immutable [`SampledParams`]:
//! Gaussian-distributed difficulty factors plus uniformly sampled categorical
//! choices. The params are persisted verbatim into DLQ records so a retry
//! reproduces the same semantic intent.

pub mod sampler;

pub use sampler::{ClaimType, DistractorStrategy, Domain, ParamSampler, SampledParams};
