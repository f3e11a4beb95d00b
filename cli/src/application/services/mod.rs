//! Application services: use-case orchestration.
//!
//! Each service module implements a single use-case by composing domain logic
//! with port trait calls. Services import only from `crate::domain` and
//! `crate::application::ports`, never from `crate::infra`, `crate::commands`,
//! or `crate::output`.

pub mod cluster_down;
pub mod cluster_up;
pub mod parallel;
pub mod readiness;
pub mod relay;
pub mod tunnel;
