#![doc = include_str!("../README.md")]

extern crate balin_primitives;

mod action;
mod bond;
mod subscription;
mod task;

pub mod bindings;
pub mod challenger;
pub mod config;
pub mod guardian;
pub mod metrics;
pub mod proof;
pub mod providers;
pub mod resolver;
pub mod submitter;
pub mod traits;
pub mod validator;

mod error;
pub use error::{is_critical, with_timeout, DisputeError};

pub mod prelude {
    pub use super::{
        action::*,
        bond::has_sufficient_bond,
        challenger::Challenger,
        config::*,
        guardian::Guardian,
        resolver::DisputeResolver,
        subscription::{EventQuery, LogWatcher},
        submitter::OutputSubmitter,
        traits::*,
        validator::Validator,
        DisputeError,
    };
}
