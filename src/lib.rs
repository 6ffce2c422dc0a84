#![doc = include_str!("../README.md")]
#![warn(rustdoc::all)]
#![deny(unused_must_use, rust_2018_idioms)]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]

#[macro_use]
extern crate tracing;

pub mod error;
pub use error::{Result, VersionRange, WeaveError, WeaveIoError};

pub mod ast;

pub mod config;
pub use config::{BuildPaths, WeaveContext};

pub mod rules;
pub use rules::{Rule, RuleSet};

pub mod resolver;
pub use resolver::Dependency;

pub mod matcher;

pub mod manifest;
pub use manifest::MatchedManifest;

pub mod instrument;
pub use instrument::{RewriteResult, UnitRewriter};

pub mod interceptor;
pub use interceptor::CompileUnit;

pub mod setup;

pub mod utils;
