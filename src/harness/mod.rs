//! Reference test harness core
//!
//! Fixture files embed a container template and test cases. Each test case is
//! a list of assertions: the first one rendered (or a golden image named after
//! the test id) becomes the baseline, `<rendering>` assertions must match it
//! byte for byte and `<error>` assertions must not.

pub mod compare;
pub mod composer;
pub mod diff;
pub mod parser;
pub mod renderer;
pub mod runner;
pub mod store;

pub use parser::{extract_cases, Assertion, AssertionKind, ContainerTemplate, Fixture, TestCase};
pub use renderer::{ExternalRenderer, Renderer};
pub use runner::{run, RunOptions, RunSummary, Verdict};
