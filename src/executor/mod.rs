//! Query execution module
//!
//! This module contains predicate evaluation, the structured command contract,
//! and the executor.

pub mod command;
pub mod executor;
pub mod predicate;

pub use command::{Command, CommandKind, CommandValues, Projection};
pub use executor::QueryResult;
pub use predicate::{Clause, Operator, Predicate};
