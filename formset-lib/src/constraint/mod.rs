//! Constraint descriptors
//!
//! A [`Constrain`] collects the rules for a single field through chained
//! calls and hands the accumulated [`RuleSet`] to the evaluator.

mod builder;
mod kind;
mod rules;

pub use builder::*;
pub use kind::*;
pub use rules::*;
