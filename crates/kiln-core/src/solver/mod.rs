//! Optimizing SAT-based concretizer.
//!
//! Every choice the concretizer can make (which packages appear, which
//! version, compiler, architecture and variant values each one takes, which
//! dependency edges are active) is one boolean variable. Recipes and the
//! request become clauses over those variables, and soft preferences become
//! a lexicographic cost. The solver returns the cheapest assignment.
//!
//! # Architecture
//!
//! - [`Request`]: Root specs, pins and request-wide switches
//! - [`ConstraintCompiler`]: Closure over reachable recipes and clause generation
//! - [`VariableTable`]: Node, attribute-value and edge variables
//! - [`RuleSet`]: Clauses, each tagged with where it came from
//! - [`CostModel`]: Weighted literals ranked by the [`Policy`]
//! - [`Solver`]: CDCL search with branch-and-bound optimization
//! - [`Problem`]: Minimal explanation when no assignment exists
//!
//! # Algorithm Overview
//!
//! 1. **Closure**: Breadth-first walk from the roots through every recipe
//!    edge whose condition is not already violated by the request
//! 2. **Compilation**: One domain per attribute per node, exactly-one
//!    constraints, edge activation and requirement clauses, conflicts
//! 3. **Search**: Unit propagation, preference-ordered decisions, first-UIP
//!    learning and backjumping
//! 4. **Optimization**: Each solution adds a bound clause until no cheaper
//!    assignment remains
//! 5. **Explanation**: Deletion-based reduction of the recipe and request
//!    rules to an irreducible unsatisfiable subset
//!
//! # Example
//!
//! ```ignore
//! use kiln_core::solver::{ConstraintCompiler, Policy, Request, Solver, SolverOptions};
//!
//! let request = Request::parse(&["hdf5@1.14 +mpi"])?;
//! let policy = Policy::default();
//! let system = ConstraintCompiler::new(&registry, &policy).compile(&request)?;
//!
//! let options = SolverOptions::default();
//! match Solver::new(&system, &options).solve() {
//!     Ok(solution) => println!("cost {}", solution.cost),
//!     Err(e) => println!("No solution: {}", e),
//! }
//! ```

mod compiler;
mod decisions;
mod policy;
mod problem;
mod request;
mod rule;
mod rule_set;
mod solver;
mod variables;
mod watch_graph;


pub use compiler::{ConstraintCompiler, ConstraintSystem};
pub use decisions::Decisions;
pub use policy::{CostCategory, CostModel, CostTerm, CostVector, Policy};
pub use problem::{Problem, ProblemRule};
pub use request::Request;
pub use rule::{Literal, Rule, RuleType};
pub use rule_set::RuleSet;
pub use solver::{CancelToken, Solution, SolveMode, SolveStats, Solver, SolverOptions};
pub use variables::{
    Attribute, Choice, Domain, DomainValue, EdgeVar, Instance, NodeKey, NodeVars, VarId,
    VariableTable,
};
