//! Entry point tying compilation, search and reconciliation together

use std::time::Instant;

use crate::config::Config;
use crate::error::Result;
use crate::graph::{ConcreteGraph, Reconciler};
use crate::recipe::RecipeRepository;
use crate::solver::{ConstraintCompiler, Policy, Request, Solver, SolverOptions};

/// Concretizes requests against one read-only recipe repository.
///
/// A `Concretizer` holds no mutable state, so one instance can serve
/// several threads at once.
pub struct Concretizer<'a> {
    repo: &'a dyn RecipeRepository,
    policy: Policy,
    options: SolverOptions,
}

impl<'a> Concretizer<'a> {
    pub fn new(repo: &'a dyn RecipeRepository) -> Self {
        Self {
            repo,
            policy: Policy::default(),
            options: SolverOptions::default(),
        }
    }

    /// Policy and solver options taken from a loaded [`Config`]
    pub fn from_config(repo: &'a dyn RecipeRepository, config: &Config) -> Result<Self> {
        Ok(Self::new(repo)
            .with_policy(config.policy()?)
            .with_options(config.solver_options()))
    }

    pub fn with_policy(mut self, policy: Policy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_options(mut self, options: SolverOptions) -> Self {
        self.options = options;
        self
    }

    pub fn policy(&self) -> &Policy {
        &self.policy
    }

    pub fn options(&self) -> &SolverOptions {
        &self.options
    }

    /// Concretize all roots of `request` together into one graph
    pub fn concretize(&self, request: &Request) -> Result<ConcreteGraph> {
        let start = Instant::now();
        let system = ConstraintCompiler::new(self.repo, &self.policy).compile(request)?;
        let solution = Solver::new(&system, &self.options).solve()?;
        let graph = Reconciler::new(self.repo, &system).reconcile(&solution, request)?;

        log::info!(
            "Concretized {} into {} nodes in {:?} ({} iterations)",
            request.root_names().collect::<Vec<_>>().join(" "),
            graph.len(),
            start.elapsed(),
            solution.stats.iterations
        );
        Ok(graph)
    }

    /// Concretize independent requests concurrently, one result per request
    /// in input order
    pub fn concretize_separately(&self, requests: &[Request]) -> Vec<Result<ConcreteGraph>> {
        if requests.len() < 2 {
            return requests.iter().map(|r| self.concretize(r)).collect();
        }
        std::thread::scope(|scope| {
            let handles: Vec<_> = requests
                .iter()
                .map(|request| scope.spawn(move || self.concretize(request)))
                .collect();
            handles
                .into_iter()
                .map(|handle| match handle.join() {
                    Ok(result) => result,
                    Err(panic) => std::panic::resume_unwind(panic),
                })
                .collect()
        })
    }
}
