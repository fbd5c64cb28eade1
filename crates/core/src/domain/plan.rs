use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::domain::step::Step;
use crate::error::PlanError;

/// An ordered collection of steps plus the externally supplied inputs their
/// dependencies may refer to.
///
/// Steps keep their insertion order; [`Plan::order`] only reorders where a
/// dependency edge demands it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Plan {
    steps: Vec<Step>,
    inputs: BTreeMap<String, String>,
}

impl Plan {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a step to the plan. Fails if a step with the same name is
    /// already present.
    pub fn add_step(&mut self, step: Step) -> Result<(), PlanError> {
        if self.steps.iter().any(|s| s.name == step.name) {
            return Err(PlanError::DuplicateStep(step.name));
        }
        self.steps.push(step);
        Ok(())
    }

    /// Declare an external input: a dependency name satisfied by the caller
    /// rather than by another step (a preexisting address, a wallet, ...).
    pub fn declare_input(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.inputs.insert(name.into(), value.into());
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn step(&self, name: &str) -> Option<&Step> {
        self.steps.iter().find(|s| s.name == name)
    }

    pub fn inputs(&self) -> &BTreeMap<String, String> {
        &self.inputs
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Check the dependency graph without producing an order.
    pub fn validate(&self) -> Result<(), PlanError> {
        self.order().map(|_| ())
    }

    /// Return the steps in a dependency-respecting sequence.
    ///
    /// Kahn's algorithm; ties among independent steps break by insertion
    /// order, so the result is stable across runs. Fails with
    /// `UnresolvedDependency` if a dependency names neither a step nor a
    /// declared input, and `CyclicDependency` if the graph has a cycle.
    pub fn order(&self) -> Result<Vec<&Step>, PlanError> {
        let index_of: HashMap<&str, usize> = self
            .steps
            .iter()
            .enumerate()
            .map(|(i, s)| (s.name.as_str(), i))
            .collect();

        // In-degree counts only step-to-step edges; inputs are always
        // satisfied.
        let mut in_degree = vec![0usize; self.steps.len()];
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); self.steps.len()];

        for (i, step) in self.steps.iter().enumerate() {
            for dep in &step.depends_on {
                match index_of.get(dep.as_str()) {
                    Some(&j) => {
                        in_degree[i] += 1;
                        dependents[j].push(i);
                    }
                    None if self.inputs.contains_key(dep) => {}
                    None => {
                        return Err(PlanError::UnresolvedDependency {
                            step: step.name.clone(),
                            dependency: dep.clone(),
                        });
                    }
                }
            }
        }

        let mut emitted = vec![false; self.steps.len()];
        let mut ordered = Vec::with_capacity(self.steps.len());

        while ordered.len() < self.steps.len() {
            // Lowest insertion index among ready steps; plans are small
            // enough that the rescan does not matter.
            let next = (0..self.steps.len()).find(|&i| !emitted[i] && in_degree[i] == 0);

            let Some(i) = next else {
                let involved: Vec<String> = self
                    .steps
                    .iter()
                    .enumerate()
                    .filter(|(i, _)| !emitted[*i])
                    .map(|(_, s)| s.name.clone())
                    .collect();
                return Err(PlanError::CyclicDependency { involved });
            };

            emitted[i] = true;
            ordered.push(&self.steps[i]);
            for &d in &dependents[i] {
                in_degree[d] -= 1;
            }
        }

        Ok(ordered)
    }
}
