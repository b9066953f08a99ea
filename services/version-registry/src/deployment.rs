//! Deployment ordering.
//!
//! Each stage runs in one region. An edge `a -> b` means `a` must complete
//! before `b` starts, e.g. "publish edge functions" before "resolve
//! pointers and wire the distribution". A valid plan is a topological
//! order; mutual references between regions show up as a cycle and are
//! rejected.

use std::collections::BTreeSet;

use crate::error::RegistryError;

/// Index of a stage in its graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StageId(usize);

/// One deployment stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stage {
    /// Unique stage name
    pub name: String,
    /// Region the stage deploys into
    pub region: String,
}

/// Stages and their "must complete before" edges.
#[derive(Debug, Clone, Default)]
pub struct DeploymentGraph {
    stages: Vec<Stage>,
    edges: BTreeSet<(StageId, StageId)>,
}

impl DeploymentGraph {
    /// Creates an empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a stage.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::DuplicateStage`] if the name is taken.
    pub fn add_stage(&mut self, name: impl Into<String>, region: impl Into<String>) -> Result<StageId, RegistryError> {
        let name = name.into();
        if self.stage_id(&name).is_some() {
            return Err(RegistryError::DuplicateStage(name));
        }
        self.stages.push(Stage {
            name,
            region: region.into(),
        });
        Ok(StageId(self.stages.len() - 1))
    }

    /// Looks a stage up by name.
    #[must_use]
    pub fn stage_id(&self, name: &str) -> Option<StageId> {
        self.stages.iter().position(|s| s.name == name).map(StageId)
    }

    /// Stage by id.
    #[must_use]
    pub fn stage(&self, id: StageId) -> Option<&Stage> {
        self.stages.get(id.0)
    }

    /// Records that `before` must complete before `after` starts.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::UnknownStage`] for a name never added.
    pub fn require_before(&mut self, before: &str, after: &str) -> Result<(), RegistryError> {
        let from = self
            .stage_id(before)
            .ok_or_else(|| RegistryError::UnknownStage(before.to_string()))?;
        let to = self
            .stage_id(after)
            .ok_or_else(|| RegistryError::UnknownStage(after.to_string()))?;
        self.edges.insert((from, to));
        Ok(())
    }

    /// Execution order.
    ///
    /// Whenever several stages are ready, the one added first runs next,
    /// including stages that only became ready after an earlier pick.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::DependencyCycle`] naming every stage that
    /// can never become ready.
    pub fn plan(&self) -> Result<Vec<&Stage>, RegistryError> {
        let mut in_degree = vec![0usize; self.stages.len()];
        for (_, to) in &self.edges {
            in_degree[to.0] += 1;
        }

        let mut ready: BTreeSet<usize> = (0..self.stages.len()).filter(|&i| in_degree[i] == 0).collect();
        let mut order = Vec::with_capacity(self.stages.len());

        while let Some(next) = ready.pop_first() {
            order.push(&self.stages[next]);
            for (from, to) in &self.edges {
                if from.0 == next {
                    in_degree[to.0] -= 1;
                    if in_degree[to.0] == 0 {
                        ready.insert(to.0);
                    }
                }
            }
        }

        if order.len() == self.stages.len() {
            Ok(order)
        } else {
            Err(RegistryError::DependencyCycle {
                stages: self
                    .stages
                    .iter()
                    .enumerate()
                    .filter(|(i, _)| in_degree[*i] > 0)
                    .map(|(_, s)| s.name.clone())
                    .collect(),
            })
        }
    }

    /// Number of stages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Whether the graph has no stages.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}
