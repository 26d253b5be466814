//! Age progression and the tech tree.
//!
//! Ages gate which buildings may be constructed and set the production speed
//! of the buildings they introduce. Tech nodes form a prerequisite DAG paid
//! for with research points.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::config::AgesConfig;
use crate::error::SimError;

/// Settlement age tiers, in order
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Age {
    #[default]
    Stone,
    Bronze,
    Iron,
    Medieval,
}

impl Age {
    pub const ALL: [Age; 4] = [Age::Stone, Age::Bronze, Age::Iron, Age::Medieval];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn next(self) -> Option<Age> {
        Self::ALL.get(self.index() + 1).copied()
    }

    /// Production duration multiplier for buildings of this tier
    pub fn speed_multiplier(self, table: &AgesConfig) -> f32 {
        table
            .speed_multipliers
            .get(self.index())
            .copied()
            .unwrap_or(1.0)
    }
}

/// One unlockable upgrade
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TechNode {
    pub id: String,
    pub name: String,
    /// Research points required
    pub cost: u32,
    pub prerequisites: Vec<String>,
    #[serde(default)]
    pub unlocked: bool,
}

impl TechNode {
    pub fn new(id: &str, name: &str, cost: u32, prerequisites: &[&str]) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            cost,
            prerequisites: prerequisites.iter().map(|p| p.to_string()).collect(),
            unlocked: false,
        }
    }
}

/// Prerequisite graph of tech nodes
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TechTree {
    nodes: BTreeMap<String, TechNode>,
}

impl TechTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// The settlement's default research tree
    pub fn standard() -> Self {
        let mut tree = Self::new();
        tree.insert(TechNode::new("agriculture", "Agriculture", 5, &[]));
        tree.insert(TechNode::new("carpentry", "Carpentry", 5, &[]));
        tree.insert(TechNode::new("writing", "Writing", 10, &["agriculture"]));
        tree.insert(TechNode::new("metallurgy", "Metallurgy", 15, &["carpentry"]));
        tree.insert(TechNode::new(
            "navigation",
            "Navigation",
            15,
            &["carpentry", "writing"],
        ));
        tree
    }

    pub fn insert(&mut self, node: TechNode) {
        self.nodes.insert(node.id.clone(), node);
    }

    pub fn get(&self, id: &str) -> Option<&TechNode> {
        self.nodes.get(id)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &TechNode> {
        self.nodes.values()
    }

    pub fn is_unlocked(&self, id: &str) -> bool {
        self.nodes.get(id).map(|n| n.unlocked).unwrap_or(false)
    }

    /// Verify `id` can be unlocked now and return its cost
    pub fn check_unlockable(&self, id: &str) -> Result<u32, SimError> {
        let node = self
            .nodes
            .get(id)
            .ok_or_else(|| SimError::UnknownTech(id.to_string()))?;
        if node.unlocked {
            return Err(SimError::AlreadyUnlocked(id.to_string()));
        }
        let mut visiting = HashSet::new();
        self.depth_guarded(id, &mut visiting)?;
        if let Some(missing) = node.prerequisites.iter().find(|p| !self.is_unlocked(p)) {
            return Err(SimError::TechLocked {
                tech: id.to_string(),
                missing: missing.clone(),
            });
        }
        Ok(node.cost)
    }

    pub fn mark_unlocked(&mut self, id: &str) -> Result<(), SimError> {
        self.check_unlockable(id)?;
        if let Some(node) = self.nodes.get_mut(id) {
            node.unlocked = true;
        }
        Ok(())
    }

    /// Length of the longest prerequisite chain below `id`.
    ///
    /// A cycle is a modeling error: it is logged and the depth is 0.
    pub fn depth(&self, id: &str) -> usize {
        let mut visiting = HashSet::new();
        match self.depth_guarded(id, &mut visiting) {
            Ok(depth) => depth,
            Err(err) => {
                log::warn!("tech tree: {}", err);
                0
            }
        }
    }

    fn depth_guarded(&self, id: &str, visiting: &mut HashSet<String>) -> Result<usize, SimError> {
        if !visiting.insert(id.to_string()) {
            return Err(SimError::CyclicPrerequisite(id.to_string()));
        }
        let mut depth = 0;
        if let Some(node) = self.nodes.get(id) {
            for prerequisite in &node.prerequisites {
                depth = depth.max(self.depth_guarded(prerequisite, visiting)? + 1);
            }
        }
        visiting.remove(id);
        Ok(depth)
    }

    /// Ids of nodes whose prerequisite chain loops back on itself
    pub fn cyclic_nodes(&self) -> Vec<String> {
        self.nodes
            .keys()
            .filter(|id| {
                let mut visiting = HashSet::new();
                self.depth_guarded(id, &mut visiting).is_err()
            })
            .cloned()
            .collect()
    }
}
