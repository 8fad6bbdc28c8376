// SPDX-FileCopyrightText: 2026 Hippo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Reasoning topology: a per-session graph of reasoning steps and the bonds
//! between them, extracted from buffered conversation during maintenance.
//!
//! Each session's graph is one JSON file under `<storage_dir>/topology/`.
//! New analyses are appended to the session's graph: the first new step is
//! linked to the previous tail with an `explore` bond, and the tail moves to
//! the last new step.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use hippo_core::types::ChatMessage;
use hippo_core::{ChatModel, HippoError};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::extractor::parse_json_object;
use crate::maintenance::MaintenanceContext;
use crate::prompts::{PromptKind, PromptLibrary};

/// Topology directory under the storage root.
pub const TOPOLOGY_DIR: &str = "topology";

/// How one reasoning step relates to the next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BondKind {
    Deep,
    Reflect,
    Explore,
}

impl BondKind {
    /// Case-insensitive. Labels outside the three kinds become `Explore`.
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "deep" => BondKind::Deep,
            "reflect" => BondKind::Reflect,
            "explore" => BondKind::Explore,
            other => {
                debug!(label = other, "unknown bond label, treating as explore");
                BondKind::Explore
            }
        }
    }
}

/// What the model returns for `topology_extraction.prompt`. Every field is
/// optional so a partial answer still yields whatever steps it has.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TopologyAnalysis {
    #[serde(default)]
    pub steps: Vec<AnalysisStep>,
    #[serde(default)]
    pub bonds: Vec<AnalysisBond>,
    #[serde(default)]
    pub topology_score: f64,
    #[serde(default)]
    pub bond_distribution: BondDistribution,
    #[serde(default)]
    pub assessment: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AnalysisStep {
    pub id: i64,
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AnalysisBond {
    pub from: i64,
    pub to: i64,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub explanation: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BondDistribution {
    #[serde(rename = "D", default)]
    pub deep: f64,
    #[serde(rename = "R", default)]
    pub reflect: f64,
    #[serde(rename = "E", default)]
    pub explore: f64,
}

/// A stored reasoning step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepNode {
    pub id: String,
    pub content: String,
    /// The step number the model gave it, when it came from an analysis.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis_step: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepEdge {
    pub from: String,
    pub to: String,
    pub bond: BondKind,
}

/// One session's step/bond graph.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TopologyGraph {
    pub session_id: String,
    #[serde(default)]
    pub steps: Vec<StepNode>,
    #[serde(default)]
    pub edges: Vec<StepEdge>,
    /// Last step added, where the next analysis attaches.
    #[serde(default)]
    pub tail: Option<String>,
    /// Counts of bond kind following bond kind, keyed by the bond into the
    /// source step.
    #[serde(default)]
    pub transitions: BTreeMap<BondKind, BTreeMap<BondKind, u64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_assessment: Option<String>,
}

impl TopologyGraph {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            ..Default::default()
        }
    }

    /// Append an analysis to the graph. Returns the number of steps added.
    ///
    /// Bonds naming a step the analysis does not define, or repeating an
    /// existing edge, are dropped.
    pub fn absorb(&mut self, analysis: &TopologyAnalysis) -> usize {
        let mut ids: HashMap<i64, String> = HashMap::new();
        let mut added: Vec<String> = Vec::new();
        for step in &analysis.steps {
            let id = uuid::Uuid::new_v4().to_string();
            self.steps.push(StepNode {
                id: id.clone(),
                content: step.content.clone(),
                analysis_step: Some(step.id),
            });
            ids.insert(step.id, id.clone());
            added.push(id);
        }

        if let (Some(tail), Some(first)) = (self.tail.clone(), added.first()) {
            self.link(&tail, first, BondKind::Explore);
        }

        for bond in &analysis.bonds {
            let (Some(from), Some(to)) = (ids.get(&bond.from), ids.get(&bond.to)) else {
                debug!(from = bond.from, to = bond.to, "bond names an unknown step, dropping");
                continue;
            };
            let kind = BondKind::from_label(&bond.kind);
            let previous = self.bond_into(from);
            if self.link(from, to, kind) {
                *self
                    .transitions
                    .entry(previous)
                    .or_default()
                    .entry(kind)
                    .or_default() += 1;
            }
        }

        if let Some(last) = added.last() {
            self.tail = Some(last.clone());
        }
        if !analysis.assessment.trim().is_empty() {
            self.last_assessment = Some(analysis.assessment.trim().to_string());
        }
        added.len()
    }

    /// Add an edge unless it already exists.
    fn link(&mut self, from: &str, to: &str, bond: BondKind) -> bool {
        if self.edges.iter().any(|e| e.from == from && e.to == to) {
            return false;
        }
        self.edges.push(StepEdge {
            from: from.to_string(),
            to: to.to_string(),
            bond,
        });
        true
    }

    /// Kind of the first edge into `step`, `Explore` when there is none.
    fn bond_into(&self, step: &str) -> BondKind {
        self.edges
            .iter()
            .find(|e| e.to == step)
            .map_or(BondKind::Explore, |e| e.bond)
    }
}

/// Reads and writes session graphs under one directory.
#[derive(Debug, Clone)]
pub struct TopologyStore {
    dir: PathBuf,
}

impl TopologyStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, session_id: &str) -> PathBuf {
        self.dir.join(format!("{}.json", file_stem(session_id)))
    }

    /// Load a session's graph, or an empty one when none is stored.
    pub async fn load(&self, session_id: &str) -> Result<TopologyGraph, HippoError> {
        let path = self.path_for(session_id);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(TopologyGraph::new(session_id));
            }
            Err(e) => return Err(e.into()),
        };
        serde_json::from_slice(&bytes).map_err(|e| {
            HippoError::Corruption(format!("topology graph {}: {e}", path.display()))
        })
    }

    /// Write a session's graph, replacing the previous file atomically.
    pub async fn save(&self, graph: &TopologyGraph) -> Result<(), HippoError> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.path_for(&graph.session_id);
        let json = serde_json::to_vec_pretty(graph)
            .map_err(|e| HippoError::Internal(format!("encode topology graph: {e}")))?;
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }
}

/// Session ids are free-form; keep file names to a safe alphabet.
fn file_stem(session_id: &str) -> String {
    let stem: String = session_id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    if stem.is_empty() { "_".to_string() } else { stem }
}

/// Runs the topology step of a maintenance pass.
pub struct TopologyAnalyzer {
    prompts: Arc<PromptLibrary>,
    chat: Arc<dyn ChatModel>,
    graphs: TopologyStore,
}

impl TopologyAnalyzer {
    pub fn new(prompts: Arc<PromptLibrary>, chat: Arc<dyn ChatModel>, graphs: TopologyStore) -> Self {
        Self {
            prompts,
            chat,
            graphs,
        }
    }

    pub fn graphs(&self) -> &TopologyStore {
        &self.graphs
    }

    /// Analyze one session's conversation and append the result to its
    /// graph. Returns the number of steps added; zero when the prompt file
    /// is absent or the answer holds no usable JSON.
    pub async fn analyze(
        &self,
        ctx: &MaintenanceContext,
        session_id: &str,
        conversation: &str,
    ) -> Result<usize, HippoError> {
        if !self.prompts.has(PromptKind::TopologyExtraction).await {
            debug!("no topology extraction prompt, skipping");
            return Ok(0);
        }
        let Some(prompt) = self
            .prompts
            .render(PromptKind::TopologyExtraction, conversation)
            .await
        else {
            return Ok(0);
        };
        let response = ctx
            .generate(self.chat.as_ref(), &[ChatMessage::user(prompt)])
            .await?;
        let Some(analysis) = parse_json_object::<TopologyAnalysis>(&response, "topology") else {
            return Ok(0);
        };
        if analysis.steps.is_empty() {
            return Ok(0);
        }

        let mut graph = self.graphs.load(session_id).await?;
        let added = graph.absorb(&analysis);
        self.graphs.save(&graph).await?;
        info!(
            session_id,
            steps = added,
            total_steps = graph.steps.len(),
            score = analysis.topology_score,
            "updated reasoning topology"
        );
        Ok(added)
    }
}
