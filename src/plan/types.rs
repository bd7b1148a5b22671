//! Connectivity plan type definitions.

use serde::Serialize;

use crate::delay::{DelayId, DelaySpec, DelayTable};
use crate::topology::{AreaId, AreaSpec, NeuronPool, TopologyParams};

/// Kind of connection between two populations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "class", rename_all = "snake_case")]
pub enum ConnectionClass {
    /// Recurrent connections of an area onto itself
    IntraArea { area: AreaId },
    /// Connections from `pre` onto `post`, with `pre != post`
    InterArea { pre: AreaId, post: AreaId },
}

impl ConnectionClass {
    /// Area the connections originate from
    pub fn source(&self) -> AreaId {
        match *self {
            ConnectionClass::IntraArea { area } => area,
            ConnectionClass::InterArea { pre, .. } => pre,
        }
    }

    /// Area receiving the connections
    pub fn target(&self) -> AreaId {
        match *self {
            ConnectionClass::IntraArea { area } => area,
            ConnectionClass::InterArea { post, .. } => post,
        }
    }

    pub fn is_inter_area(&self) -> bool {
        matches!(self, ConnectionClass::InterArea { .. })
    }
}

/// Declarative fixed in-degree rule ready to be submitted to the engine
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ConnectionRule {
    #[serde(flatten)]
    pub class: ConnectionClass,
    /// Number of incoming connections per target neuron
    pub indegree: u64,
    pub delay: DelayId,
    /// Marks inter-area rules of morphological runs for the engine
    pub long_range: bool,
}

impl ConnectionRule {
    pub fn source(&self) -> AreaId {
        self.class.source()
    }

    pub fn target(&self) -> AreaId {
        self.class.target()
    }
}

/// Every area and connection rule of a run, in submission order.
///
/// Built once and read-only afterwards. Rules do not depend on each other;
/// the order only keeps logs and engine ids reproducible.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConnectivityPlan {
    pub(crate) topology: TopologyParams,
    pub(crate) delays: DelayTable,
    pub(crate) rules: Vec<ConnectionRule>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) pool: Option<NeuronPool>,
}

impl ConnectivityPlan {
    /// Number of rules a plan over `num_areas` areas contains
    pub fn expected_rule_count(num_areas: usize) -> usize {
        num_areas + num_areas * num_areas.saturating_sub(1)
    }

    pub fn topology(&self) -> &TopologyParams {
        &self.topology
    }

    pub fn areas(&self) -> &[AreaSpec] {
        &self.topology.areas
    }

    pub fn area(&self, id: AreaId) -> Option<&AreaSpec> {
        self.topology.areas.get(id.index())
    }

    pub fn num_areas(&self) -> usize {
        self.topology.areas.len()
    }

    pub fn delays(&self) -> &DelayTable {
        &self.delays
    }

    /// Shared neuron pool, present for morphological runs only
    pub fn pool(&self) -> Option<&NeuronPool> {
        self.pool.as_ref()
    }

    pub fn rules(&self) -> &[ConnectionRule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn intra_rules(&self) -> impl Iterator<Item = &ConnectionRule> {
        self.rules.iter().filter(|r| !r.class.is_inter_area())
    }

    pub fn inter_rules(&self) -> impl Iterator<Item = &ConnectionRule> {
        self.rules.iter().filter(|r| r.class.is_inter_area())
    }

    /// Delay specification referenced by a rule
    pub fn delay(&self, rule: &ConnectionRule) -> Option<&DelaySpec> {
        self.delays.get(rule.delay)
    }

    /// Total in-degree a neuron of `area` receives over all rules
    pub fn incoming_indegree(&self, area: AreaId) -> u64 {
        self.rules
            .iter()
            .filter(|r| r.target() == area)
            .map(|r| r.indegree)
            .sum()
    }
}
