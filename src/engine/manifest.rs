//! Engine implementation that records calls into a manifest.
//!
//! Node ids are handed out contiguously from 1 in creation order and spread
//! round-robin over processes, matching how the engine assigns them. That
//! keeps local population counts and the frozen-pool interleaving observable
//! without running the engine itself.

use log::debug;
use serde::Serialize;

use crate::engine::{
    EngineError, KernelSettings, ModelParams, PopulationHandle, RuleSpec, SimulationEngine,
    SynapseSpec,
};

/// One call issued against the engine
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "call", rename_all = "snake_case")]
pub enum EngineCall {
    ConfigureKernel {
        settings: KernelSettings,
    },
    Create {
        handle: PopulationHandle,
        model: String,
        count: u64,
        params: ModelParams,
    },
    SetFrozen {
        population: PopulationHandle,
        frozen: bool,
    },
    Slice {
        handle: PopulationHandle,
        parent: PopulationHandle,
        offset: u64,
        stride: u64,
        count: u64,
    },
    Connect {
        source: PopulationHandle,
        target: PopulationHandle,
        rule: RuleSpec,
        synapse: SynapseSpec,
    },
    CreateRecorder {
        handle: PopulationHandle,
    },
    Record {
        population: PopulationHandle,
        count: u64,
        recorder: PopulationHandle,
    },
    Simulate {
        duration_ms: f64,
    },
}

/// Node ids `first_node_id + k * stride` for `k < count`
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
struct NodeRange {
    first_node_id: u64,
    stride: u64,
    count: u64,
}

impl NodeRange {
    fn node_id(&self, k: u64) -> u64 {
        self.first_node_id + k * self.stride
    }
}

/// Everything the downstream runner needs to replay the run
#[derive(Debug, Serialize)]
pub struct EngineManifest<'a> {
    pub num_processes: u64,
    pub rank: u64,
    pub network_size: u64,
    pub num_connections: u64,
    pub simulated_ms: f64,
    pub calls: &'a [EngineCall],
}

/// Engine that records calls instead of executing them
#[derive(Debug)]
pub struct ManifestEngine {
    num_processes: u64,
    rank: u64,
    kernel: Option<KernelSettings>,
    populations: Vec<NodeRange>,
    next_node_id: u64,
    connections: u64,
    simulated_ms: f64,
    calls: Vec<EngineCall>,
}

impl ManifestEngine {
    /// Engine view of process `rank` out of `num_processes`
    pub fn new(num_processes: u64, rank: u64) -> Self {
        let num_processes = num_processes.max(1);
        Self {
            num_processes,
            rank: rank % num_processes,
            kernel: None,
            populations: Vec::new(),
            next_node_id: 1,
            connections: 0,
            simulated_ms: 0.0,
            calls: Vec::new(),
        }
    }

    pub fn single_process() -> Self {
        Self::new(1, 0)
    }

    pub fn calls(&self) -> &[EngineCall] {
        &self.calls
    }

    pub fn kernel(&self) -> Option<&KernelSettings> {
        self.kernel.as_ref()
    }

    /// Simulated time accumulated over all `simulate` calls
    pub fn simulated_ms(&self) -> f64 {
        self.simulated_ms
    }

    /// Node id of neuron `k` of a population
    pub fn node_id(&self, population: PopulationHandle, k: u64) -> Result<u64, EngineError> {
        let range = self.range(population)?;
        if k >= range.count {
            return Err(EngineError::Call(format!(
                "{:?} has no neuron {}",
                population, k
            )));
        }
        Ok(range.node_id(k))
    }

    pub fn manifest(&self) -> EngineManifest<'_> {
        EngineManifest {
            num_processes: self.num_processes,
            rank: self.rank,
            network_size: self.network_size(),
            num_connections: self.connections,
            simulated_ms: self.simulated_ms,
            calls: &self.calls,
        }
    }

    fn range(&self, population: PopulationHandle) -> Result<&NodeRange, EngineError> {
        self.populations
            .get(population.0)
            .ok_or(EngineError::UnknownPopulation(population))
    }

    fn require_kernel(&self) -> Result<(), EngineError> {
        self.kernel
            .as_ref()
            .map(|_| ())
            .ok_or(EngineError::KernelNotConfigured)
    }

    fn allocate(&mut self, count: u64) -> Result<PopulationHandle, EngineError> {
        let next_node_id = self
            .next_node_id
            .checked_add(count)
            .ok_or_else(|| EngineError::Call(format!("cannot create {} more nodes", count)))?;
        let handle = PopulationHandle(self.populations.len());
        self.populations.push(NodeRange {
            first_node_id: self.next_node_id,
            stride: 1,
            count,
        });
        self.next_node_id = next_node_id;
        Ok(handle)
    }

    fn add_connections(&mut self, count: Option<u64>) -> Result<(), EngineError> {
        self.connections = count
            .and_then(|c| self.connections.checked_add(c))
            .ok_or_else(|| EngineError::Call("connection count overflows u64".to_string()))?;
        Ok(())
    }
}

impl SimulationEngine for ManifestEngine {
    fn configure_kernel(&mut self, settings: &KernelSettings) -> Result<(), EngineError> {
        self.kernel = Some(settings.clone());
        self.calls.push(EngineCall::ConfigureKernel {
            settings: settings.clone(),
        });
        Ok(())
    }

    fn create(
        &mut self,
        model: &str,
        count: u64,
        params: &ModelParams,
    ) -> Result<PopulationHandle, EngineError> {
        self.require_kernel()?;
        let handle = self.allocate(count)?;
        debug!("Created {} {} neurons as {:?}", count, model, handle);
        self.calls.push(EngineCall::Create {
            handle,
            model: model.to_string(),
            count,
            params: params.clone(),
        });
        Ok(handle)
    }

    fn set_frozen(&mut self, population: PopulationHandle, frozen: bool) -> Result<(), EngineError> {
        self.range(population)?;
        self.calls.push(EngineCall::SetFrozen { population, frozen });
        Ok(())
    }

    fn slice(
        &mut self,
        population: PopulationHandle,
        offset: u64,
        stride: u64,
        count: u64,
    ) -> Result<PopulationHandle, EngineError> {
        let parent = *self.range(population)?;
        let stop = count.saturating_mul(stride).saturating_add(offset);
        let last = match count {
            0 => Some(offset),
            _ => (count - 1).checked_mul(stride).and_then(|s| s.checked_add(offset)),
        };
        let fits = stride > 0 && last.map_or(false, |last| count == 0 || last < parent.count);
        if !fits {
            return Err(EngineError::InvalidSlice {
                offset,
                stop,
                stride,
                size: parent.count,
            });
        }

        let handle = PopulationHandle(self.populations.len());
        self.populations.push(NodeRange {
            first_node_id: parent.node_id(offset),
            stride: parent.stride * stride,
            count,
        });
        self.calls.push(EngineCall::Slice {
            handle,
            parent: population,
            offset,
            stride,
            count,
        });
        Ok(handle)
    }

    fn connect(
        &mut self,
        source: PopulationHandle,
        target: PopulationHandle,
        rule: &RuleSpec,
        synapse: &SynapseSpec,
    ) -> Result<(), EngineError> {
        self.range(source)?;
        let target_count = self.range(target)?.count;
        let RuleSpec::FixedIndegree { indegree, .. } = *rule;
        self.add_connections(target_count.checked_mul(indegree))?;
        self.calls.push(EngineCall::Connect {
            source,
            target,
            rule: *rule,
            synapse: synapse.clone(),
        });
        Ok(())
    }

    fn create_recorder(&mut self) -> Result<PopulationHandle, EngineError> {
        self.require_kernel()?;
        let handle = self.allocate(1)?;
        self.calls.push(EngineCall::CreateRecorder { handle });
        Ok(handle)
    }

    fn record(
        &mut self,
        population: PopulationHandle,
        count: u64,
        recorder: PopulationHandle,
    ) -> Result<(), EngineError> {
        self.range(population)?;
        self.range(recorder)?;
        self.add_connections(Some(count))?;
        self.calls.push(EngineCall::Record {
            population,
            count,
            recorder,
        });
        Ok(())
    }

    fn local_population(&self, population: PopulationHandle) -> Result<u64, EngineError> {
        let range = self.range(population)?;
        if self.num_processes == 1 {
            return Ok(range.count);
        }
        Ok((0..range.count)
            .filter(|&k| range.node_id(k) % self.num_processes == self.rank)
            .count() as u64)
    }

    fn simulate(&mut self, duration_ms: f64) -> Result<(), EngineError> {
        self.require_kernel()?;
        if !(duration_ms.is_finite() && duration_ms >= 0.0) {
            return Err(EngineError::Call(format!(
                "cannot simulate for {} ms",
                duration_ms
            )));
        }
        self.simulated_ms += duration_ms;
        self.calls.push(EngineCall::Simulate { duration_ms });
        Ok(())
    }

    fn network_size(&self) -> u64 {
        self.next_node_id - 1
    }

    fn num_connections(&self) -> u64 {
        self.connections
    }
}
