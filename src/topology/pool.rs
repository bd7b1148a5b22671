//! Shared neuron pool for morphological distribution.
//!
//! In morphological mode all areas draw their neurons from one pool of
//! `max_area_population * num_areas` slots. Slots start frozen; each area
//! activates a strided slice of the pool so that neuron `i` of area `a` sits
//! at pool index `i * num_areas + a`. The engine distributes pool slots over
//! processes by index alone and never sees area boundaries; which processes
//! host an area follows from the stride.

use serde::Serialize;

use crate::topology::types::{AreaId, TopologyParams};

/// Pool index of neuron `local_index` of area `area_index`
pub fn pool_index(num_areas: usize, area_index: usize, local_index: u64) -> u64 {
    local_index * num_areas as u64 + area_index as u64
}

/// Arena of neuron slots shared by all areas
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NeuronPool {
    num_areas: usize,
    slots_per_area: u64,
    size: u64,
    active_per_area: Vec<u64>,
}

/// Strided selection of pool slots, in the engine's `start:stop:step` terms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PoolSlice {
    pub offset: u64,
    pub stride: u64,
    pub count: u64,
}

impl PoolSlice {
    /// Exclusive end of the slice
    pub fn stop(&self) -> u64 {
        self.offset + self.count * self.stride
    }

    /// Pool indices covered by the slice, in local order
    pub fn indices(&self) -> impl Iterator<Item = u64> + '_ {
        (0..self.count).map(move |k| self.offset + k * self.stride)
    }
}

impl NeuronPool {
    /// Lay out a pool large enough for the biggest area.
    ///
    /// Returns `None` when the pool would hold more than `u64::MAX` slots.
    pub fn new(topology: &TopologyParams) -> Option<Self> {
        let slots_per_area = topology.max_area_population();
        let size = slots_per_area.checked_mul(topology.num_areas() as u64)?;
        Some(Self {
            num_areas: topology.num_areas(),
            slots_per_area,
            size,
            active_per_area: topology.areas.iter().map(|a| a.total_neurons).collect(),
        })
    }

    pub fn num_areas(&self) -> usize {
        self.num_areas
    }

    /// Total number of slots in the pool
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Number of slots activated by some area
    pub fn active_count(&self) -> u64 {
        // Each area activates at most `slots_per_area`, so this stays within `size`
        self.active_per_area.iter().sum()
    }

    /// Number of slots that stay frozen for the whole run
    pub fn frozen_count(&self) -> u64 {
        self.size() - self.active_count()
    }

    /// Pool index of neuron `local_index` of `area`, if the area has that neuron
    pub fn pool_index(&self, area: AreaId, local_index: u64) -> Option<u64> {
        let active = *self.active_per_area.get(area.index())?;
        (local_index < active).then(|| pool_index(self.num_areas, area.index(), local_index))
    }

    /// Area and local index owning a pool slot.
    ///
    /// Frozen slots still belong to an area's stride but carry no neuron.
    pub fn locate(&self, pool_index: u64) -> Option<(AreaId, u64)> {
        if self.num_areas == 0 || pool_index >= self.size() {
            return None;
        }
        let n = self.num_areas as u64;
        Some((AreaId((pool_index % n) as usize), pool_index / n))
    }

    /// Whether the slot hosts an active neuron
    pub fn is_active(&self, pool_index: u64) -> bool {
        self.locate(pool_index)
            .map(|(area, local)| local < self.active_per_area[area.index()])
            .unwrap_or(false)
    }

    /// Slots activated for `area`
    pub fn area_slice(&self, area: AreaId) -> Option<PoolSlice> {
        let count = *self.active_per_area.get(area.index())?;
        Some(PoolSlice {
            offset: area.index() as u64,
            stride: self.num_areas as u64,
            count,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::config::IndegreeProfile;
    use crate::topology::types::AreaSpec;

    fn topology(sizes: &[u64]) -> TopologyParams {
        TopologyParams {
            areas: sizes
                .iter()
                .enumerate()
                .map(|(i, &total_neurons)| AreaSpec {
                    id: AreaId(i),
                    total_neurons,
                    record_count: total_neurons.min(1_000),
                })
                .collect(),
            baseline_population: 4,
            base_indegree: 1,
            inter_indegree: Some(1),
            profile: IndegreeProfile::Fixed { indegree: 1 },
        }
    }

    fn pool(sizes: &[u64]) -> NeuronPool {
        NeuronPool::new(&topology(sizes)).unwrap()
    }

    #[test]
    fn test_pool_layout() {
        let pool = pool(&[5, 3, 4]);
        assert_eq!(pool.size(), 15);
        assert_eq!(pool.active_count(), 12);
        assert_eq!(pool.frozen_count(), 3);
    }

    #[test]
    fn test_pool_index_interleaves_areas() {
        let pool = pool(&[5, 3, 4]);

        assert_eq!(pool.pool_index(AreaId(0), 0), Some(0));
        assert_eq!(pool.pool_index(AreaId(1), 0), Some(1));
        assert_eq!(pool.pool_index(AreaId(2), 1), Some(5));
        assert_eq!(pool.pool_index(AreaId(0), 4), Some(12));
        assert_eq!(pool.pool_index(AreaId(1), 3), None);
        assert_eq!(pool.pool_index(AreaId(3), 0), None);

        for area in 0..3 {
            for local in 0..3 {
                let index = pool.pool_index(AreaId(area), local).unwrap();
                assert_eq!(index, local * 3 + area as u64);
                assert_eq!(pool.locate(index), Some((AreaId(area), local)));
            }
        }
    }

    #[test]
    fn test_frozen_slots() {
        let pool = pool(&[5, 3, 4]);

        // Area 1 only uses local indices 0..3, so local 3 and 4 stay frozen
        assert!(pool.is_active(1));
        assert!(!pool.is_active(10));
        assert!(!pool.is_active(13));
        assert!(!pool.is_active(14));
        assert!(pool.is_active(12));
        assert!(!pool.is_active(15));
        assert_eq!((0..pool.size()).filter(|&i| pool.is_active(i)).count(), 12);
    }

    #[test]
    fn test_area_slice_matches_pool_index() {
        let pool = pool(&[5, 3, 4]);
        let slice = pool.area_slice(AreaId(2)).unwrap();

        assert_eq!(slice, PoolSlice { offset: 2, stride: 3, count: 4 });
        assert_eq!(slice.stop(), 14);
        let indices: Vec<u64> = slice.indices().collect();
        assert_eq!(indices, vec![2, 5, 8, 11]);
        assert!(indices.iter().all(|&i| pool.is_active(i)));
        assert_eq!(pool.area_slice(AreaId(7)), None);
    }

    #[test]
    fn test_pool_too_large_for_u64() {
        assert!(NeuronPool::new(&topology(&[u64::MAX / 2 + 1, 10])).is_none());

        let largest = pool(&[u64::MAX / 2, 10]);
        assert_eq!(largest.size(), u64::MAX - 1);
        assert_eq!(largest.frozen_count(), u64::MAX / 2 - 10);
    }

    #[test]
    fn test_free_pool_index_function() {
        assert_eq!(pool_index(32, 0, 0), 0);
        assert_eq!(pool_index(32, 5, 10), 325);
        assert_eq!(pool_index(1, 0, 42), 42);
    }
}
