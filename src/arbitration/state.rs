use crate::arbitration::{
    catalog::StrategyCatalog, ceilings::ResourceCeilingRegistry, ports::SolverPort,
    types::CycleId,
};

/// Everything a cycle or a registration reads and writes. Always accessed
/// under the arbiter lock, so a cycle never observes a half-applied update.
pub struct ArbiterState {
    pub cycle_id: CycleId,
    pub catalog: StrategyCatalog,
    pub ceilings: ResourceCeilingRegistry,
    pub solver: Box<dyn SolverPort>,
}

impl ArbiterState {
    pub fn new(solver: Box<dyn SolverPort>) -> Self {
        Self {
            cycle_id: 0,
            catalog: StrategyCatalog::new(),
            ceilings: ResourceCeilingRegistry::new(),
            solver,
        }
    }

    pub fn next_cycle(&mut self) -> CycleId {
        self.cycle_id = self.cycle_id.saturating_add(1);
        self.cycle_id
    }
}
