use serde::Serialize;

use crate::overlay::Record;

/// The game-state object: a map of named sub-states
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GameStateNode {
    pub states_head: u64,
    pub state_count: u64,
    pub has_states: bool,
}

impl GameStateNode {
    pub fn apply(&mut self, record: &Record) {
        self.states_head = record.address("states_head").unwrap_or_default();
        self.state_count = record.u64("states_size").unwrap_or_default();
        self.has_states = self.states_head != 0 && self.state_count > 0;
    }

    pub fn describe(&self) -> String {
        format!(
            "states head {:#X} count {}",
            self.states_head, self.state_count
        )
    }
}
