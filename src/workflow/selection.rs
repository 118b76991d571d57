//! Operator selection over the positions of one discovered sequence

use crate::error::WorkflowError;
use std::collections::HashSet;

/// Positions chosen for registration, tagged with the scan generation they index
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionSet {
    generation: u64,
    len: usize,
    members: HashSet<usize>,
}

impl SelectionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty the set and rebind it to a new sequence of `len` devices
    pub fn reset(&mut self, generation: u64, len: usize) {
        self.generation = generation;
        self.len = len;
        self.members.clear();
    }

    pub fn is_current(&self, generation: u64) -> bool {
        self.generation == generation
    }

    /// Flip membership of `position`; returns whether it is now selected
    pub fn toggle(&mut self, position: usize) -> Result<bool, WorkflowError> {
        if position >= self.len {
            return Err(WorkflowError::PositionOutOfRange {
                position,
                len: self.len,
            });
        }
        if self.members.remove(&position) {
            Ok(false)
        } else {
            self.members.insert(position);
            Ok(true)
        }
    }

    /// Select everything, or clear if everything is already selected
    pub fn toggle_all(&mut self) {
        if self.is_all_selected() {
            self.members.clear();
        } else {
            self.members = (0..self.len).collect();
        }
    }

    pub fn is_all_selected(&self) -> bool {
        self.members.len() == self.len
    }

    pub fn contains(&self, position: usize) -> bool {
        self.members.contains(&position)
    }

    /// Members in ascending order
    pub fn positions(&self) -> Vec<usize> {
        let mut positions: Vec<usize> = self.members.iter().copied().collect();
        positions.sort_unstable();
        positions
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}
