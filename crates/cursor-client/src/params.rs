use cursor_core::error::CursorError;
use std::collections::HashMap;

/// Maps callable-statement parameter indexes onto columns of the result
/// row that carries the output values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutputParams {
    index_map: HashMap<usize, usize>,
}

impl OutputParams {
    /// Registers output parameters in order; the n-th registered
    /// parameter is read from column n.
    pub fn registered(indexes: &[usize]) -> Self {
        let index_map = indexes
            .iter()
            .enumerate()
            .map(|(pos, &index)| (index, pos + 1))
            .collect();
        Self { index_map }
    }

    pub fn with_param(mut self, index: usize, column: usize) -> Self {
        self.index_map.insert(index, column);
        self
    }

    pub fn len(&self) -> usize {
        self.index_map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index_map.is_empty()
    }

    /// Result column holding parameter `index`.
    pub fn column_for(&self, index: usize) -> Result<usize, CursorError> {
        self.index_map
            .get(&index)
            .copied()
            .ok_or(CursorError::UnknownOutputParameter { index })
    }
}
