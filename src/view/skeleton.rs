//! Placeholder shown while history loads.

use super::Alignment;
use crate::config::DEFAULT_SKELETON_ROWS;

/// Fixed-shape placeholder timeline. Rows alternate inbound/outbound,
/// starting inbound, so the layout does not jump when real bubbles arrive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Skeleton {
    rows: Vec<Alignment>,
}

impl Default for Skeleton {
    fn default() -> Self {
        Self::new(DEFAULT_SKELETON_ROWS)
    }
}

impl Skeleton {
    pub fn new(rows: usize) -> Self {
        let rows = (0..rows)
            .map(|i| {
                if i % 2 == 0 {
                    Alignment::Inbound
                } else {
                    Alignment::Outbound
                }
            })
            .collect();
        Self { rows }
    }

    pub fn rows(&self) -> &[Alignment] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
