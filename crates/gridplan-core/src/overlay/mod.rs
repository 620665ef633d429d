//! Manual reorder overlay for the feed grid.
//!
//! The overlay is a display-only divergence from the derived grid. It is
//! never written back to the store.
//!
//! ```text
//! Idle              -- arm(i), slot i occupied -->  ArmedSwap(i)
//! ArmedSwap(i)      -- confirm(i)              -->  previous state (cancel)
//! ArmedSwap(i)      -- confirm(j), j != i      -->  OverlayActive(seq with i<->j)
//! OverlayActive     -- arm(i), slot i occupied -->  ArmedSwap(i) over the overlay
//! any               -- reset / invalidate      -->  Idle
//! ```

use thiserror::Error;
use tracing::debug;

use crate::feed::FeedGrid;

/// A rejected overlay interaction. The state is unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OverlayError {
    #[error("slot {index} is out of range (grid has {capacity} slots)")]
    OutOfRange { index: usize, capacity: usize },

    #[error("slot {0} is empty and cannot be selected for a swap")]
    EmptySlot(usize),

    #[error("no slot is selected for a swap")]
    NotArmed,

    #[error("slot {0} is already selected for a swap")]
    AlreadyArmed(usize),
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum ReorderState {
    /// The derived grid is displayed.
    #[default]
    Idle,
    /// Slot `selected` waits for a swap partner. `overlay` is the sequence
    /// on display when arming (`None` means the derived grid).
    ArmedSwap {
        selected: usize,
        overlay: Option<FeedGrid>,
    },
    /// A swapped sequence is displayed.
    OverlayActive(FeedGrid),
}

#[derive(Debug, Clone, Default)]
pub struct ReorderOverlay {
    state: ReorderState,
}

impl ReorderOverlay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &ReorderState {
        &self.state
    }

    /// Whether the display currently differs from `derived`.
    pub fn is_active(&self) -> bool {
        matches!(
            self.state,
            ReorderState::OverlayActive(_)
                | ReorderState::ArmedSwap {
                    overlay: Some(_),
                    ..
                }
        )
    }

    /// The slot waiting for a swap partner, if any.
    pub fn armed(&self) -> Option<usize> {
        match self.state {
            ReorderState::ArmedSwap { selected, .. } => Some(selected),
            _ => None,
        }
    }

    /// The sequence on display given the pure derivation.
    pub fn displayed<'a>(&'a self, derived: &'a FeedGrid) -> &'a FeedGrid {
        match &self.state {
            ReorderState::OverlayActive(grid)
            | ReorderState::ArmedSwap {
                overlay: Some(grid),
                ..
            } => grid,
            _ => derived,
        }
    }

    /// Select `index` as the first slot of a swap.
    pub fn arm_swap(&mut self, index: usize, derived: &FeedGrid) -> Result<(), OverlayError> {
        if let Some(selected) = self.armed() {
            return Err(OverlayError::AlreadyArmed(selected));
        }
        let displayed = self.displayed(derived);
        check_range(displayed, index)?;
        if displayed.get(index).is_none() {
            return Err(OverlayError::EmptySlot(index));
        }

        let overlay = match std::mem::take(&mut self.state) {
            ReorderState::OverlayActive(grid) => Some(grid),
            _ => None,
        };
        self.state = ReorderState::ArmedSwap {
            selected: index,
            overlay,
        };
        debug!(slot = index, "swap armed");
        Ok(())
    }

    /// Complete a swap with `index`. Selecting the armed slot again cancels.
    pub fn confirm_swap(&mut self, index: usize, derived: &FeedGrid) -> Result<(), OverlayError> {
        let selected = self.armed().ok_or(OverlayError::NotArmed)?;
        check_range(self.displayed(derived), index)?;
        if index == selected {
            self.cancel_swap();
            return Ok(());
        }

        let ReorderState::ArmedSwap { overlay, .. } = std::mem::take(&mut self.state) else {
            return Err(OverlayError::NotArmed);
        };
        let mut grid = overlay.unwrap_or_else(|| derived.clone());
        grid.swap(selected, index);
        self.state = ReorderState::OverlayActive(grid);
        debug!(from = selected, to = index, "slots swapped");
        Ok(())
    }

    /// Disarm without swapping. A no-op when nothing is armed.
    pub fn cancel_swap(&mut self) {
        if self.armed().is_none() {
            return;
        }
        if let ReorderState::ArmedSwap { overlay, .. } = std::mem::take(&mut self.state) {
            self.state = overlay.map_or(ReorderState::Idle, ReorderState::OverlayActive);
            debug!("swap cancelled");
        }
    }

    /// The single "select slot" interaction of the grid view: arms when
    /// nothing is armed, completes (or cancels) the swap otherwise.
    pub fn select(&mut self, index: usize, derived: &FeedGrid) -> Result<(), OverlayError> {
        if self.armed().is_some() {
            self.confirm_swap(index, derived)
        } else {
            self.arm_swap(index, derived)
        }
    }

    /// Discard any overlay and selection, back to the derived grid.
    pub fn reset(&mut self) {
        self.state = ReorderState::Idle;
    }

    /// Discard the overlay because the store changed underneath it.
    /// Returns whether anything was discarded.
    pub fn invalidate(&mut self) -> bool {
        let had_state = self.state != ReorderState::Idle;
        self.state = ReorderState::Idle;
        had_state
    }
}

fn check_range(grid: &FeedGrid, index: usize) -> Result<(), OverlayError> {
    if index < grid.capacity() {
        Ok(())
    } else {
        Err(OverlayError::OutOfRange {
            index,
            capacity: grid.capacity(),
        })
    }
}
