/// What the device back action should do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackOutcome {
    /// One step back in the page history; the default behavior is suppressed.
    Consumed,
    /// Nothing to go back to; let the platform exit or hide the view.
    Default,
}

pub fn handle_back(history_depth: usize) -> BackOutcome {
    if history_depth >= 1 {
        BackOutcome::Consumed
    } else {
        BackOutcome::Default
    }
}

/// In-content history as seen through completed page loads.
#[derive(Debug, Default, Clone)]
pub struct NavigationHistory {
    current: Option<reqwest::Url>,
    depth: usize,
    pending_back: bool,
}

impl NavigationHistory {
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// True until the first page load after a reset.
    pub fn is_empty(&self) -> bool {
        self.current.is_none()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Marks the next completed load as the result of a back step.
    pub fn begin_back(&mut self) {
        self.pending_back = true;
    }

    pub fn record_load(&mut self, url: &reqwest::Url) {
        if self.pending_back {
            self.pending_back = false;
            self.depth = self.depth.saturating_sub(1);
        } else if self.current.as_ref() == Some(url) {
            return;
        } else if self.current.is_some() {
            self.depth += 1;
        }
        self.current = Some(url.clone());
    }
}
