#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reachability {
    Down,
    Up,
}

/// Tracks probe results for one device and reports offline-to-online edges.
///
/// The first observation only establishes the state; a device that is
/// already up at startup is handled by the one-shot boot apply instead.
#[derive(Debug, Clone, Default)]
pub struct ReachabilityTracker {
    last: Option<Reachability>,
}

impl ReachabilityTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> Reachability {
        self.last.unwrap_or(Reachability::Down)
    }

    /// Records a probe result. Returns true only on a `Down -> Up` edge.
    pub fn observe(&mut self, reachable: bool) -> bool {
        let next = if reachable {
            Reachability::Up
        } else {
            Reachability::Down
        };
        let previous = self.last.replace(next);
        matches!(
            (previous, next),
            (Some(Reachability::Down), Reachability::Up)
        )
    }
}
