//! Edge-triggered connectivity state.
//!
//! Platforms report reachability repeatedly (polls, duplicate callbacks).
//! This module reduces that signal to transitions: a [`Transition`] is produced
//! only when the observed state differs from the current one.

/// Reachability as last observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connectivity {
    /// Network reachable.
    Online,
    /// Network unreachable.
    Offline,
}

/// A change in reachability.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Offline → Online.
    WentOnline,
    /// Online → Offline.
    WentOffline,
}

impl Connectivity {
    /// State for a boolean reachability flag.
    pub fn from_online(online: bool) -> Self {
        if online {
            Self::Online
        } else {
            Self::Offline
        }
    }

    /// Process an observation and return the new state plus the edge, if any.
    ///
    /// This is a pure function; the caller publishes the transition.
    pub fn observe(self, online: bool) -> (Self, Option<Transition>) {
        match (self, online) {
            (Self::Offline, true) => (Self::Online, Some(Transition::WentOnline)),
            (Self::Online, false) => (Self::Offline, Some(Transition::WentOffline)),
            (state, _) => (state, None),
        }
    }

    /// Check if currently online.
    pub fn is_online(&self) -> bool {
        matches!(self, Self::Online)
    }
}

impl Default for Connectivity {
    fn default() -> Self {
        Self::Online
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn going_online_emits_edge() {
        let (state, edge) = Connectivity::Offline.observe(true);
        assert!(state.is_online());
        assert_eq!(edge, Some(Transition::WentOnline));
    }

    #[test]
    fn going_offline_emits_edge() {
        let (state, edge) = Connectivity::Online.observe(false);
        assert!(!state.is_online());
        assert_eq!(edge, Some(Transition::WentOffline));
    }

    #[test]
    fn repeated_observations_are_silent() {
        let (state, edge) = Connectivity::Online.observe(true);
        assert_eq!(state, Connectivity::Online);
        assert!(edge.is_none());

        let (state, edge) = Connectivity::Offline.observe(false);
        assert_eq!(state, Connectivity::Offline);
        assert!(edge.is_none());
    }

    #[test]
    fn flapping_signal_alternates_edges() {
        let mut state = Connectivity::Online;
        let mut edges = Vec::new();

        for online in [false, false, true, true, false, true] {
            let (next, edge) = state.observe(online);
            state = next;
            edges.extend(edge);
        }

        assert_eq!(
            edges,
            vec![
                Transition::WentOffline,
                Transition::WentOnline,
                Transition::WentOffline,
                Transition::WentOnline,
            ]
        );
    }

    #[test]
    fn from_online_maps_flag() {
        assert_eq!(Connectivity::from_online(true), Connectivity::Online);
        assert_eq!(Connectivity::from_online(false), Connectivity::Offline);
    }
}
