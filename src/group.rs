use crate::button::Button;
use crate::liveness::{LivenessPoller, Probe};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Buttons whose active flag tracks the liveness of one resource.
///
/// Membership is built during setup. [`WidgetGroup::watch`] consumes the
/// group, so nothing can join once polling has started.
#[derive(Default)]
pub struct WidgetGroup {
    name: String,
    members: Vec<Arc<dyn Button>>,
}

impl WidgetGroup {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            members: Vec::new(),
        }
    }

    /// Add a button. It is disabled until the resource is seen live.
    pub fn register(&mut self, button: Arc<dyn Button>) {
        button.set_active(false);
        self.members.push(button);
    }

    /// Push a liveness value to every member.
    pub fn on_change(&self, live: bool) {
        debug!(group = %self.name, live, members = self.members.len(), "updating buttons");
        for button in &self.members {
            button.set_active(live);
        }
    }

    /// Start a poller that drives this group.
    pub fn watch<P: Probe>(self, interval: Duration, probe: P) -> LivenessPoller {
        let name = self.name.clone();
        LivenessPoller::start(name, interval, probe, move |live| self.on_change(live))
    }
}
