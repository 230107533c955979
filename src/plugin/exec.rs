use super::Plugin;
use crate::action::ExecAction;
use crate::button::{Appearance, DeckButton};
use crate::config::schema::ExecButtonConfig;
use std::sync::Arc;

/// Buttons that run a fixed command. Always enabled.
pub struct ExecButtons {
    buttons: Vec<Arc<DeckButton>>,
}

impl ExecButtons {
    pub fn new(config: &[ExecButtonConfig]) -> Self {
        let buttons = config
            .iter()
            .map(|b| {
                let appearance = Appearance {
                    label: Some(b.label.clone().unwrap_or_else(|| b.command.clone())),
                    background: b.background.clone(),
                    text_color: b.text_color.clone(),
                };
                let action = ExecAction::new(b.command.clone(), b.args.iter().cloned());
                Arc::new(DeckButton::with_action(b.key, appearance, Arc::new(action)))
            })
            .collect();
        Self { buttons }
    }
}

impl Plugin for ExecButtons {
    fn name(&self) -> &'static str {
        "exec"
    }

    fn buttons(&self) -> &[Arc<DeckButton>] {
        &self.buttons
    }

    fn close(&self) {}
}
