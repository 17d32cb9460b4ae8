//! The conversation's single root dialog reference and its transitions.

use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::{DialogError, DialogInstance, DialogResponse, Result, TransitionKind};

/// Conversation-scoped state owned by whoever drives the conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationState {
    pub id: Uuid,
    #[serde(default)]
    pub root_dialog: Option<DialogInstance>,
}

impl ConversationState {
    #[must_use]
    pub fn new() -> Self {
        Self {
            id: Uuid::now_v7(),
            root_dialog: None,
        }
    }
}

impl Default for ConversationState {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Default)]
pub struct DialogStack {
    state: ConversationState,
}

impl DialogStack {
    #[must_use]
    pub const fn new(state: ConversationState) -> Self {
        Self { state }
    }

    #[must_use]
    pub const fn root(&self) -> Option<&DialogInstance> {
        self.state.root_dialog.as_ref()
    }

    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.state.root_dialog.is_some()
    }

    #[must_use]
    pub const fn state(&self) -> &ConversationState {
        &self.state
    }

    #[must_use]
    pub fn into_state(self) -> ConversationState {
        self.state
    }

    /// Make `instance` the root. Only allowed while no dialog is active.
    pub fn activate(&mut self, instance: DialogInstance) -> Result<()> {
        if let Some(root) = &self.state.root_dialog {
            return Err(DialogError::InvalidTransition(format!(
                "cannot activate {instance} while {root} is active"
            )));
        }
        info!("Conversation {}: root dialog is now {instance}", self.state.id);
        self.state.root_dialog = Some(instance);
        Ok(())
    }

    /// Swap `current` for `next`, returning the instance that was replaced.
    pub fn replace(
        &mut self,
        current: &DialogInstance,
        next: DialogInstance,
    ) -> Result<DialogInstance> {
        self.ensure_root(current, "replace")?;
        info!(
            "Conversation {}: replacing {current} with {next}",
            self.state.id
        );
        Ok(self
            .state
            .root_dialog
            .replace(next)
            .unwrap_or_else(|| current.clone()))
    }

    /// Clear the root, returning the instance that ended.
    pub fn end(&mut self, current: &DialogInstance) -> Result<DialogInstance> {
        self.ensure_root(current, "end")?;
        info!("Conversation {}: {current} ended", self.state.id);
        Ok(self
            .state
            .root_dialog
            .take()
            .unwrap_or_else(|| current.clone()))
    }

    /// Apply the transition reported for a turn of `current`.
    pub fn apply(&mut self, current: &DialogInstance, response: &DialogResponse) -> Result<()> {
        match response.transition {
            TransitionKind::Continue => {
                self.ensure_root(current, "continue")?;
                match &response.instance {
                    Some(instance) if instance != current => {
                        Err(DialogError::InvalidTransition(format!(
                            "continue reported {instance} but {current} is active"
                        )))
                    }
                    _ => Ok(()),
                }
            }
            TransitionKind::Replace => {
                let next = response.instance.clone().ok_or_else(|| {
                    DialogError::InvalidRequest("replace response without an instance".to_string())
                })?;
                self.replace(current, next).map(drop)
            }
            TransitionKind::End => self.end(current).map(drop),
        }
    }

    fn ensure_root(&self, current: &DialogInstance, transition: &str) -> Result<()> {
        match &self.state.root_dialog {
            Some(root) if root == current => Ok(()),
            Some(root) => Err(DialogError::InvalidTransition(format!(
                "{transition} requested by {current} but {root} is active"
            ))),
            None => Err(DialogError::InvalidTransition(format!(
                "{transition} requested by {current} but no dialog is active"
            ))),
        }
    }
}
