//! Admin wizard state types

use crate::menu::MenuChoice;

/// Global text settings editable from the settings menu
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextField {
    Greeting,
    SessionEnd,
    Timeout,
}

impl TextField {
    pub fn label(self) -> &'static str {
        match self {
            TextField::Greeting => "greeting message",
            TextField::SessionEnd => "session end message",
            TextField::Timeout => "timeout message",
        }
    }
}

/// Which per-leaf setting the picker is choosing a leaf for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeafSetting {
    FlowMode,
    AwaitTimeout,
    SuccessReply,
}

impl LeafSetting {
    pub fn label(self) -> &'static str {
        match self {
            LeafSetting::FlowMode => "flow mode",
            LeafSetting::AwaitTimeout => "reply wait time",
            LeafSetting::SuccessReply => "success reply",
        }
    }
}

/// Where an admin is in the settings flow
///
/// The picker carries its own breadcrumb: `trail` holds the menu ids walked
/// through so far and `choices` what is currently on screen.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum WizardState {
    #[default]
    Idle,

    /// The numbered settings menu is on screen
    SettingsMenu,

    EditText(TextField),

    EditIdleTimeout,

    /// Expecting `<index> <on|off>`
    ToggleMainMenu,

    /// Expecting a permutation of the root entry numbers
    ReorderMainMenu,

    PickTarget {
        purpose: LeafSetting,
        trail: Vec<String>,
        choices: Vec<MenuChoice>,
    },

    EditLeaf {
        purpose: LeafSetting,
        target: MenuChoice,
    },
}

impl WizardState {
    pub fn name(&self) -> &'static str {
        match self {
            WizardState::Idle => "idle",
            WizardState::SettingsMenu => "settings_menu",
            WizardState::EditText(_) => "edit_text",
            WizardState::EditIdleTimeout => "edit_idle_timeout",
            WizardState::ToggleMainMenu => "toggle_main_menu",
            WizardState::ReorderMainMenu => "reorder_main_menu",
            WizardState::PickTarget { .. } => "pick_target",
            WizardState::EditLeaf { .. } => "edit_leaf",
        }
    }
}

/// Result of feeding one message to the wizard
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WizardStep {
    pub next: WizardState,
    pub reply: String,
    /// The document was changed and must be saved
    pub persist: bool,
}

impl WizardStep {
    /// Move to `next` without saving
    pub fn to(next: WizardState, reply: impl Into<String>) -> Self {
        Self {
            next,
            reply: reply.into(),
            persist: false,
        }
    }

    /// Save the document and leave the flow
    pub fn saved(reply: impl Into<String>) -> Self {
        Self {
            next: WizardState::Idle,
            reply: reply.into(),
            persist: true,
        }
    }

    /// Leave the flow without saving
    pub fn closed(reply: impl Into<String>) -> Self {
        Self::to(WizardState::Idle, reply)
    }
}
