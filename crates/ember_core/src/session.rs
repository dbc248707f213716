//! Host process session: current panel, current instance and the rich
//! presence activity derived from them.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::CloseBehavior;
use crate::entities::{InstanceDescriptor, Panel};

pub const DEFAULT_IMAGE_KEY: &str = "launcher_logo";
pub const NO_INSTANCE: &str = "Not selected";

/// Messages the UI sends to the host process
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum HostMessage {
    PanelChanged {
        panel: Panel,
    },
    InstanceChanged {
        name: String,
        #[serde(default)]
        instance: Option<InstanceDescriptor>,
    },
    UpdateCloseBehavior {
        behavior: CloseBehavior,
    },
    GameLaunched,
    GameClosed,
}

/// What the host should do with the launcher window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowAction {
    Hide,
    Show,
    Quit,
}

/// Rich presence payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Activity {
    pub details: String,
    pub state: String,
    pub large_image_key: String,
    pub large_image_text: String,
    pub small_image_key: String,
    pub small_image_text: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionState {
    panel: Panel,
    instance_name: String,
    instance: Option<InstanceDescriptor>,
    close_behavior: CloseBehavior,
    game_running: bool,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            panel: Panel::Home,
            instance_name: NO_INSTANCE.to_string(),
            instance: None,
            close_behavior: CloseBehavior::default(),
            game_running: false,
        }
    }
}

impl SessionState {
    pub fn new(close_behavior: CloseBehavior) -> Self {
        Self {
            close_behavior,
            ..Self::default()
        }
    }

    pub fn panel(&self) -> Panel {
        self.panel
    }

    pub fn instance_name(&self) -> &str {
        &self.instance_name
    }

    pub fn close_behavior(&self) -> CloseBehavior {
        self.close_behavior
    }

    pub fn is_game_running(&self) -> bool {
        self.game_running
    }

    /// Fold a message into the session, returning a window action if one is due
    pub fn apply(&mut self, message: HostMessage) -> Option<WindowAction> {
        match message {
            HostMessage::PanelChanged { panel } => {
                debug!(%panel, "panel changed");
                self.panel = panel;
                None
            }
            HostMessage::InstanceChanged { name, instance } => {
                debug!(instance = %name, "instance changed");
                self.instance_name = name;
                self.instance = instance;
                None
            }
            HostMessage::UpdateCloseBehavior { behavior } => {
                debug!(%behavior, "close behavior updated");
                self.close_behavior = behavior;
                None
            }
            HostMessage::GameLaunched => {
                self.game_running = true;
                match self.close_behavior {
                    CloseBehavior::CloseLauncher => Some(WindowAction::Hide),
                    CloseBehavior::CloseAll | CloseBehavior::CloseNone => None,
                }
            }
            HostMessage::GameClosed => {
                self.game_running = false;
                match self.close_behavior {
                    CloseBehavior::CloseLauncher => Some(WindowAction::Show),
                    CloseBehavior::CloseAll => Some(WindowAction::Quit),
                    CloseBehavior::CloseNone => None,
                }
            }
        }
    }

    pub fn activity(&self) -> Activity {
        let details = match self.panel {
            Panel::Settings => "Configuring the launcher",
            Panel::Login => "Signing in",
            Panel::Home => "In the main menu",
        };

        Activity {
            details: details.to_string(),
            state: format!("Playing: {}", self.instance_name),
            large_image_key: instance_icon_key(self.instance.as_ref()),
            large_image_text: self.instance_name.clone(),
            small_image_key: "icon".to_string(),
            small_image_text: "Getting ready to play".to_string(),
        }
    }
}

fn image_name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)([a-zA-Z0-9_\-]+)\.(png|jpg|jpeg|webp)$").expect("static regex is valid")
    })
}

/// Presence asset key for an instance: the avatar's file stem
pub fn instance_icon_key(instance: Option<&InstanceDescriptor>) -> String {
    let Some(icon) = instance
        .and_then(|i| i.avatar.as_ref())
        .and_then(|a| a.first())
    else {
        return DEFAULT_IMAGE_KEY.to_string();
    };

    if let Some(captures) = image_name_pattern().captures(icon) {
        return captures[1].to_string();
    }

    let path = icon.split(['?', '#']).next().unwrap_or(icon);
    path.rsplit('/')
        .next()
        .and_then(|base| base.split('.').next())
        .filter(|stem| !stem.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| DEFAULT_IMAGE_KEY.to_string())
}
