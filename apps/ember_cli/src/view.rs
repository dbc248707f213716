use std::sync::Mutex;
use std::time::Duration;

use ember_core::entities::{Account, AccountId, InstanceDescriptor, Panel};
use ember_core::ports::LauncherView;
use indicatif::{ProgressBar, ProgressStyle};

/// Prints launcher notifications, routing them through the active spinner if any
#[derive(Default)]
pub struct TerminalView {
    spinner: Mutex<Option<ProgressBar>>,
}

impl TerminalView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start_spinner(&self, message: &str) {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        spinner.enable_steady_tick(Duration::from_millis(100));
        spinner.set_message(message.to_string());

        if let Ok(mut slot) = self.spinner.lock() {
            *slot = Some(spinner);
        }
    }

    pub fn finish_spinner(&self) {
        if let Ok(mut slot) = self.spinner.lock() {
            if let Some(spinner) = slot.take() {
                spinner.finish_and_clear();
            }
        }
    }

    fn line(&self, text: String) {
        let active = self.spinner.lock().ok().and_then(|slot| slot.clone());
        match active {
            Some(spinner) => spinner.println(text),
            None => println!("{}", text),
        }
    }
}

pub fn panel_hint(panel: Panel) -> &'static str {
    match panel {
        Panel::Login => "No account available. Use 'ember_cli login-offline <name>' to add one.",
        Panel::Home => "Ready. Use 'ember_cli launch' to start the selected instance.",
        Panel::Settings => "Use 'ember_cli settings' to review launch preferences.",
    }
}

impl LauncherView for TerminalView {
    fn account_refreshing(&self, account: &Account) {
        if let Ok(slot) = self.spinner.lock() {
            if let Some(spinner) = slot.as_ref() {
                spinner.set_message(format!("Refreshing {} ({})", account.name, account.provider()));
            }
        }
    }

    fn account_added(&self, account: &Account) {
        self.line(format!("  + {} [{}]", account.name, account.provider()));
    }

    fn account_removed(&self, id: &AccountId) {
        self.line(format!("  - removed account {}", id));
    }

    fn account_selected(&self, id: &AccountId) {
        self.line(format!("Selected account {}", id));
    }

    fn instance_status(&self, instance: &InstanceDescriptor) {
        let version = instance.minecraft_version().unwrap_or("unknown version");
        self.line(format!("Instance: {} ({})", instance.name, version));
    }

    fn show_panel(&self, panel: Panel) {
        self.line(panel_hint(panel).to_string());
    }
}
