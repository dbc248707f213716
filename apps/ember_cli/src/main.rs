mod view;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use dialoguer::Confirm;
use ember_adapters::auth::microsoft::DEFAULT_CLIENT_ID;
use ember_adapters::{configuration, network, telemetry};
use ember_adapters::{
    AzAuthClient, FileAccountRepository, FileClientConfigRepository, FileUnlockLedgerRepository,
    HttpInstanceCatalog, HttpNewsRepository, HttpUnlockValidator, JavaProcessLauncher, LogBuffer,
    MicrosoftRefresher, MojangClient,
};
use ember_core::config::{CloseBehavior, Settings, Theme};
use ember_core::entities::{AccessRule, AccountId, LauncherManifest, Panel};
use ember_core::launch_options::{game_directory, LaunchEvent};
use ember_core::ports::{AccountRepository, InstanceCatalog, NewsRepository};
use ember_core::session::{HostMessage, SessionState, WindowAction};
use ember_core::use_cases::{
    AccountSyncUseCase, AccountsUseCase, InstanceAccessUseCase, LaunchUseCase, LoginUseCase,
    ProviderSet, RedeemOutcome, SettingsUseCase,
};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, error, warn};

use crate::view::{panel_hint, TerminalView};

/// RAM assumed when the machine total cannot be read
const FALLBACK_TOTAL_GB: f64 = 8.0;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Print the captured log buffer before exiting
    #[arg(long, global = true, default_value = "false")]
    show_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    // --- Account commands ---
    /// Refresh every stored account, dropping the ones that no longer authenticate
    Sync,

    /// List stored accounts
    Accounts,

    /// Create an offline account
    LoginOffline {
        /// Player name (at least 3 characters, no spaces)
        nick: String,
    },

    /// Make an account the active one
    SelectAccount { id: String },

    /// Remove a stored account
    RemoveAccount {
        id: String,

        /// Skip confirmation prompt
        #[arg(short, long, default_value = "false")]
        yes: bool,
    },

    // --- Instance commands ---
    /// List instances the active account can play
    Instances,

    /// Select the instance to launch
    SelectInstance { name: String },

    /// Redeem an unlock code for the active account
    Unlock { code: String },

    /// Show launcher news
    News,

    // --- Settings commands ---
    /// Show launch preferences
    Settings,

    /// Set java heap bounds in GB
    SetMemory {
        min: f64,
        max: f64,

        /// Machine RAM in GB (detected when omitted)
        #[arg(long)]
        total_gb: Option<f64>,
    },

    /// Use a specific java binary; omit the path to use the bundled runtime
    SetJava { path: Option<PathBuf> },

    /// Set the game window size
    SetResolution {
        width: Option<u32>,
        height: Option<u32>,

        /// Restore the default size
        #[arg(long, default_value = "false")]
        reset: bool,
    },

    /// What happens to the launcher while the game runs
    CloseBehavior {
        /// close-launcher, close-all or close-none
        mode: CloseBehavior,
    },

    /// Launcher theme: auto, dark or light
    SetTheme { theme: Theme },

    /// Parallel downloads
    SetDownloads { count: u32 },

    /// Launch the selected instance
    Launch,
}

type AccountSync = AccountSyncUseCase<FileAccountRepository, FileClientConfigRepository, TerminalView>;
type Accounts =
    AccountsUseCase<FileAccountRepository, FileClientConfigRepository, HttpInstanceCatalog, TerminalView>;
type Login = LoginUseCase<
    FileAccountRepository,
    FileClientConfigRepository,
    HttpInstanceCatalog,
    MojangClient,
    TerminalView,
>;
type InstanceAccess = InstanceAccessUseCase<
    FileAccountRepository,
    FileClientConfigRepository,
    FileUnlockLedgerRepository,
    HttpInstanceCatalog,
    HttpUnlockValidator,
    TerminalView,
>;
type Launch = LaunchUseCase<
    FileAccountRepository,
    FileClientConfigRepository,
    HttpInstanceCatalog,
    JavaProcessLauncher,
>;

/// Adapters wired together once per run
struct Launcher {
    settings: Settings,
    manifest: Option<LauncherManifest>,
    accounts: Arc<FileAccountRepository>,
    config: Arc<FileClientConfigRepository>,
    ledger: Arc<FileUnlockLedgerRepository>,
    catalog: Arc<HttpInstanceCatalog>,
    news: HttpNewsRepository,
    validator: Arc<HttpUnlockValidator>,
    providers: ProviderSet,
    mojang: Arc<MojangClient>,
    view: Arc<TerminalView>,
}

impl Launcher {
    async fn new(settings: Settings) -> anyhow::Result<Self> {
        let client = network::build_client(Duration::from_secs(settings.request_timeout_secs))?;
        let config_dir = configuration::config_dir();
        let catalog = Arc::new(HttpInstanceCatalog::new(client.clone(), &settings.api_url));

        let manifest = match catalog.launcher_manifest().await {
            Ok(manifest) => Some(manifest),
            Err(e) => {
                warn!(error = %e, "could not fetch launcher config, using local settings");
                None
            }
        };

        let client_id = settings
            .client_id
            .clone()
            .or_else(|| manifest.as_ref().and_then(|m| m.client_id.clone()))
            .unwrap_or_else(|| DEFAULT_CLIENT_ID.to_string());
        let azauth_url = settings
            .azauth_url
            .clone()
            .or_else(|| {
                manifest
                    .as_ref()
                    .and_then(|m| m.azauth_url().map(str::to_string))
            })
            .unwrap_or_default();
        if azauth_url.is_empty() {
            debug!("no AZauth server configured");
        }

        let mojang = Arc::new(MojangClient::new(client.clone()));
        let providers = ProviderSet {
            microsoft: Arc::new(MicrosoftRefresher::new(client.clone(), client_id)),
            azauth: Arc::new(AzAuthClient::new(client.clone(), azauth_url)),
            mojang: mojang.clone(),
        };

        Ok(Self {
            manifest,
            accounts: Arc::new(FileAccountRepository::new(config_dir.clone())),
            config: Arc::new(FileClientConfigRepository::new(config_dir.clone())),
            ledger: Arc::new(FileUnlockLedgerRepository::new(config_dir)),
            catalog,
            news: HttpNewsRepository::new(client.clone(), &settings.api_url),
            validator: Arc::new(HttpUnlockValidator::new(
                client,
                settings.validation_url.clone().unwrap_or_default(),
            )),
            providers,
            mojang,
            view: Arc::new(TerminalView::new()),
            settings,
        })
    }

    fn game_path(&self) -> PathBuf {
        let data_directory = self
            .manifest
            .as_ref()
            .and_then(|m| m.data_directory.as_deref())
            .unwrap_or(&self.settings.data_directory);
        game_directory(
            &configuration::app_data_dir(),
            data_directory,
            cfg!(target_os = "macos"),
        )
    }

    fn account_sync(&self) -> AccountSync {
        AccountSyncUseCase::new(
            self.accounts.clone(),
            self.config.clone(),
            self.providers.clone(),
            self.view.clone(),
        )
    }

    fn account_management(&self) -> Accounts {
        AccountsUseCase::new(
            self.accounts.clone(),
            self.config.clone(),
            self.catalog.clone(),
            self.view.clone(),
        )
    }

    fn login(&self) -> Login {
        LoginUseCase::new(
            self.accounts.clone(),
            self.config.clone(),
            self.catalog.clone(),
            self.mojang.clone(),
            self.view.clone(),
        )
    }

    fn instance_access(&self) -> InstanceAccess {
        InstanceAccessUseCase::new(
            self.accounts.clone(),
            self.config.clone(),
            self.ledger.clone(),
            self.catalog.clone(),
            self.validator.clone(),
            self.view.clone(),
        )
    }

    fn preferences(&self) -> SettingsUseCase<FileClientConfigRepository> {
        SettingsUseCase::new(self.config.clone())
    }

    fn launch(&self) -> Launch {
        LaunchUseCase::new(
            self.accounts.clone(),
            self.config.clone(),
            self.catalog.clone(),
            Arc::new(JavaProcessLauncher::new()),
            self.game_path(),
        )
    }
}

/// `MemTotal` from /proc/meminfo, in kB
fn parse_mem_total_kb(meminfo: &str) -> Option<u64> {
    meminfo
        .lines()
        .find_map(|line| line.strip_prefix("MemTotal:"))
        .and_then(|rest| rest.split_whitespace().next())
        .and_then(|kb| kb.parse().ok())
}

fn total_memory_gb() -> f64 {
    std::fs::read_to_string("/proc/meminfo")
        .ok()
        .and_then(|info| parse_mem_total_kb(&info))
        .map(|kb| kb as f64 / (1024.0 * 1024.0))
        .unwrap_or(FALLBACK_TOTAL_GB)
}

fn access_label(rule: AccessRule<'_>) -> &'static str {
    match rule {
        AccessRule::Open => "open",
        AccessRule::Password(_) => "unlocked",
        AccessRule::Whitelist(_) => "whitelist",
    }
}

fn window_action_message(action: WindowAction) -> &'static str {
    match action {
        WindowAction::Hide => "Launcher hidden while the game runs.",
        WindowAction::Show => "Game closed, launcher restored.",
        WindowAction::Quit => "Game closed, quitting.",
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = match configuration::get_configuration() {
        Ok(s) => s,
        Err(e) => {
            eprintln!("failed to load configuration: {}", e);
            return Err(anyhow::anyhow!("configuration loading failed"));
        }
    };

    let log_buffer = LogBuffer::default();
    let _guard = telemetry::init_subscriber("ember_cli", &settings.log_level, &log_buffer);

    let cli = Cli::parse();
    let launcher = Launcher::new(settings).await?;

    let result = run(&launcher, cli.command).await;
    if let Err(e) = &result {
        error!(error = %e, "command failed");
    }
    if cli.show_logs {
        print!("{}", log_buffer.render());
    }
    result
}

async fn run(launcher: &Launcher, command: Commands) -> anyhow::Result<()> {
    match command {
        // --- Account commands ---
        Commands::Sync => {
            launcher.view.start_spinner("Refreshing accounts");
            let report = launcher.account_sync().execute().await;
            launcher.view.finish_spinner();

            for removed in &report.removed {
                println!("Removed {} ({}): {}", removed.name, removed.id, removed.reason);
            }
            println!("{} account(s) ready.", report.accounts.len());

            if report.panel == Panel::Home {
                match launcher.instance_access().ensure_selection().await {
                    Ok(Some(instance)) => println!("Selected instance: {}", instance.name),
                    Ok(None) => println!("No instance available for this account."),
                    Err(e) => warn!(error = %e, "could not check instance selection"),
                }
            }
            println!("{}", panel_hint(report.panel));
        }

        Commands::Accounts => {
            let accounts = launcher.account_management().list().await?;

            if accounts.is_empty() {
                println!("No accounts configured.");
                println!("{}", panel_hint(Panel::Login));
            } else {
                println!("Saved accounts:");
                for (account, selected) in &accounts {
                    println!(
                        "{} {} [{}] {}",
                        if *selected { "*" } else { " " },
                        account.name,
                        account.provider(),
                        account.id
                    );
                }
            }
        }

        Commands::LoginOffline { nick } => {
            let account = launcher.login().login_offline(&nick).await?;
            println!("Account '{}' added and selected.", account.name);
        }

        Commands::SelectAccount { id } => {
            let account = launcher
                .account_management()
                .select(&AccountId::new(id))
                .await?;
            println!("Active account: {}", account.name);
        }

        Commands::RemoveAccount { id, yes } => {
            let id = AccountId::new(id);
            let Some(account) = launcher.accounts.get_account(&id).await? else {
                println!("Account '{}' not found.", id);
                return Ok(());
            };

            if !yes {
                let confirmed = Confirm::new()
                    .with_prompt(format!("Delete account '{}'?", account.name))
                    .default(false)
                    .interact()?;

                if !confirmed {
                    println!("Cancelled.");
                    return Ok(());
                }
            }

            match launcher.account_management().remove(&id).await? {
                Some(next) => println!("Account '{}' removed. Active account: {}", account.name, next),
                None => println!("Account '{}' removed.", account.name),
            }
        }

        // --- Instance commands ---
        Commands::Instances => {
            let access = launcher.instance_access();
            let visible = access.visible_instances().await?;
            let selected = launcher.preferences().current().await?.selected_instance;

            if visible.is_empty() {
                println!("No instances available for this account.");
            }
            for instance in &visible {
                println!(
                    "{} {} ({}, {})",
                    if selected.as_deref() == Some(instance.name.as_str()) {
                        "*"
                    } else {
                        " "
                    },
                    instance.name,
                    instance.minecraft_version().unwrap_or("unknown version"),
                    access_label(instance.access())
                );
            }
        }

        Commands::SelectInstance { name } => {
            let instance = launcher.instance_access().select_instance(&name).await?;
            println!("Selected instance: {}", instance.name);
        }

        Commands::Unlock { code } => {
            if launcher.settings.validation_url.is_none() {
                anyhow::bail!("no validation_url configured; set EMBER__VALIDATION_URL");
            }

            match launcher.instance_access().redeem_code(&code).await? {
                RedeemOutcome::Unlocked { instance, user } => {
                    println!("Code redeemed: '{}' unlocked for {}.", instance, user);
                }
                RedeemOutcome::AlreadyUnlocked => println!("You already have access to this instance."),
                RedeemOutcome::Invalid { message } => {
                    println!("Invalid code or instance not found: {}", message);
                }
            }
            launcher.instance_access().ensure_selection().await?;
        }

        Commands::News => {
            let news = launcher.news.latest_news().await?;
            if news.is_empty() {
                println!("No news.");
            }
            for item in news {
                println!(
                    "{} - {} ({})",
                    item.title,
                    item.author,
                    item.publish_date.as_deref().unwrap_or("undated")
                );
                if !item.content.is_empty() {
                    println!("  {}", item.content);
                }
            }
        }

        // --- Settings commands ---
        Commands::Settings => {
            let prefs = launcher.preferences();
            let memory = prefs.normalize_memory(total_memory_gb()).await?;
            let config = prefs.current().await?;

            println!("Game path:       {}", launcher.game_path().display());
            println!("Memory:          {} - {} GB", memory.min, memory.max);
            println!(
                "Java:            {}",
                config
                    .java
                    .path
                    .as_ref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| "bundled runtime".to_string())
            );
            println!(
                "Resolution:      {}x{}",
                config.game.screen.width, config.game.screen.height
            );
            println!("Downloads:       {}", config.launcher.download_multi);
            println!("Theme:           {:?}", config.launcher.theme);
            println!("Close behavior:  {}", config.launcher.close_behavior);
        }

        Commands::SetMemory { min, max, total_gb } => {
            let total = total_gb.unwrap_or_else(total_memory_gb);
            let memory = launcher.preferences().set_memory(min, max, total).await?;
            println!("Memory set to {} - {} GB.", memory.min, memory.max);
        }

        Commands::SetJava { path } => {
            launcher.preferences().set_java_path(path.clone()).await?;
            match path {
                Some(path) => println!("Java set to {}.", path.display()),
                None => println!("Using the bundled java runtime."),
            }
        }

        Commands::SetResolution {
            width,
            height,
            reset,
        } => {
            let prefs = launcher.preferences();
            match (reset, width, height) {
                (true, _, _) => {
                    prefs.reset_resolution().await?;
                    println!("Resolution reset.");
                }
                (false, Some(width), Some(height)) => {
                    prefs.set_resolution(width, height).await?;
                    println!("Resolution set to {}x{}.", width, height);
                }
                _ => anyhow::bail!("give a width and a height, or --reset"),
            }
        }

        Commands::CloseBehavior { mode } => {
            launcher.preferences().set_close_behavior(mode).await?;
            println!("Close behavior set to {}.", mode);
        }

        Commands::SetTheme { theme } => {
            launcher.preferences().set_theme(theme).await?;
            println!("Theme set to {:?}.", theme);
        }

        Commands::SetDownloads { count } => {
            launcher.preferences().set_download_multi(count).await?;
            println!("Parallel downloads set.");
        }

        Commands::Launch => {
            let selection = launcher.instance_access().ensure_selection().await?;
            let config = launcher.preferences().current().await?;

            let mut session = SessionState::new(config.launcher.close_behavior);
            if let Some(instance) = selection {
                session.apply(HostMessage::InstanceChanged {
                    name: instance.name.clone(),
                    instance: Some(instance),
                });
            }

            let pb = ProgressBar::new(100);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}% {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_bar())
                    .progress_chars("#>-"),
            );

            if let Some(action) = session.apply(HostMessage::GameLaunched) {
                pb.println(window_action_message(action));
            }
            let activity = session.activity();
            debug!(details = %activity.details, state = %activity.state, "presence updated");

            let progress = pb.clone();
            let result = launcher
                .launch()
                .execute(move |event| {
                    if let Some(percent) = event.percent() {
                        progress.set_position(percent.round() as u64);
                    }
                    match event {
                        LaunchEvent::Data(line) => progress.println(line),
                        LaunchEvent::Error(message) => progress.println(format!("error: {}", message)),
                        LaunchEvent::Close(code) => {
                            progress.set_message(format!("game exited ({:?})", code));
                        }
                        LaunchEvent::Extract => progress.set_message("extracting"),
                        LaunchEvent::Patch => progress.set_message("patching"),
                        LaunchEvent::Estimated(secs) => progress.set_message(format!("{}s left", secs)),
                        LaunchEvent::Speed(bytes) => {
                            progress.set_message(format!("{} kB/s", bytes / 1024));
                        }
                        LaunchEvent::Progress { .. } | LaunchEvent::Check { .. } => {}
                    }
                })
                .await;
            pb.finish_and_clear();

            if let Some(action) = session.apply(HostMessage::GameClosed) {
                println!("{}", window_action_message(action));
            }
            let options = result?;
            println!("{} closed.", options.instance);
        }
    }

    Ok(())
}
