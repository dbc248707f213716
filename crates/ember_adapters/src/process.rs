use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use ember_core::entities::ProviderType;
use ember_core::launch_options::{LaunchEvent, LaunchOptions};
use ember_core::ports::GameLauncher;
use ember_core::Error;
use serde::Deserialize;
use tokio::fs;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tracing::{debug, info, instrument, warn};

pub const VANILLA_MAIN_CLASS: &str = "net.minecraft.client.main.Main";

#[cfg(target_os = "windows")]
const OS_NAME: &str = "windows";
#[cfg(target_os = "macos")]
const OS_NAME: &str = "osx";
#[cfg(not(any(target_os = "windows", target_os = "macos")))]
const OS_NAME: &str = "linux";

const CLASSPATH_SEPARATOR: &str = if cfg!(windows) { ";" } else { ":" };
const JAVA_BINARY: &str = if cfg!(windows) { "javaw.exe" } else { "java" };

/// Where an installed instance keeps its files under the game path
#[derive(Debug, Clone, PartialEq)]
pub struct GameLayout {
    pub game_dir: PathBuf,
    pub version_jar: PathBuf,
    pub version_json: PathBuf,
    pub natives_dir: PathBuf,
    pub libraries_dir: PathBuf,
    pub assets_dir: PathBuf,
    pub runtime_dir: PathBuf,
}

impl GameLayout {
    pub fn new(root: &Path, instance: &str, version: &str) -> Self {
        let version_dir = root.join("versions").join(version);
        Self {
            game_dir: root.join("instances").join(instance),
            version_jar: version_dir.join(format!("{}.jar", version)),
            version_json: version_dir.join(format!("{}.json", version)),
            natives_dir: version_dir.join("natives"),
            libraries_dir: root.join("libraries"),
            assets_dir: root.join("assets"),
            runtime_dir: root.join("runtime"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct OsRule {
    name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct LibraryRule {
    action: String,
    os: Option<OsRule>,
}

#[derive(Debug, Clone, Deserialize)]
struct LibraryArtifact {
    path: String,
}

#[derive(Debug, Clone, Deserialize)]
struct LibraryDownloads {
    artifact: Option<LibraryArtifact>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Library {
    #[serde(default)]
    pub name: String,
    downloads: Option<LibraryDownloads>,
    rules: Option<Vec<LibraryRule>>,
}

impl Library {
    /// Last matching rule wins; a library with rules and no match is skipped
    pub fn is_allowed(&self, os_name: &str) -> bool {
        let Some(rules) = &self.rules else {
            return true;
        };
        let mut allowed = false;
        for rule in rules {
            let matches = match rule.os.as_ref().and_then(|os| os.name.as_deref()) {
                Some(name) => name == os_name,
                None => true,
            };
            if matches {
                allowed = rule.action == "allow";
            }
        }
        allowed
    }

    fn artifact_path(&self) -> Option<&str> {
        self.downloads
            .as_ref()
            .and_then(|d| d.artifact.as_ref())
            .map(|a| a.path.as_str())
    }
}

#[derive(Debug, Clone, Deserialize)]
struct AssetIndexRef {
    id: String,
}

/// The installed `versions/<v>/<v>.json`, reduced to what a vanilla launch reads
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionProfile {
    #[serde(default)]
    pub id: String,
    #[serde(default = "default_main_class")]
    pub main_class: String,
    asset_index: Option<AssetIndexRef>,
    /// Pre-1.7 files name the index here instead
    assets: Option<String>,
    #[serde(default)]
    pub libraries: Vec<Library>,
}

fn default_main_class() -> String {
    VANILLA_MAIN_CLASS.to_string()
}

impl VersionProfile {
    pub async fn load(path: &Path) -> Result<Self, Error> {
        let data = fs::read_to_string(path).await.map_err(|e| {
            Error::Launch(format!("cannot read version file {}: {}", path.display(), e))
        })?;
        serde_json::from_str(&data).map_err(|e| {
            Error::Launch(format!("invalid version file {}: {}", path.display(), e))
        })
    }

    pub fn asset_index(&self) -> &str {
        self.asset_index
            .as_ref()
            .map(|index| index.id.as_str())
            .or(self.assets.as_deref())
            .unwrap_or(&self.id)
    }

    /// Library artifacts allowed on `os_name`, then the client jar
    pub fn classpath(&self, layout: &GameLayout, os_name: &str) -> Vec<PathBuf> {
        let mut classpath: Vec<PathBuf> = self
            .libraries
            .iter()
            .filter(|lib| lib.is_allowed(os_name))
            .filter_map(|lib| lib.artifact_path())
            .map(|path| layout.libraries_dir.join(path))
            .collect();
        classpath.push(layout.version_jar.clone());
        classpath
    }
}

fn user_type(options: &LaunchOptions) -> &'static str {
    let account = &options.authenticator;
    match account.provider() {
        ProviderType::Microsoft => "msa",
        ProviderType::Mojang if account.meta.online => "mojang",
        _ => "legacy",
    }
}

/// JVM and game arguments for a vanilla launch, in order
pub fn build_arguments(
    options: &LaunchOptions,
    layout: &GameLayout,
    version: &str,
    profile: &VersionProfile,
    classpath: &[PathBuf],
) -> Vec<String> {
    let account = &options.authenticator;
    let classpath = classpath
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(CLASSPATH_SEPARATOR);

    let mut args = vec![
        format!("-Xms{}", options.memory.min),
        format!("-Xmx{}", options.memory.max),
        format!("-Djava.library.path={}", layout.natives_dir.display()),
    ];
    if cfg!(target_os = "macos") {
        args.push("-XstartOnFirstThread".to_string());
    }
    args.extend([
        "-cp".to_string(),
        classpath,
        profile.main_class.clone(),
        "--username".to_string(),
        account.name.clone(),
        "--version".to_string(),
        version.to_string(),
        "--gameDir".to_string(),
        layout.game_dir.display().to_string(),
        "--assetsDir".to_string(),
        layout.assets_dir.display().to_string(),
        "--assetIndex".to_string(),
        profile.asset_index().to_string(),
        "--uuid".to_string(),
        account.uuid.clone().unwrap_or_default(),
        "--accessToken".to_string(),
        account.access_token().unwrap_or_default().to_string(),
        "--userType".to_string(),
        user_type(options).to_string(),
        "--width".to_string(),
        options.screen.width.to_string(),
        "--height".to_string(),
        options.screen.height.to_string(),
    ]);
    args
}

/// Configured binary, else the runtime bundled under the game path, else `java` on PATH
pub async fn resolve_java(configured: Option<&Path>, runtime_dir: &Path) -> PathBuf {
    if let Some(path) = configured {
        if fs::try_exists(path).await.unwrap_or(false) {
            return path.to_path_buf();
        }
        warn!(path = %path.display(), "configured java not found, falling back");
    }

    if let Ok(mut runtimes) = fs::read_dir(runtime_dir).await {
        let mut candidates = Vec::new();
        while let Ok(Some(entry)) = runtimes.next_entry().await {
            candidates.push(entry.path().join("bin").join(JAVA_BINARY));
        }
        candidates.sort();
        for candidate in candidates {
            if fs::try_exists(&candidate).await.unwrap_or(false) {
                return candidate;
            }
        }
    }

    PathBuf::from(JAVA_BINARY)
}

async fn forward_lines<R>(reader: R, on_event: &(dyn Fn(LaunchEvent) + Send + Sync))
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        on_event(LaunchEvent::Data(line));
    }
}

/// Runs an already installed vanilla client with the system or bundled java
#[derive(Default)]
pub struct JavaProcessLauncher;

impl JavaProcessLauncher {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl GameLauncher for JavaProcessLauncher {
    #[instrument(skip(self, options, on_event), fields(instance = %options.instance))]
    async fn launch(
        &self,
        options: &LaunchOptions,
        on_event: &(dyn Fn(LaunchEvent) + Send + Sync),
    ) -> Result<(), Error> {
        let version = options
            .version
            .as_deref()
            .ok_or_else(|| Error::Launch("instance does not name a minecraft version".into()))?;
        let layout = GameLayout::new(&options.path, &options.instance, version);

        if !fs::try_exists(&layout.version_jar).await.unwrap_or(false) {
            return Err(Error::Launch(format!(
                "version {} is not installed at {}",
                version,
                layout.version_jar.display()
            )));
        }
        if options.loader.enable {
            warn!(loader = ?options.loader.kind, "mod loaders are not started, launching vanilla");
        }

        let profile = VersionProfile::load(&layout.version_json).await?;
        let classpath = profile.classpath(&layout, OS_NAME);
        debug!(
            entries = classpath.len(),
            asset_index = profile.asset_index(),
            "classpath resolved"
        );

        fs::create_dir_all(&layout.game_dir).await?;
        let java = resolve_java(options.java_path.as_deref(), &layout.runtime_dir).await;

        info!(java = %java.display(), version, "spawning game process");
        let mut child = Command::new(&java)
            .args(build_arguments(options, &layout, version, &profile, &classpath))
            .current_dir(&layout.game_dir)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(!options.detached)
            .spawn()
            .map_err(|e| Error::Launch(format!("failed to start {}: {}", java.display(), e)))?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let forward_stdout = async {
            if let Some(out) = stdout {
                forward_lines(out, on_event).await;
            }
        };
        let forward_stderr = async {
            if let Some(err) = stderr {
                forward_lines(err, on_event).await;
            }
        };
        tokio::join!(forward_stdout, forward_stderr);

        let status = child.wait().await?;
        info!(code = ?status.code(), "game process exited");
        on_event(LaunchEvent::Close(status.code()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ember_core::config::ClientConfig;
    use ember_core::entities::{Account, InstanceDescriptor, LoaderInfo};
    use serde_json::json;
    use std::sync::Mutex;
    use tempfile::tempdir;

    fn options(root: &Path, provider: &str) -> LaunchOptions {
        let account: Account = serde_json::from_value(json!({
            "id": "a",
            "name": "Alice",
            "uuid": "u-1",
            "access_token": "tok",
            "meta": { "type": provider, "online": true }
        }))
        .unwrap();
        let mut instance = InstanceDescriptor::new("Survival");
        instance.loader = Some(LoaderInfo {
            minecraft_version: Some("1.20.1".to_string()),
            loader_type: Some("none".to_string()),
            loader_version: None,
        });
        LaunchOptions::build(&instance, &account, &ClientConfig::default(), root.to_path_buf())
    }

    #[test]
    fn test_layout() {
        let layout = GameLayout::new(Path::new("/data/.Ember"), "Survival", "1.20.1");

        assert_eq!(layout.game_dir, PathBuf::from("/data/.Ember/instances/Survival"));
        assert_eq!(
            layout.version_jar,
            PathBuf::from("/data/.Ember/versions/1.20.1/1.20.1.jar")
        );
        assert_eq!(layout.libraries_dir, PathBuf::from("/data/.Ember/libraries"));
    }

    #[test]
    fn test_arguments() {
        let root = Path::new("/data/.Ember");
        let options = options(root, "Xbox");
        let layout = GameLayout::new(root, "Survival", "1.20.1");
        let profile: VersionProfile = serde_json::from_value(json!({
            "id": "1.20.1",
            "assetIndex": { "id": "5" }
        }))
        .unwrap();
        let classpath = vec![PathBuf::from("/lib/a.jar"), layout.version_jar.clone()];

        let args = build_arguments(&options, &layout, "1.20.1", &profile, &classpath);

        assert_eq!(args[0], "-Xms2048M");
        assert_eq!(args[1], "-Xmx4096M");
        let value_of = |flag: &str| {
            let pos = args.iter().position(|a| a == flag).unwrap();
            args[pos + 1].clone()
        };
        assert_eq!(
            value_of("-cp"),
            format!(
                "/lib/a.jar{}/data/.Ember/versions/1.20.1/1.20.1.jar",
                CLASSPATH_SEPARATOR
            )
        );
        assert_eq!(value_of("--username"), "Alice");
        assert_eq!(value_of("--uuid"), "u-1");
        assert_eq!(value_of("--accessToken"), "tok");
        assert_eq!(value_of("--userType"), "msa");
        assert_eq!(value_of("--width"), "854");
        assert_eq!(value_of("--version"), "1.20.1");
        assert_eq!(value_of("--assetIndex"), "5");
        assert!(args.contains(&VANILLA_MAIN_CLASS.to_string()));
    }

    #[test]
    fn test_user_type_by_provider() {
        let root = Path::new("/data");
        assert_eq!(user_type(&options(root, "Xbox")), "msa");
        assert_eq!(user_type(&options(root, "Mojang")), "mojang");
        assert_eq!(user_type(&options(root, "AZauth")), "legacy");
    }

    #[tokio::test]
    async fn test_version_profile_drives_classpath_and_asset_index() {
        let dir = tempdir().unwrap();
        let layout = GameLayout::new(dir.path(), "Survival", "1.20.1");
        std::fs::create_dir_all(layout.version_json.parent().unwrap()).unwrap();
        std::fs::write(
            &layout.version_json,
            json!({
                "id": "1.20.1",
                "mainClass": "net.minecraft.client.main.Main",
                "assetIndex": { "id": "5", "url": "https://example.com/5.json" },
                "libraries": [
                    {
                        "name": "com.google.code.gson:gson:2.10",
                        "downloads": { "artifact": { "path": "com/google/code/gson/gson/2.10/gson-2.10.jar" } }
                    },
                    {
                        "name": "org.lwjgl:lwjgl:3.3.1",
                        "downloads": { "artifact": { "path": "org/lwjgl/lwjgl/3.3.1/lwjgl-3.3.1.jar" } },
                        "rules": [{ "action": "allow", "os": { "name": OS_NAME } }]
                    },
                    {
                        "name": "org.lwjgl:lwjgl-natives:3.3.1",
                        "downloads": { "artifact": { "path": "org/lwjgl/lwjgl/3.3.1/lwjgl-natives.jar" } },
                        "rules": [{ "action": "allow" }, { "action": "disallow", "os": { "name": OS_NAME } }]
                    },
                    { "name": "legacy:classifiers-only:1.0", "downloads": {} }
                ]
            })
            .to_string(),
        )
        .unwrap();
        // Jars from another installed version must stay off the classpath
        let other = layout.libraries_dir.join("org/lwjgl/lwjgl/3.2.2");
        std::fs::create_dir_all(&other).unwrap();
        std::fs::write(other.join("lwjgl-3.2.2.jar"), b"").unwrap();

        let profile = VersionProfile::load(&layout.version_json).await.unwrap();
        let classpath = profile.classpath(&layout, OS_NAME);

        assert_eq!(profile.asset_index(), "5");
        assert_eq!(profile.main_class, VANILLA_MAIN_CLASS);
        assert_eq!(
            classpath,
            vec![
                layout
                    .libraries_dir
                    .join("com/google/code/gson/gson/2.10/gson-2.10.jar"),
                layout.libraries_dir.join("org/lwjgl/lwjgl/3.3.1/lwjgl-3.3.1.jar"),
                layout.version_jar.clone(),
            ]
        );

        let options = options(dir.path(), "Xbox");
        let args = build_arguments(&options, &layout, "1.20.1", &profile, &classpath);
        let pos = args.iter().position(|a| a == "--assetIndex").unwrap();
        assert_eq!(args[pos + 1], "5");
    }

    #[test]
    fn test_legacy_profile_asset_index() {
        let old: VersionProfile =
            serde_json::from_value(json!({ "id": "1.6.4", "assets": "legacy" })).unwrap();
        assert_eq!(old.asset_index(), "legacy");
        assert_eq!(old.main_class, VANILLA_MAIN_CLASS);

        let bare: VersionProfile = serde_json::from_value(json!({ "id": "rd-132211" })).unwrap();
        assert_eq!(bare.asset_index(), "rd-132211");
    }

    #[tokio::test]
    async fn test_launch_requires_version_file() {
        let dir = tempdir().unwrap();
        let options = options(dir.path(), "Xbox");
        let layout = GameLayout::new(dir.path(), "Survival", "1.20.1");
        std::fs::create_dir_all(layout.version_jar.parent().unwrap()).unwrap();
        std::fs::write(&layout.version_jar, b"").unwrap();

        let result = JavaProcessLauncher::new()
            .launch(&options, &|_e: LaunchEvent| {})
            .await;

        assert!(matches!(result, Err(Error::Launch(msg)) if msg.contains("version file")));
    }

    #[tokio::test]
    async fn test_resolve_java_prefers_bundled_runtime() {
        let dir = tempdir().unwrap();
        let bin = dir.path().join("runtime").join("java-17").join("bin");
        std::fs::create_dir_all(&bin).unwrap();
        std::fs::write(bin.join(JAVA_BINARY), b"").unwrap();

        let missing = dir.path().join("nope").join("java");
        let resolved = resolve_java(Some(&missing), &dir.path().join("runtime")).await;
        assert_eq!(resolved, bin.join(JAVA_BINARY));

        let empty = tempdir().unwrap();
        let fallback = resolve_java(None, &empty.path().join("runtime")).await;
        assert_eq!(fallback, PathBuf::from(JAVA_BINARY));
    }

    #[tokio::test]
    async fn test_launch_requires_installed_version() {
        let dir = tempdir().unwrap();
        let options = options(dir.path(), "Xbox");
        let events = Mutex::new(Vec::new());

        let result = JavaProcessLauncher::new()
            .launch(&options, &|e: LaunchEvent| events.lock().unwrap().push(e))
            .await;

        assert!(matches!(result, Err(Error::Launch(msg)) if msg.contains("not installed")));
        assert!(events.lock().unwrap().is_empty());
    }
}
