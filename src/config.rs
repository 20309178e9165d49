//! What to host and how to react to failures.

use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::HostError;
use crate::exports::InitializeOptions;

pub const ENV_HOSTFXR_PATH: &str = "CLRHOST_HOSTFXR_PATH";
pub const ENV_DOTNET_ROOT: &str = "DOTNET_ROOT";
pub const ENV_LOG: &str = "CLRHOST_LOG";
pub const ENV_ON_FAILURE: &str = "CLRHOST_ON_FAILURE";

const DEFAULT_COMPONENT: &str = "DotNetLib";
const DEFAULT_TYPE_NAME: &str = "DotNetLib.Lib, DotNetLib";
const DEFAULT_DELEGATE_TYPE: &str = "DotNetLib.Lib+CustomEntryPointDelegate, DotNetLib";

/// What to do when a step of the invocation sequence fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Stop at the first failed step.
    #[default]
    Abort,
    /// Log the failure and move on to the next step.
    Continue,
}

impl FromStr for FailurePolicy {
    type Err = HostError;

    fn from_str(value: &str) -> Result<FailurePolicy, HostError> {
        match value.trim().to_ascii_lowercase().as_str() {
            "abort" => Ok(FailurePolicy::Abort),
            "continue" => Ok(FailurePolicy::Continue),
            other => Err(HostError::Config(format!(
                "unsupported failure policy `{other}`; expected abort|continue"
            ))),
        }
    }
}

impl fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FailurePolicy::Abort => "abort",
            FailurePolicy::Continue => "continue",
        })
    }
}

#[derive(Debug, Clone)]
pub struct HostConfig {
    /// Directory holding the payload and its runtime config.
    pub root: PathBuf,
    /// Payload base name: `<component>.dll`, `<component>.runtimeconfig.json`.
    pub component: String,
    pub type_name: String,
    pub custom_delegate_type: String,
    pub hostfxr_path: Option<PathBuf>,
    pub dotnet_root: Option<PathBuf>,
    pub log_level: String,
    pub failure_policy: FailurePolicy,
}

impl HostConfig {
    pub fn new<P: Into<PathBuf>>(root: P) -> HostConfig {
        HostConfig {
            root: root.into(),
            component: DEFAULT_COMPONENT.to_string(),
            type_name: DEFAULT_TYPE_NAME.to_string(),
            custom_delegate_type: DEFAULT_DELEGATE_TYPE.to_string(),
            hostfxr_path: None,
            dotnet_root: None,
            log_level: default_log_level().to_string(),
            failure_policy: FailurePolicy::Abort,
        }
    }

    /// [`HostConfig::new`] with overrides from the process environment.
    pub fn from_env<P: Into<PathBuf>>(root: P) -> Result<HostConfig, HostError> {
        HostConfig::from_lookup(root, |name| std::env::var_os(name))
    }

    /// Like [`HostConfig::from_env`], reading variables through `lookup`.
    pub fn from_lookup<P, F>(root: P, lookup: F) -> Result<HostConfig, HostError>
    where
        P: Into<PathBuf>,
        F: Fn(&str) -> Option<OsString>,
    {
        let non_empty = |name: &str| lookup(name).filter(|value| !value.is_empty());
        let mut config = HostConfig::new(root);
        config.hostfxr_path = non_empty(ENV_HOSTFXR_PATH).map(PathBuf::from);
        config.dotnet_root = non_empty(ENV_DOTNET_ROOT).map(PathBuf::from);
        if let Some(level) = non_empty(ENV_LOG) {
            config.log_level = level.to_string_lossy().into_owned();
        }
        if let Some(policy) = non_empty(ENV_ON_FAILURE) {
            config.failure_policy = policy.to_string_lossy().parse()?;
        }
        Ok(config)
    }

    pub fn runtime_config_path(&self) -> PathBuf {
        self.root.join(format!("{}.runtimeconfig.json", self.component))
    }

    pub fn assembly_path(&self) -> PathBuf {
        self.root.join(format!("{}.dll", self.component))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Parameters for `hostfxr_initialize_*`.
    pub fn initialize_options(&self) -> InitializeOptions {
        InitializeOptions {
            host_path: None,
            dotnet_root: self.dotnet_root.clone(),
        }
    }
}

/// `debug` for debug builds, `info` for release builds.
pub fn default_log_level() -> &'static str {
    if cfg!(debug_assertions) {
        "debug"
    } else {
        "info"
    }
}
