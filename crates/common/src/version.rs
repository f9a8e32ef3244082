use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct BuildInfo {
    pub name: &'static str,
    pub version: &'static str,
    pub build_profile: &'static str,
    /// `git describe` of the tree the binary was built from, when known
    pub repo_version: Option<&'static str>,
    pub build_timestamp: Option<&'static str>,
}

/// Build information of the calling crate. Binaries whose build script
///  exports `BUILD_PROFILE`, `REPO_VERSION` and `BUILD_TIMESTAMP` get
///  those reported too.
#[macro_export]
macro_rules! build_info {
    () => {
        $crate::version::BuildInfo {
            name: env!("CARGO_PKG_NAME"),
            version: env!("CARGO_PKG_VERSION"),
            build_profile: match option_env!("BUILD_PROFILE") {
                Some(profile) => profile,
                None if cfg!(debug_assertions) => "debug",
                None => "release",
            },
            repo_version: option_env!("REPO_VERSION"),
            build_timestamp: option_env!("BUILD_TIMESTAMP"),
        }
    };
}

impl std::fmt::Display for BuildInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} ({})", self.name, self.version, self.build_profile)?;
        if let Some(repo_version) = self.repo_version {
            write!(f, " {}", repo_version)?;
        }
        if let Some(timestamp) = self.build_timestamp {
            write!(f, " built {}", timestamp)?;
        }
        Ok(())
    }
}
