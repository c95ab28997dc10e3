use std::io;
use std::path::{Path, PathBuf};

/// Directory name the launcher and shared libraries are installed under.
pub const INSTALL_DIR_NAME: &str = "winstone-ce";

/// File name of the bundled Winstone launcher archive.
pub const LAUNCHER_ARCHIVE_NAME: &str = "winstone-0.9.10.jar";

/// Install-derived values used for configuration fields left empty.
///
/// See [`LaunchConfiguration::with_defaults`](crate::config::LaunchConfiguration::with_defaults).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuntimeDefaults {
    /// Used when no working directory is configured, usually the project root.
    pub working_directory: PathBuf,
    /// Used when no launcher archive is configured.
    pub launcher_archive: PathBuf,
    /// Used when no common library directory is configured.
    pub common_lib_directory: PathBuf,
}

impl RuntimeDefaults {
    /// Derives the defaults from the host's install layout.
    ///
    /// * `project_dir` - base directory of the project being served
    /// * `plugins_dir` - directory the runner's bundled files are installed in
    /// * `system_dir` - writable per-user state directory
    pub fn from_layout(project_dir: &Path, plugins_dir: &Path, system_dir: &Path) -> Self {
        Self {
            working_directory: project_dir.to_path_buf(),
            launcher_archive: plugins_dir
                .join(INSTALL_DIR_NAME)
                .join("lib")
                .join(LAUNCHER_ARCHIVE_NAME),
            common_lib_directory: system_dir
                .join("plugins")
                .join(INSTALL_DIR_NAME)
                .join("commonLibs"),
        }
    }

    /// Creates the common library directory if it does not exist yet.
    pub fn ensure_common_lib_directory(&self) -> io::Result<&Path> {
        std::fs::create_dir_all(&self.common_lib_directory)?;
        tracing::debug!(path = %self.common_lib_directory.display(), "Common library directory ready");
        Ok(&self.common_lib_directory)
    }
}
