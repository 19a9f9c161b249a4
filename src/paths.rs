use directories::ProjectDirs;
use std::fs;
use std::path::PathBuf;

/// Per-user locations of the demo editor's files.
pub struct AppPaths {
    pub config_file: PathBuf,
    pub documents: PathBuf,
}

impl AppPaths {
    pub fn from_project_dirs() -> Option<Self> {
        ProjectDirs::from("com", "textimageblock", "TextImageBlock").map(|dirs| Self {
            config_file: dirs.config_dir().join("config.json"),
            documents: dirs.data_dir().join("documents"),
        })
    }

    pub fn ensure_dirs_exist(&self) -> std::io::Result<()> {
        if let Some(config_dir) = self.config_file.parent() {
            fs::create_dir_all(config_dir)?;
        }
        fs::create_dir_all(&self.documents)?;
        Ok(())
    }
}
