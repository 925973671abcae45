use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct Paths {
    pub base: PathBuf,
}

impl Paths {
    pub fn new() -> Self {
        let base = dirs::home_dir()
            .map(|h| h.join(".autosignup"))
            .unwrap_or_else(|| PathBuf::from(".autosignup"));
        Self { base }
    }

    pub fn with_base(base: PathBuf) -> Self {
        Self { base }
    }

    pub fn config_file(&self) -> PathBuf {
        self.base.join("config.json")
    }

    /// Persistent Chrome user data dir, reused across runs so cookies survive.
    pub fn profile_dir(&self) -> PathBuf {
        self.base.join("profile")
    }

    pub fn debug_dir(&self) -> PathBuf {
        self.base.join("debug")
    }

    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.base)?;
        std::fs::create_dir_all(self.profile_dir())?;
        std::fs::create_dir_all(self.debug_dir())?;
        Ok(())
    }
}

impl Default for Paths {
    fn default() -> Self {
        Self::new()
    }
}
