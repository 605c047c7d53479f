use std::path::{Path, PathBuf};

/// Script text plus the path it was read from, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptSource {
    code: String,
    path: Option<PathBuf>,
}

impl ScriptSource {
    pub fn from_string(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            path: None,
        }
    }

    pub fn from_file(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref();
        let code = std::fs::read_to_string(path)?;
        Ok(Self {
            code,
            path: Some(path.to_path_buf()),
        })
    }

    pub fn with_path(code: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            code: code.into(),
            path: Some(path.into()),
        }
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Document name used in source maps and diagnostics.
    pub fn name(&self) -> String {
        self.path
            .as_ref()
            .map_or_else(|| "<script>".to_string(), |path| path.display().to_string())
    }
}
