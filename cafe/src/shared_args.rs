use crate::config::AnalysisConfig;
use crate::error::Result;
use clap::Args;
use std::path::PathBuf;

/// Parse an image argument in format "GROUP:PATH"
fn parse_grouped_path(s: &str) -> std::result::Result<GroupedPath, String> {
    let (group, path) = s
        .split_once(':')
        .ok_or_else(|| format!("Expected 'GROUP:PATH', got '{s}'"))?;

    let group = group.trim();
    if group.is_empty() {
        return Err("Group name cannot be empty".to_string());
    }
    if path.is_empty() {
        return Err(format!("Missing path for group '{group}'"));
    }

    Ok(GroupedPath {
        group: group.to_string(),
        path: PathBuf::from(path),
    })
}

/// Image file tagged with the experimental group it belongs to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupedPath {
    pub group: String,
    pub path: PathBuf,
}

impl std::str::FromStr for GroupedPath {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        parse_grouped_path(s)
    }
}

impl std::fmt::Display for GroupedPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.group, self.path.display())
    }
}

/// Common arguments shared across the analysis subcommands
#[derive(Args, Debug, Clone, Default)]
pub struct SharedAnalysisArgs {
    /// JSON file with analysis parameters; defaults are used when omitted
    #[arg(long)]
    pub config: Option<PathBuf>,
}

impl SharedAnalysisArgs {
    /// Load the configured parameters, or the defaults when no file was given
    pub fn load_config(&self) -> Result<AnalysisConfig> {
        match &self.config {
            Some(path) => AnalysisConfig::load_from_file(path),
            None => Ok(AnalysisConfig::default()),
        }
    }
}

/// File name component of a path, for CSV output
pub fn display_name(path: &std::path::Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
