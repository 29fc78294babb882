//! Configuration data models

use crate::reader::ResourceName;
use serde::{Deserialize, Serialize};

/// A system module and icon group to try when looking up the default executable icon
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefaultIconSource {
    /// File name of the module inside the system directory
    pub module: String,
    /// Integer id of the `RT_GROUP_ICON` resource
    pub group: u16,
}

impl DefaultIconSource {
    /// Create a new source
    pub fn new(module: impl Into<String>, group: u16) -> Self {
        Self {
            module: module.into(),
            group,
        }
    }

    /// Resource name of the group
    pub fn group_name(&self) -> ResourceName {
        ResourceName::Id(self.group)
    }
}

/// Top-level extraction configuration
///
/// Missing fields take their default value, so a partial file is valid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractorConfig {
    /// Keep embedded PNG images instead of transcoding or dropping them
    pub prefer_png: bool,
    /// Sources for the default executable icon, tried in order
    pub default_icon_sources: Vec<DefaultIconSource>,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            prefer_png: true,
            default_icon_sources: vec![
                DefaultIconSource::new("imageres.dll", 15),
                DefaultIconSource::new("shell32.dll", 3),
            ],
        }
    }
}
