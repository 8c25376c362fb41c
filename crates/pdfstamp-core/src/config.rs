//! Editor configuration
//!
//! Every field has a default, so an empty TOML document (or an empty JS
//! object on the WASM side) yields the stock editor behaviour.

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::coords::{Point, Size};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EditorConfig {
    /// Overlay configuration
    pub overlay: OverlayConfig,
    /// Zoom limits for the page container
    pub zoom: ZoomConfig,
    /// Identity registered with the collaboration layer
    pub document_id: String,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            overlay: OverlayConfig::default(),
            zoom: ZoomConfig::default(),
            document_id: "pdf-document-1".to_string(),
        }
    }
}

impl EditorConfig {
    /// Load configuration from a TOML file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or the TOML is malformed
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from a TOML string
    ///
    /// ```
    /// use pdfstamp_core::config::EditorConfig;
    ///
    /// # fn example() -> anyhow::Result<()> {
    /// let config = EditorConfig::from_toml_str(r#"
    ///     [overlay]
    ///     stagger = 30.0
    /// "#)?;
    /// assert_eq!(config.overlay.stagger, 30.0);
    /// # Ok(())
    /// # }
    /// ```
    pub fn from_toml_str(s: &str) -> anyhow::Result<Self> {
        let config: Self = toml::from_str(s).context("Failed to parse TOML configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from JSON (as passed across the WASM boundary)
    pub fn from_json_str(s: &str) -> anyhow::Result<Self> {
        let config: Self = serde_json::from_str(s).context("Failed to parse JSON configuration")?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        let overlay = &self.overlay;
        if overlay.min_size.width <= 0.0 || overlay.min_size.height <= 0.0 {
            anyhow::bail!("overlay.min_size must be positive");
        }
        if overlay.default_size.width < overlay.min_size.width
            || overlay.default_size.height < overlay.min_size.height
        {
            anyhow::bail!("overlay.default_size must not be smaller than overlay.min_size");
        }
        let zoom = &self.zoom;
        if zoom.min <= 0.0 || zoom.min > zoom.max || zoom.step <= 0.0 {
            anyhow::bail!("zoom limits must satisfy 0 < min <= max and step > 0");
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OverlayConfig {
    /// Size given to a freshly added overlay
    pub default_size: Size,
    /// Resizing never goes below this
    pub min_size: Size,
    /// Position of the first overlay
    pub anchor: Point,
    /// Offset applied per overlay already staged
    pub stagger: f64,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            default_size: Size::new(150.0, 100.0),
            min_size: Size::new(80.0, 50.0),
            anchor: Point::new(100.0, 100.0),
            stagger: 20.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ZoomConfig {
    pub step: f64,
    pub min: f64,
    pub max: f64,
}

impl Default for ZoomConfig {
    fn default() -> Self {
        Self {
            step: 0.25,
            min: 0.5,
            max: 3.0,
        }
    }
}
