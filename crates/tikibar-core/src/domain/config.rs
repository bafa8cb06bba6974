//! Configuration types.
//!
//! Two independent configuration structures live here:
//!
//! - [`HostConfig`] – knobs for the in-page runtime.  Built once at start-up
//!   (from defaults, or from a partial JSON object handed over by the page's
//!   bootstrap script) and passed to the orchestrator.
//! - [`InjectionConfig`] – knobs for the server that injects the bootstrap
//!   markup into HTML responses.  Usually read from a TOML file.
//!
//! Both are plain structs with no global state.  Every field has a serde
//! default so a partial document is accepted and an empty one yields
//! [`Default::default`].

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::frame::{CONTAINER_ID, DEFAULT_HEIGHT_PX, FRAME_PATH, FRAME_Z_INDEX};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// A field value was parseable but unusable.
    #[error("invalid config value for `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

// ── Host (in-page) configuration ──────────────────────────────────────────────

/// Runtime settings for the in-page host.
///
/// | Field                   | Default                      |
/// |-------------------------|------------------------------|
/// | container_id            | `tikibar_iframe_container`   |
/// | correlation_field       | `correlation_id`             |
/// | correlation_attribute   | `value`                      |
/// | protocol_global         | `TIKI_PROTOCOL`              |
/// | fallback_scheme         | `https`                      |
/// | frame_path              | `/tikibar/`                  |
/// | initial_height          | `60`                         |
/// | z_index                 | `1000`                       |
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    /// Reserved id of the overlay container.  Any existing element with this
    /// id is removed before a new overlay is attached.
    pub container_id: String,

    /// `name` of the document element carrying the page's correlation id.
    pub correlation_field: String,

    /// Attribute of that element holding the id.
    pub correlation_attribute: String,

    /// Page-global variable holding the scheme of the diagnostic frame URL.
    pub protocol_global: String,

    /// Scheme used when the page-global is missing.
    pub fallback_scheme: String,

    /// Path of the diagnostic document on the current host.
    pub frame_path: String,

    /// Initial container and frame height in CSS pixels.
    pub initial_height: f64,

    /// Stacking order of the frame.
    pub z_index: i32,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            container_id: CONTAINER_ID.to_string(),
            correlation_field: "correlation_id".to_string(),
            correlation_attribute: "value".to_string(),
            protocol_global: "TIKI_PROTOCOL".to_string(),
            fallback_scheme: "https".to_string(),
            frame_path: FRAME_PATH.to_string(),
            initial_height: DEFAULT_HEIGHT_PX,
            z_index: FRAME_Z_INDEX,
        }
    }
}

impl HostConfig {
    /// Checks the values a page could plausibly get wrong.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for an empty container id, a
    /// non-finite or negative initial height, or an empty fallback scheme.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.container_id.is_empty() {
            return Err(ConfigError::Invalid {
                field: "container_id",
                reason: "must not be empty".to_string(),
            });
        }
        if !self.initial_height.is_finite() || self.initial_height < 0.0 {
            return Err(ConfigError::Invalid {
                field: "initial_height",
                reason: format!("{} is not a usable pixel height", self.initial_height),
            });
        }
        if self.fallback_scheme.is_empty() {
            return Err(ConfigError::Invalid {
                field: "fallback_scheme",
                reason: "must not be empty".to_string(),
            });
        }
        Ok(())
    }
}

// ── Injection (server-side) configuration ─────────────────────────────────────

/// Settings for injecting the bootstrap markup into HTML responses.
///
/// ```toml
/// enabled = true
/// debug = false
/// script_url = "/static/tikibar/tikibar_host.js"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InjectionConfig {
    /// Master switch.  When `false` responses are passed through untouched.
    pub enabled: bool,

    /// Debug deployments may serve the frame over plain `http`.
    pub debug: bool,

    /// URL of the compiled runtime module loaded by the injected script.
    pub script_url: String,
}

impl Default for InjectionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            debug: false,
            script_url: "/static/tikibar/tikibar_host.js".to_string(),
        }
    }
}

impl InjectionConfig {
    /// Parses an injection config from TOML text.
    ///
    /// Missing fields take their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] if the text is not valid TOML or a field
    /// has the wrong type, and [`ConfigError::Invalid`] if `script_url` is
    /// empty.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        if config.script_url.is_empty() {
            return Err(ConfigError::Invalid {
                field: "script_url",
                reason: "must not be empty".to_string(),
            });
        }
        Ok(config)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_defaults() {
        let cfg = HostConfig::default();
        assert_eq!(cfg.container_id, "tikibar_iframe_container");
        assert_eq!(cfg.correlation_field, "correlation_id");
        assert_eq!(cfg.protocol_global, "TIKI_PROTOCOL");
        assert_eq!(cfg.initial_height, 60.0);
        assert_eq!(cfg.z_index, 1000);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_host_config_accepts_partial_json() {
        // Arrange: a page overriding only the fallback scheme
        let json = r#"{ "fallback_scheme": "http" }"#;

        // Act
        let cfg: HostConfig = serde_json::from_str(json).unwrap();

        // Assert: the override applies and everything else is defaulted
        assert_eq!(cfg.fallback_scheme, "http");
        assert_eq!(cfg.container_id, "tikibar_iframe_container");
    }

    #[test]
    fn test_host_config_rejects_negative_height() {
        let cfg = HostConfig {
            initial_height: -1.0,
            ..HostConfig::default()
        };
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::Invalid { field: "initial_height", .. })
        ));
    }

    #[test]
    fn test_host_config_rejects_empty_container_id() {
        let cfg = HostConfig {
            container_id: String::new(),
            ..HostConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_injection_defaults_from_empty_toml() {
        let cfg = InjectionConfig::from_toml_str("").unwrap();
        assert_eq!(cfg, InjectionConfig::default());
    }

    #[test]
    fn test_injection_toml_overrides() {
        let text = r#"
            enabled = false
            debug = true
            script_url = "https://cdn.example.com/tikibar.js"
        "#;

        let cfg = InjectionConfig::from_toml_str(text).unwrap();

        assert!(!cfg.enabled);
        assert!(cfg.debug);
        assert_eq!(cfg.script_url, "https://cdn.example.com/tikibar.js");
    }

    #[test]
    fn test_injection_toml_with_wrong_type_is_parse_error() {
        let result = InjectionConfig::from_toml_str("enabled = \"yes\"");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_injection_toml_with_empty_script_url_is_invalid() {
        let result = InjectionConfig::from_toml_str("script_url = \"\"");
        assert!(matches!(result, Err(ConfigError::Invalid { field: "script_url", .. })));
    }
}
