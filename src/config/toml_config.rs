use crate::core::ConfigProvider;
use crate::domain::model::UploadType;
use crate::utils::error::{Result, UploadError};
use crate::utils::validation::{self, Validate};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_REFERENCE_ENDPOINT: &str = "http://localhost:3000/get-uploaded-ctc-numbers";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    pub source: SourceConfig,
    pub load: LoadConfig,
    pub columns: ColumnsConfig,
    pub report: ReportConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub endpoint: String,
    pub timeout_seconds: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_REFERENCE_ENDPOINT.to_string(),
            timeout_seconds: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadConfig {
    pub output_path: String,
    pub directories: DirectoriesConfig,
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self {
            output_path: "./uploads".to_string(),
            directories: DirectoriesConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DirectoriesConfig {
    pub clients: String,
    pub contacts: String,
    pub results: String,
}

impl Default for DirectoriesConfig {
    fn default() -> Self {
        Self {
            clients: "index_uploads".to_string(),
            contacts: "contacts_uploads".to_string(),
            results: "results_uploads".to_string(),
        }
    }
}

/// Header names of the column each upload type is checked against.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnsConfig {
    pub clients_identifier: String,
    pub contacts_reference: String,
    pub results_reference: String,
}

impl Default for ColumnsConfig {
    fn default() -> Self {
        Self {
            clients_identifier: "ctc_number".to_string(),
            contacts_reference: "index_ctc_number".to_string(),
            results_reference: "index_ctc_number".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    /// Omit the first rejected row from the report, as earlier releases did.
    pub drop_first_rejected: bool,
    /// Repeat the column names as the first record after the header.
    pub emit_label_row: bool,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            drop_first_rejected: true,
            emit_label_row: true,
        }
    }
}

impl TomlConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(UploadError::IoError)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| UploadError::ConfigError {
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${REFERENCE_HOST})
    fn substitute_env_vars(content: &str) -> Result<String> {
        use regex::Regex;
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| UploadError::ConfigError {
            message: format!("invalid substitution pattern: {}", e),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    pub fn validate_config(&self) -> Result<()> {
        validation::validate_url("source.endpoint", &self.source.endpoint)?;
        validation::validate_positive_number(
            "source.timeout_seconds",
            self.source.timeout_seconds,
            1,
        )?;
        validation::validate_path("load.output_path", &self.load.output_path)?;

        let dirs = &self.load.directories;
        validation::validate_relative_dir("load.directories.clients", &dirs.clients)?;
        validation::validate_relative_dir("load.directories.contacts", &dirs.contacts)?;
        validation::validate_relative_dir("load.directories.results", &dirs.results)?;

        let cols = &self.columns;
        validation::validate_non_empty_string("columns.clients_identifier", &cols.clients_identifier)?;
        validation::validate_non_empty_string("columns.contacts_reference", &cols.contacts_reference)?;
        validation::validate_non_empty_string("columns.results_reference", &cols.results_reference)?;

        Ok(())
    }
}

impl ConfigProvider for TomlConfig {
    fn reference_endpoint(&self) -> &str {
        &self.source.endpoint
    }

    fn output_path(&self) -> &str {
        &self.load.output_path
    }

    fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.source.timeout_seconds)
    }

    fn upload_directory(&self, upload_type: UploadType) -> &str {
        match upload_type {
            UploadType::Clients => &self.load.directories.clients,
            UploadType::Contacts => &self.load.directories.contacts,
            UploadType::Results => &self.load.directories.results,
        }
    }

    fn identifier_column(&self, upload_type: UploadType) -> &str {
        match upload_type {
            UploadType::Clients => &self.columns.clients_identifier,
            UploadType::Contacts => &self.columns.contacts_reference,
            UploadType::Results => &self.columns.results_reference,
        }
    }

    fn emit_label_row(&self) -> bool {
        self.report.emit_label_row
    }

    fn drop_first_rejected(&self) -> bool {
        self.report.drop_first_rejected
    }
}

impl Validate for TomlConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}
