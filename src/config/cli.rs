use crate::config::toml_config::TomlConfig;
use crate::domain::model::{CallerIdentity, DecodedToken, UploadFile};
use crate::utils::error::{Result, UploadError};
use crate::utils::validation::{self, Validate};
use clap::Parser;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, Parser)]
#[command(name = "upload-etl")]
#[command(about = "Classify an uploaded CSV against the reference service and store the accepted rows")]
pub struct CliConfig {
    /// CSV file to process; its name must follow <prefix>_<clients|contacts|results>_<suffix>
    #[arg(long)]
    pub file: Option<String>,

    /// TOML settings file
    #[arg(short, long)]
    pub config: Option<String>,

    #[arg(long, env = "REFERENCE_ENDPOINT")]
    pub reference_endpoint: Option<String>,

    #[arg(long, env = "UPLOAD_OUTPUT_PATH")]
    pub output_path: Option<String>,

    /// JSON file holding the decoded caller token ({"data": {"providerId": ...}}); takes precedence over the identity flags
    #[arg(long)]
    pub token: Option<String>,

    #[arg(long, env = "UPLOAD_PROVIDER_ID")]
    pub provider_id: Option<String>,

    #[arg(long, env = "UPLOAD_TEAM")]
    pub team: Option<String>,

    #[arg(long, env = "UPLOAD_TEAM_ID")]
    pub team_id: Option<String>,

    #[arg(long, env = "UPLOAD_LOCATION_ID")]
    pub location_id: Option<String>,

    #[arg(long, help = "Report the first rejected row instead of omitting it")]
    pub keep_first_rejected: bool,

    #[arg(long, help = "Do not repeat column names as the first output record")]
    pub no_label_row: bool,

    #[arg(long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Emit logs as JSON")]
    pub json_logs: bool,
}

impl CliConfig {
    /// Settings file (or defaults) with command line overrides applied.
    pub fn load_settings(&self) -> Result<TomlConfig> {
        let mut settings = match &self.config {
            Some(path) => TomlConfig::from_file(path)?,
            None => TomlConfig::default(),
        };

        if let Some(endpoint) = &self.reference_endpoint {
            settings.source.endpoint = endpoint.clone();
        }
        if let Some(output_path) = &self.output_path {
            settings.load.output_path = output_path.clone();
        }
        if self.keep_first_rejected {
            settings.report.drop_first_rejected = false;
        }
        if self.no_label_row {
            settings.report.emit_label_row = false;
        }

        settings.validate()?;
        Ok(settings)
    }

    pub fn caller_identity(&self) -> Result<CallerIdentity> {
        if let Some(path) = &self.token {
            let content = std::fs::read_to_string(path)?;
            let token: DecodedToken = serde_json::from_str(&content)?;
            return Ok(token.data);
        }

        Ok(CallerIdentity::new(
            validation::validate_required_field("provider_id", &self.provider_id)?.clone(),
            validation::validate_required_field("team", &self.team)?.clone(),
            validation::validate_required_field("team_id", &self.team_id)?.clone(),
            validation::validate_required_field("location_id", &self.location_id)?.clone(),
        ))
    }

    /// Reads the upload; `None` when no file was given.
    pub fn upload_file(&self) -> Result<Option<UploadFile>> {
        let Some(path) = &self.file else {
            return Ok(None);
        };

        let bytes = std::fs::read(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => UploadError::MissingFile,
            _ => UploadError::IoError(e),
        })?;
        let file_name = std::path::Path::new(path)
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| UploadError::InvalidFileName { name: path.clone() })?;

        Ok(Some(UploadFile::new(file_name, bytes)))
    }
}

impl Validate for CliConfig {
    fn validate(&self) -> Result<()> {
        if let Some(file) = &self.file {
            validation::validate_path("file", file)?;
            validation::validate_file_extensions("file", std::slice::from_ref(file), &["csv"])?;
        }
        if let Some(endpoint) = &self.reference_endpoint {
            validation::validate_url("reference_endpoint", endpoint)?;
        }
        if let Some(output_path) = &self.output_path {
            validation::validate_path("output_path", output_path)?;
        }
        Ok(())
    }
}
