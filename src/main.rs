use clap::Parser;
use upload_etl::utils::error::ErrorSeverity;
use upload_etl::utils::{logger, validation::Validate};
use upload_etl::{
    CliConfig, ErrorResponse, HttpReferenceFetcher, LocalStorage, StatusResponse, UploadError,
    UploadOrchestrator, UploadResponse,
};

fn exit_code(e: &UploadError) -> i32 {
    match e.severity() {
        ErrorSeverity::Low => 0,
        ErrorSeverity::Medium => 2, // 可重試
        ErrorSeverity::High => 1,
        ErrorSeverity::Critical => 3,
    }
}

fn fail(e: UploadError) -> anyhow::Result<()> {
    tracing::error!(
        "❌ Upload failed: {} (Category: {:?}, Severity: {:?})",
        e,
        e.category(),
        e.severity()
    );
    tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

    println!("{}", serde_json::to_string_pretty(&ErrorResponse::from(&e))?);
    eprintln!("❌ {}", e.user_friendly_message());

    let code = exit_code(&e);
    if code > 0 {
        std::process::exit(code);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = CliConfig::parse();

    if config.json_logs {
        logger::init_json_logger();
    } else {
        logger::init_cli_logger(config.verbose);
    }

    tracing::info!("Starting upload-etl");
    if config.verbose {
        tracing::debug!("CLI config: {:?}", config);
    }

    if let Err(e) = config.validate() {
        return fail(e);
    }

    let settings = match config.load_settings() {
        Ok(settings) => settings,
        Err(e) => return fail(e),
    };
    let caller = match config.caller_identity() {
        Ok(caller) => caller,
        Err(e) => return fail(e),
    };
    let file = match config.upload_file() {
        Ok(Some(file)) => file,
        Ok(None) => {
            // Nothing to process: answer like the auth-root probe.
            println!("{}", serde_json::to_string_pretty(&StatusResponse::probe(true))?);
            return Ok(());
        }
        Err(e) => return fail(e),
    };

    let storage = LocalStorage::new(settings.load.output_path.clone());
    let reference = HttpReferenceFetcher::from_config(&settings);
    tracing::info!("Reference service: {}", reference.endpoint());
    let orchestrator = UploadOrchestrator::new(storage, reference, settings);

    match orchestrator.handle_request(Some(file), &caller).await {
        Ok(report) => {
            tracing::info!("✅ {}", report.message());
            tracing::info!(
                "📁 Output saved to: {}/{}",
                orchestrator.config().load.output_path,
                report.output_path
            );
            let response = UploadResponse::from(report);
            println!("{}", serde_json::to_string_pretty(&response)?);
            Ok(())
        }
        Err(e) => fail(e),
    }
}
