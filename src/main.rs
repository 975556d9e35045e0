use anyhow::Context;
use clap::Parser;
use feedback_collector::utils::error::{CollectorError, ErrorSeverity};
use feedback_collector::utils::{logger, validation::Validate};
use feedback_collector::{CliConfig, EtlEngine, FeedbackCollector, PgSink};

fn exit_with(e: &CollectorError) -> ! {
    tracing::error!(
        "❌ Feedback collection failed: {} (Category: {:?}, Severity: {:?})",
        e,
        e.category(),
        e.severity()
    );
    tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

    eprintln!("❌ {}", e.user_friendly_message());
    eprintln!("💡 {}", e.recovery_suggestion());

    let exit_code = match e.severity() {
        ErrorSeverity::Low => 0,
        ErrorSeverity::Medium => 2, // 重新執行可能成功
        ErrorSeverity::High => 1,
        ErrorSeverity::Critical => 3,
    };
    std::process::exit(exit_code);
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env 需在解析參數前載入，讓 clap 的 env 後備值生效
    if let Err(e) = dotenv::dotenv() {
        if !e.not_found() {
            return Err(e).context("failed to load .env");
        }
    }

    let config = CliConfig::parse();

    if config.json_logs {
        logger::init_json_logger(config.verbose);
    } else {
        logger::init_cli_logger(config.verbose);
    }

    tracing::info!("Starting feedback-collector");
    tracing::debug!("CLI config: {:?}", config);

    if let Err(e) = config.validate() {
        exit_with(&e);
    }

    let settings = config.load_settings().unwrap_or_else(|e| exit_with(&e));
    let collector_config = config
        .collector_config(settings)
        .unwrap_or_else(|e| exit_with(&e));

    // dry run 不寫入資料庫，因此不要求連線字串
    let database_url = if config.dry_run {
        config.database_url.clone().unwrap_or_default()
    } else {
        config
            .database_url()
            .map(str::to_string)
            .unwrap_or_else(|e| exit_with(&e))
    };

    let span = tracing::info_span!(
        "feedback_collector",
        schema = %collector_config.target.schema,
        table = %collector_config.target.table
    );
    let sink = PgSink::new(database_url);
    let mut collector = FeedbackCollector::new(collector_config, sink)
        .unwrap_or_else(|e| exit_with(&e))
        .with_log_span(span);

    if config.dry_run {
        tracing::info!("🔍 DRY RUN MODE - only the record count is requested");
        let pages = collector
            .get_total_page_count()
            .await
            .unwrap_or_else(|e| exit_with(&e));
        println!(
            "Would fetch {} pages ({} .. {}) and replace {}",
            pages,
            collector.page_url(1),
            collector.page_url(pages.max(1)),
            collector.target()
        );
        return Ok(());
    }

    if config.monitor {
        tracing::info!("🔍 System monitoring enabled");
    }

    let mut engine = EtlEngine::new_with_monitoring(collector, config.monitor);
    match engine.run().await {
        Ok(destination) => {
            tracing::info!("✅ Feedback collection completed successfully!");
            println!("✅ Replaced {}", destination);
        }
        Err(e) => exit_with(&e),
    }

    Ok(())
}
