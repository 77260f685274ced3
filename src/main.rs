use clap::Parser;
use iana_etc::core::LoadOutcome;
use iana_etc::utils::{logger, validation::Validate};
use iana_etc::{CliConfig, EtlEngine, HttpFetcher, IanaError, IanaPipeline, LocalStorage};

fn fail(e: &IanaError) -> ! {
    // 詳細錯誤資訊只在 --verbose 時記錄
    tracing::debug!(
        "Run failed: {} (Category: {:?}, Severity: {:?})",
        e,
        e.category(),
        e.severity()
    );
    tracing::debug!("Recovery suggestion: {}", e.recovery_suggestion());

    // 預設日誌層級下，這是 stderr 上唯一的錯誤訊息
    eprintln!("❌ {}", e.user_friendly_message());
    std::process::exit(e.exit_code());
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let config = CliConfig::parse();

    // 初始化日誌
    if config.json_logs {
        logger::init_json_logger(config.verbose);
    } else {
        logger::init_cli_logger(config.verbose);
    }

    tracing::info!("Starting iana-etc");
    tracing::debug!("CLI config: {:?}", config);

    let settings = match config.resolve() {
        Ok(settings) => settings,
        Err(e) => fail(&e),
    };

    // 驗證配置
    if let Err(e) = settings.validate() {
        fail(&e);
    }

    let fetcher = match HttpFetcher::new(
        settings.timeout(),
        settings.retry_attempts,
        settings.retry_delay(),
    ) {
        Ok(fetcher) => fetcher,
        Err(e) => fail(&e),
    };

    // 創建存儲和管道
    let storage = LocalStorage::new(settings.output_path.clone());
    let pipeline = IanaPipeline::new(fetcher, storage, settings);
    let engine = EtlEngine::new(pipeline);

    match engine.run().await {
        Ok(summary) => {
            let status = match summary.outcome {
                LoadOutcome::Written => "written",
                LoadOutcome::Unchanged => "unchanged",
            };
            println!(
                "iana-etc {}: {} protocols, {} services, {} ({})",
                summary.version, summary.protocols, summary.services, status, summary.output_path
            );
        }
        Err(e) => fail(&e),
    }
}
