use anyhow::Result;
use clap::Parser;

use docktrap_daemon::{cli, logging, orchestrator};

use docktrap_core::config::DocktrapConfig;
use docktrap_core::error::{ConfigError, DocktrapError};

#[tokio::main]
async fn main() -> Result<()> {
    let args = cli::DaemonCli::parse();

    // 설정 로드: 파일이 없으면 기본값 + 환경변수로 기동합니다.
    let mut config = match DocktrapConfig::load(&args.config).await {
        Ok(config) => config,
        Err(DocktrapError::Config(ConfigError::FileNotFound { path })) => {
            let mut config = DocktrapConfig::default();
            config.apply_env_overrides();
            config
                .validate()
                .map_err(|e| anyhow::anyhow!("default config invalid after env overrides: {e}"))?;
            eprintln!("config file {path} not found, using defaults");
            config
        }
        Err(err) => return Err(anyhow::anyhow!("failed to load config: {err}")),
    };

    // CLI 인자가 최우선입니다.
    if let Some(log_level) = args.log_level {
        config.general.log_level = log_level;
    }
    if let Some(log_format) = args.log_format {
        config.general.log_format = log_format;
    }
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("config validation failed: {e}"))?;

    if args.validate {
        println!("configuration OK");
        return Ok(());
    }

    logging::init_tracing(&config.general)?;
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        sensor_id = %config.sensor.id,
        "docktrap-daemon starting"
    );

    let mut orchestrator = orchestrator::Orchestrator::build_from_config(config)?;
    orchestrator.run().await
}
