//! Process entry point: load settings, build the device pool and
//! attendance cache, start the scheduler, then either serve the HTTP API
//! or dispatch a CLI subcommand.

use std::sync::Arc;

use clap::Parser;
use fingerprint_ctl::cache::AttendanceCache;
use fingerprint_ctl::cli::{Cli, CliContext, Command};
use fingerprint_ctl::config::{self, Settings};
use fingerprint_ctl::hris::HrisClient;
use fingerprint_ctl::http;
use fingerprint_ctl::pool::DevicePool;
use fingerprint_ctl::protocol::ZkProtocolClient;
use fingerprint_ctl::scheduler::Scheduler;
use fingerprint_ctl::storage::S3Client;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::load()?;
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(&settings.log_level),
    )
    .init();

    let devices = config::load_devices(&settings.zk_machines_config)?;
    let pool = Arc::new(DevicePool::new(
        devices,
        Arc::new(|config| Box::new(ZkProtocolClient::new(config.clone()))),
    ));
    let cache = Arc::new(AttendanceCache::new());
    let settings = Arc::new(settings);
    let s3 = S3Client::from_settings(&settings).await.map(Arc::new);
    let hris = HrisClient::from_settings(&settings).map(Arc::new);

    let cli = Cli::parse();

    if let Command::Serve = cli.command {
        let scheduler = if settings.scheduler_enabled {
            Some(Scheduler::start(settings.clone(), pool.clone(), cache.clone(), s3.clone()).await?)
        } else {
            None
        };

        let state = http::AppState {
            settings: settings.clone(),
            pool: pool.clone(),
            cache: cache.clone(),
            s3: s3.clone(),
            hris: hris.clone(),
        };
        let app = http::build_app(state);

        let addr = format!("{}:{}", settings.api_host, settings.api_port);
        log::info!("listening on {addr}");
        let listener = tokio::net::TcpListener::bind(&addr).await?;
        axum::serve(listener, app).await?;

        if let Some(scheduler) = scheduler {
            scheduler.shutdown().await;
        }
        return Ok(());
    }

    let ctx = CliContext {
        settings,
        pool,
        cache,
        s3,
        hris,
    };
    fingerprint_ctl::cli::dispatch(cli.command, ctx).await?;
    Ok(())
}
