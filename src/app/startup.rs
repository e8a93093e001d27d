//! Process entry point: arguments, logging, host construction and the run
//! loop until shutdown.

use crate::app::args::Args;
use crate::app::display::{modules_table, print_load_report, print_shutdown_report, status_table};
use crate::app::error::{AppError, AppResult};
use crate::config::api::{ConfigStore, TomlConfigStore};
use crate::core::error_handling::log_error_with_context;
use crate::core::logging::{init_logging, LoggingOptions};
use crate::core::shutdown::ShutdownCoordinator;
use crate::core::version::{build_time, get_api_version, git_hash};
use crate::host::api::{HostConfig, ModuleHost};
use crate::module::builtin::api::{builtin_factories, get_all_builtin_modules};
use clap::Parser;
use std::process::ExitCode;
use std::sync::Arc;

pub fn startup() -> ExitCode {
    let args = Args::parse();
    let use_color = args.use_color();

    if args.list_modules {
        let modules: Vec<_> = get_all_builtin_modules()
            .iter()
            .map(|m| m.module_info())
            .collect();
        modules_table(&modules, use_color).printstd();
        return ExitCode::SUCCESS;
    }

    let options = LoggingOptions {
        level: args.log_level.clone(),
        format: args.log_format(),
        file: args.log_file.clone(),
        color: use_color,
    };
    if let Err(e) = init_logging(&options) {
        let error = AppError::Logging {
            message: e.to_string(),
        };
        eprintln!("{error}");
        return ExitCode::FAILURE;
    }

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            log_error_with_context(&AppError::Runtime(e), "Startup");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(args, use_color)) {
        Ok(code) => code,
        Err(e) => {
            log_error_with_context(&e, "modhost");
            ExitCode::FAILURE
        }
    }
}

async fn load_host_config(args: &Args) -> AppResult<HostConfig> {
    match args.config_path() {
        Some(path) => {
            log::debug!("Reading host configuration from '{}'", path.display());
            Ok(HostConfig::load(&path).await?)
        }
        None => {
            log::debug!("No configuration file; using defaults");
            Ok(HostConfig::default())
        }
    }
}

async fn run(args: Args, use_color: bool) -> AppResult<ExitCode> {
    log::info!(
        "modhost {} starting (module API {}, built {}, {})",
        env!("CARGO_PKG_VERSION"),
        get_api_version(),
        build_time(),
        git_hash()
    );

    let config = load_host_config(&args).await?;
    let store_path = args.store_path().ok_or(AppError::NoStorePath)?;
    let store = TomlConfigStore::open(&store_path)?;
    log::debug!("Module store: '{}'", store.path().display());

    let host = ModuleHost::builder()
        .config(config)
        .config_store(Arc::new(store) as Arc<dyn ConfigStore>)
        .build()?;

    let coordinator = ShutdownCoordinator::new();
    coordinator.install_signal_handlers();

    let report = host.load(builtin_factories(&args.exclude)).await?;
    print_load_report(&report, use_color);
    status_table(&host.module_statuses(), use_color).printstd();

    match args.run_for() {
        Some(limit) => {
            tokio::select! {
                _ = coordinator.wait() => {}
                _ = tokio::time::sleep(limit) => log::info!("Run time of {:?} elapsed", limit),
            }
        }
        None => coordinator.wait().await,
    }

    let shutdown = host.shutdown().await;
    print_shutdown_report(&shutdown, use_color);

    if report.is_success() && shutdown.is_clean() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}
