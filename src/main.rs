use std::path::PathBuf;
use std::process::ExitCode;

use clrhost::scenario::{self, ScenarioReport};
use clrhost::{logging, native_api, FixedLocator, HostConfig, HostfxrLocator, Hostfxr, NethostLocator};
use log::{debug, error, info};

fn main() -> ExitCode {
    // The payload and its runtime config are expected next to the host.
    let root = match std::env::current_exe() {
        Ok(exe) => exe.parent().map(PathBuf::from).unwrap_or_default(),
        Err(err) => {
            eprintln!("unable to determine the host directory: {}", err);
            return ExitCode::FAILURE;
        }
    };

    let config = match HostConfig::from_env(root) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{}", err);
            return ExitCode::FAILURE;
        }
    };
    if let Err(err) = logging::init_logging(&config.log_level) {
        eprintln!("{}", err);
        return ExitCode::FAILURE;
    }

    match run(&config) {
        Ok(report) if report.is_success() => {
            info!("all {} steps completed", report.completed.len());
            ExitCode::SUCCESS
        }
        Ok(report) => {
            for (step, err) in &report.failed {
                error!("{} failed: {}", step, err);
            }
            ExitCode::FAILURE
        }
        Err(err) => {
            error!("{}", err);
            ExitCode::FAILURE
        }
    }
}

fn run(config: &HostConfig) -> clrhost::Result<ScenarioReport> {
    debug!(
        "hosting {} from {} (log level {})",
        config.component,
        config.root().display(),
        logging::logging_level().unwrap_or("unset")
    );
    let exports = native_api::exported_symbols();
    debug!(
        "native exports: {}",
        exports.iter().map(|(name, _)| *name).collect::<Vec<_>>().join(", ")
    );

    let locator: Box<dyn HostfxrLocator> = match &config.hostfxr_path {
        Some(path) => Box::new(FixedLocator(path.clone())),
        None => {
            let locator = NethostLocator::default();
            Box::new(match &config.dotnet_root {
                Some(root) => locator.with_dotnet_root(root),
                None => locator,
            })
        }
    };
    let assembly_path = config.assembly_path();
    let hostfxr = Hostfxr::locate_and_load(locator.as_ref(), Some(assembly_path.as_path()))?
        .with_options(config.initialize_options());

    scenario::run_component_example(&hostfxr, config)
}
