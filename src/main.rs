use anyhow::Context;
use amped::{cli::cli_args_from_env, config::Config, logging::init_tracing, server};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = cli_args_from_env()?;
    let mut config = Config::load_or_default(&args.config_path, args.config_explicit)
        .with_context(|| format!("failed to load config from {}", args.config_path.display()))?;
    config.apply_overrides(&args.overrides);
    config.validate()?;

    let logging = init_tracing(&config.logging).context("failed to initialize logging")?;
    tracing::info!(
        target: "amped",
        run_id = logging.run_id(),
        log_dir = %logging.log_dir().display(),
        project_key = %config.project_key,
        mode = config.experiment.mode.as_str(),
        "amped_starting"
    );

    server::run(config).await
}
