use {
    anyhow::Result,
    chunkvault::{cli::Cli, config::Config, run, setup_logger},
    clap::Parser,
    std::io,
};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;
    setup_logger(config.log_file.as_deref(), &config.log_filter)?;
    run(cli.command, &config, &mut io::stdout()).await
}
