use clap::Parser;
use color_eyre::Result;
use dexterm::app::App;
use dexterm::config::Config;
use dexterm::logging;
use dexterm::route::Route;
use std::path::PathBuf;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "dexterm")]
#[command(about = "A terminal catalog viewer for the PokéAPI")]
#[command(version)]
struct Args {
  /// Path to config file (default: ./dexterm.yaml, then $XDG_CONFIG_HOME/dexterm/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// Route to open at startup, e.g. /?page=3, /load-more?q=eevee, /pokemon/25
  #[arg(short, long, default_value = "/")]
  route: String,

  /// API base URL, overriding the config file
  #[arg(long)]
  base_url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();

  let mut config = Config::load(args.config.as_deref())?;
  if let Some(base_url) = args.base_url {
    config.api.base_url = base_url;
  }

  let _log_guard = logging::init(&config.log)?;
  info!(
    version = env!("CARGO_PKG_VERSION"),
    base_url = %config.api.base_url,
    page_size = config.page_size.get(),
    "starting dexterm"
  );

  let mut app = App::new(config, Route::parse(&args.route))?;
  app.run().await?;

  Ok(())
}
