pub mod routes;
pub mod state;

use std::{net::SocketAddr, path::PathBuf};

use clap::Parser;
use color_eyre::eyre;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use crate::state::AppState;

#[derive(Debug, Parser)]
#[command(
	version = nearby_cli::VERSION,
	rename_all = "kebab",
	styles = nearby_cli::styles(),
)]
pub struct Args {
	#[arg(long, short = 'c', value_name = "FILE")]
	pub config: PathBuf,
}

pub async fn run(args: Args) -> color_eyre::Result<()> {
	let config = nearby_config::load(&args.config)?;

	init_tracing(&config)?;

	let http_addr: SocketAddr = config.service.http_bind.parse()?;

	if config.security.bind_localhost_only && !http_addr.ip().is_loopback() {
		return Err(eyre::eyre!(
			"http_bind must be a loopback address when bind_localhost_only is true."
		));
	}

	let state = AppState::new(config);
	let app = routes::router(state);
	let http_listener = TcpListener::bind(http_addr).await?;

	tracing::info!(%http_addr, "HTTP server listening.");

	axum::serve(http_listener, app).await?;

	Ok(())
}

fn init_tracing(config: &nearby_config::Config) -> color_eyre::Result<()> {
	let filter = env_filter(&config.service.log_level)?;

	tracing_subscriber::fmt().with_env_filter(filter).init();

	Ok(())
}

fn env_filter(log_level: &str) -> color_eyre::Result<EnvFilter> {
	EnvFilter::try_new(log_level)
		.map_err(|err| eyre::eyre!("service.log_level {log_level:?} is not a valid filter: {err}."))
}
