use clap::Parser;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;

	let args = nearby_api::Args::parse();

	nearby_api::run(args).await
}
