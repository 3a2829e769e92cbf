use color_eyre::eyre::{Result, WrapErr};
use reflectsrv::common::EchoServerTrait;
use reflectsrv::http::{HttpConfig, ReflectServer};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize error handling
    color_eyre::install()?;

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("reflectsrv=info")),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() > 1 {
        eprintln!("Usage: {}", args[0]);
        eprintln!("  Takes no arguments. Configure with environment variables:");
        eprintln!("  PORT           Port to listen on (default: 3003)");
        eprintln!("  MAX_BODY_SIZE  Largest accepted request body in bytes (default: 10485760)");
        eprintln!("  RUST_LOG       Log filter (default: reflectsrv=info)");
        std::process::exit(2);
    }

    let config = HttpConfig::from_env().wrap_err("Invalid configuration")?;
    info!(
        address = %config.bind_addr,
        max_body_size = config.max_body_size,
        "Starting HTTP reflector"
    );

    let server = ReflectServer::reflector(config);
    server.run().await.wrap_err("Failed to run HTTP reflector")?;

    Ok(())
}
