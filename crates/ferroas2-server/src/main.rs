use ferroas2_core::ServerConfig;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    // Load configuration
    let config = ServerConfig::from_env()?;

    // Initialize the application (directories, certificates, partners, routes)
    let app = ferroas2_server::setup::initialize_app(config.clone()).await?;

    // Start the listeners and the scheduler
    ferroas2_server::setup::server::start_server(&config, app).await?;

    Ok(())
}
