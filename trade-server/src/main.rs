use trade_server::{Config, Server, ServerState, print_banner};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Environment (dotenv, logging)
    dotenv::dotenv().ok();
    let config = Config::from_env();
    trade_server::init_logger_with_file(None, config.log_dir.as_deref());

    print_banner();
    tracing::info!("Trade server starting...");

    // 2. Initialize server state
    let state = ServerState::initialize(&config);

    // 3. Run the HTTP server (API + gateway)
    let server = Server::with_state(config, state);
    server.run().await?;

    Ok(())
}
