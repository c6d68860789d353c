use afgctrl::{session::ConnectionConfig, FunctionGenerator};

#[tokio::main]
async fn main() -> afgctrl::Result<()> {
    env_logger::init();

    let config = ConnectionConfig::default();
    let mut fg = FunctionGenerator::connect(&config).await?;

    let result = async {
        // 3 Vpp square at 1 kHz on the output
        let state = fg.startup().await?;
        println!("Startup: {}", state);

        fg.set_frequency(2e3).await?;

        fg.disable().await?;
        fg.enable().await?;

        // Double pulse per trigger
        fg.set_burst(2).await?;
        fg.end_burst().await
    }
    .await;

    result.and(fg.close().await)
}
