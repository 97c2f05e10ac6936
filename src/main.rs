#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = lms_backend::run().await {
        eprintln!("lms-backend fatal: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}
