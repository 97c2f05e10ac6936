#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = lms_backend::run_worker().await {
        eprintln!("lms-worker fatal: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}
