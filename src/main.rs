#[tokio::main]
async fn main() {
    if let Err(e) = inspection_scheduler::run().await {
        tracing::error!("Inspection scheduler stopped: {}", e);
        eprintln!("Inspection scheduler stopped: {}", e);
        std::process::exit(1);
    }
}
