#[tokio::main]
async fn main() {
    if let Err(e) = social_api::run().await {
        eprintln!("{:?}", e);
        std::process::exit(1);
    }
}
