#[tokio::main]
async fn main() {
    if let Err(err) = tb_api::run().await {
        eprintln!("tb-api failed: {err}");
        std::process::exit(1);
    }
}
