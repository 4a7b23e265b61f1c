use terraform_provider_ripe_atlas::{init_logging, serve, RipeAtlasProvider};

#[tokio::main]
async fn main() {
    init_logging();

    if let Err(e) = serve(RipeAtlasProvider::new()).await {
        eprintln!("terraform-provider-ripe-atlas: {}", e);
        std::process::exit(1);
    }
}
