use crop_grade_server::ServerConfig;
use structopt::StructOpt;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    env_logger::init();
    let config = ServerConfig::from_args();

    crop_grade_server::run(config).await
}
