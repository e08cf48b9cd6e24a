use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use structopt::StructOpt;

#[derive(StructOpt, Debug, Clone)]
#[structopt(
    name = "crop-grade-server",
    about = "HTTP endpoint grading produce photos with a fresh/rotten classifier"
)]
pub struct ServerConfig {
    #[structopt(
        long,
        env = "CROP_GRADE_MODEL",
        default_value = "crop_quality_model",
        parse(from_os_str),
        help = "SavedModel directory or crop-net weights file"
    )]
    pub model: PathBuf,

    #[structopt(long, env = "CROP_GRADE_BIND", default_value = "127.0.0.1")]
    pub bind: IpAddr,

    #[structopt(long, env = "CROP_GRADE_PORT", default_value = "5001")]
    pub port: u16,

    #[structopt(
        long,
        env = "CROP_GRADE_TEMP_DIR",
        default_value = "temp",
        parse(from_os_str),
        help = "Directory uploads are staged in while being graded"
    )]
    pub temp_dir: PathBuf,

    #[structopt(long, env = "CROP_GRADE_MAX_UPLOAD", default_value = "10485760")]
    pub max_upload_bytes: usize,
}

impl ServerConfig {
    pub fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = ServerConfig::from_iter_safe(&["crop-grade-server"]).unwrap();

        assert_eq!(config.model, PathBuf::from("crop_quality_model"));
        assert_eq!(config.addr(), "127.0.0.1:5001".parse().unwrap());
        assert_eq!(config.temp_dir, PathBuf::from("temp"));
        assert_eq!(config.max_upload_bytes, 10 * 1024 * 1024);
    }

    #[test]
    fn flags_override_defaults() {
        let config = ServerConfig::from_iter_safe(&[
            "crop-grade-server",
            "--model",
            "/srv/models/weights.json",
            "--bind",
            "0.0.0.0",
            "--port",
            "8080",
        ])
        .unwrap();

        assert_eq!(config.model, PathBuf::from("/srv/models/weights.json"));
        assert_eq!(config.addr(), "0.0.0.0:8080".parse().unwrap());
    }
}
