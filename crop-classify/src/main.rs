use std::error::Error;
use std::path::{Path, PathBuf};

use crop_grade::{GradingService, ModelResolver, TempUpload, Timer};
use log::info;
use structopt::StructOpt;

#[derive(StructOpt, Debug)]
#[structopt(
    name = "crop-classify",
    about = "CLI app to grade a produce photo with a fresh/rotten classifier"
)]
struct CmdArgs {
    #[structopt(
        parse(from_os_str),
        help = "SavedModel directory or crop-net weights file"
    )]
    model: PathBuf,

    #[structopt(help = "Image file, or http(s) URL to fetch it from")]
    image: String,
}

fn is_url(image: &str) -> bool {
    image.starts_with("http://") || image.starts_with("https://")
}

/// Last path segment of a URL, without query or fragment
fn url_file_name(url: &str) -> Option<&str> {
    let rest = url.split_once("://").map_or(url, |(_, rest)| rest);
    let rest = rest.split(['?', '#']).next()?;
    let (_, path) = rest.split_once('/')?;
    let name = path.rsplit('/').next()?;

    if name.is_empty() {
        None
    } else {
        Some(name)
    }
}

fn fetch(url: &str) -> Result<Vec<u8>, Box<dyn Error>> {
    let mut t = Timer::started(&format!("Fetching image from {}", url));

    let response = reqwest::blocking::get(url)?.error_for_status()?;
    let bytes = response.bytes()?.to_vec();

    t.stop();

    Ok(bytes)
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();
    let args = CmdArgs::from_args();

    let service = GradingService::new(ModelResolver::standard().resolve(&args.model));

    let report = if is_url(&args.image) {
        let bytes = fetch(&args.image)?;
        let staged = TempUpload::stage(&std::env::temp_dir(), url_file_name(&args.image), &bytes)?;
        service.grade_file(staged.path())
    } else {
        let path = Path::new(&args.image);
        if !path.is_file() {
            return Err(format!("no image at {}", path.display()).into());
        }
        service.grade_file(path)
    };

    info!("{} graded {} ({})", args.image, report.grade, report.confidence_label);
    println!("{}", serde_json::to_string_pretty(&report)?);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognises_urls() {
        assert!(is_url("https://example.com/apple.jpg"));
        assert!(is_url("http://localhost:8000/a.png"));
        assert!(!is_url("/tmp/apple.jpg"));
        assert!(!is_url("apple.jpg"));
    }

    #[test]
    fn file_name_comes_from_last_segment() {
        assert_eq!(url_file_name("https://cdn.test/img/apple.jpg?size=large"), Some("apple.jpg"));
        assert_eq!(url_file_name("https://cdn.test/img/"), None);
        assert_eq!(url_file_name("https://cdn.test"), None);
    }

    #[test]
    fn args_take_model_then_image() {
        let args = CmdArgs::from_iter_safe(&["crop-classify", "weights.json", "apple.png"]).unwrap();

        assert_eq!(args.model, PathBuf::from("weights.json"));
        assert_eq!(args.image, "apple.png");
    }
}
