use std::path::PathBuf;

use anyhow::{Context, Result, anyhow, bail};

/// Runtime configuration for the capture loop and the HTTP endpoint.
#[derive(Clone, Debug)]
pub(crate) struct ServiceConfig {
    pub(crate) camera_index: i32,
    pub(crate) model_path: PathBuf,
    pub(crate) bind_addr: String,
    pub(crate) port: u16,
    pub(crate) width: i32,
    pub(crate) height: i32,
    pub(crate) detection_confidence: f32,
    pub(crate) tracking_confidence: f32,
    pub(crate) use_cpu: bool,
    pub(crate) verbose: bool,
}

const USAGE: &str = "Usage: handfeed --model <path> [--camera <index>] [--bind <addr>] \
[--port <port>] [--width <px>] [--height <px>] [--detection-confidence <0..=1>] \
[--tracking-confidence <0..=1>] [--cpu] [--verbose]";

impl ServiceConfig {
    pub(crate) fn from_args(args: &[String]) -> Result<Self> {
        if args.len() < 2 {
            bail!(USAGE);
        }

        let mut camera_index: Option<i32> = None;
        let mut model_path: Option<PathBuf> = None;
        let mut bind_addr: Option<String> = None;
        let mut port: Option<u16> = None;
        let mut width: Option<i32> = None;
        let mut height: Option<i32> = None;
        let mut detection_confidence: Option<f32> = None;
        let mut tracking_confidence: Option<f32> = None;
        let mut use_cpu = false;
        let mut verbose = false;

        let mut idx = 1;
        while idx < args.len() {
            match args[idx].as_str() {
                "--camera" => {
                    idx += 1;
                    let value = args
                        .get(idx)
                        .ok_or_else(|| anyhow!("--camera requires a value"))?
                        .parse::<i32>()
                        .with_context(|| "--camera must be an integer device index".to_string())?;
                    if value < 0 {
                        bail!("--camera must be a non-negative device index");
                    }
                    camera_index = Some(value);
                    idx += 1;
                }
                "--model" => {
                    idx += 1;
                    let value = args
                        .get(idx)
                        .ok_or_else(|| anyhow!("--model requires a value"))?
                        .clone();
                    model_path = Some(PathBuf::from(value));
                    idx += 1;
                }
                "--bind" => {
                    idx += 1;
                    let value = args
                        .get(idx)
                        .ok_or_else(|| anyhow!("--bind requires a value"))?
                        .clone();
                    bind_addr = Some(value);
                    idx += 1;
                }
                "--port" => {
                    idx += 1;
                    let value = args
                        .get(idx)
                        .ok_or_else(|| anyhow!("--port requires a value"))?
                        .parse::<u16>()
                        .with_context(|| "--port must be a valid TCP port".to_string())?;
                    port = Some(value);
                    idx += 1;
                }
                "--width" => {
                    idx += 1;
                    let value = args
                        .get(idx)
                        .ok_or_else(|| anyhow!("--width requires a value"))?
                        .parse::<i32>()
                        .with_context(|| "--width must be a positive integer".to_string())?;
                    if value <= 0 {
                        bail!("--width must be a positive integer");
                    }
                    width = Some(value);
                    idx += 1;
                }
                "--height" => {
                    idx += 1;
                    let value = args
                        .get(idx)
                        .ok_or_else(|| anyhow!("--height requires a value"))?
                        .parse::<i32>()
                        .with_context(|| "--height must be a positive integer".to_string())?;
                    if value <= 0 {
                        bail!("--height must be a positive integer");
                    }
                    height = Some(value);
                    idx += 1;
                }
                "--detection-confidence" => {
                    idx += 1;
                    let value = parse_confidence(args.get(idx), "--detection-confidence")?;
                    detection_confidence = Some(value);
                    idx += 1;
                }
                "--tracking-confidence" => {
                    idx += 1;
                    let value = parse_confidence(args.get(idx), "--tracking-confidence")?;
                    tracking_confidence = Some(value);
                    idx += 1;
                }
                "--cpu" => {
                    use_cpu = true;
                    idx += 1;
                }
                "--verbose" => {
                    verbose = true;
                    idx += 1;
                }
                arg => {
                    bail!("Unrecognised flag: {arg}");
                }
            }
        }

        let model_path = model_path
            .ok_or_else(|| anyhow!("Missing model path. Provide --model <path>.\n\n{USAGE}"))?;

        Ok(Self {
            camera_index: camera_index.unwrap_or(1),
            model_path,
            bind_addr: bind_addr.unwrap_or_else(|| "0.0.0.0".to_string()),
            port: port.unwrap_or(1999),
            width: width.unwrap_or(640),
            height: height.unwrap_or(480),
            detection_confidence: detection_confidence.unwrap_or(0.5),
            tracking_confidence: tracking_confidence.unwrap_or(0.5),
            use_cpu,
            verbose,
        })
    }
}

fn parse_confidence(value: Option<&String>, flag: &str) -> Result<f32> {
    let value = value
        .ok_or_else(|| anyhow!("{flag} requires a value"))?
        .parse::<f32>()
        .with_context(|| format!("{flag} must be a number between 0 and 1"))?;
    if !(0.0..=1.0).contains(&value) {
        bail!("{flag} must be between 0 and 1");
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        std::iter::once("handfeed")
            .chain(list.iter().copied())
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn defaults_match_the_deployed_service() {
        let config = ServiceConfig::from_args(&args(&["--model", "hand.pt"])).unwrap();
        assert_eq!(config.camera_index, 1);
        assert_eq!(config.bind_addr, "0.0.0.0");
        assert_eq!(config.port, 1999);
        assert_eq!(config.width, 640);
        assert_eq!(config.height, 480);
        assert_eq!(config.detection_confidence, 0.5);
        assert_eq!(config.tracking_confidence, 0.5);
        assert!(!config.use_cpu);
        assert!(!config.verbose);
    }

    #[test]
    fn flags_override_defaults() {
        let config = ServiceConfig::from_args(&args(&[
            "--model",
            "hand.pt",
            "--camera",
            "2",
            "--bind",
            "127.0.0.1",
            "--port",
            "8099",
            "--detection-confidence",
            "0.7",
            "--tracking-confidence",
            "0.4",
            "--cpu",
            "--verbose",
        ]))
        .unwrap();
        assert_eq!(config.camera_index, 2);
        assert_eq!(config.bind_addr, "127.0.0.1");
        assert_eq!(config.port, 8099);
        assert_eq!(config.detection_confidence, 0.7);
        assert_eq!(config.tracking_confidence, 0.4);
        assert!(config.use_cpu);
        assert!(config.verbose);
    }

    #[test]
    fn missing_model_is_rejected() {
        let err = ServiceConfig::from_args(&args(&["--camera", "1"])).unwrap_err();
        assert!(err.to_string().contains("Missing model path"));
    }

    #[test]
    fn confidence_out_of_range_is_rejected() {
        let err = ServiceConfig::from_args(&args(&[
            "--model",
            "hand.pt",
            "--detection-confidence",
            "1.5",
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("between 0 and 1"));
    }

    #[test]
    fn unknown_flags_are_rejected() {
        let err = ServiceConfig::from_args(&args(&["--model", "hand.pt", "--frames"])).unwrap_err();
        assert!(err.to_string().contains("Unrecognised flag"));
    }

    #[test]
    fn negative_camera_index_is_rejected() {
        let err =
            ServiceConfig::from_args(&args(&["--model", "hand.pt", "--camera", "-1"])).unwrap_err();
        assert!(err.to_string().contains("non-negative"));
    }
}
