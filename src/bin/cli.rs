use anyhow::{anyhow, bail, Context, Result};
use camera_controller::{
    default_backend, discover_devices, init_logging, CameraController, ControllerConfig,
    FlashMode, MainQueue,
};
use std::env;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

const USAGE: &str = "Usage: camera-controller-cli <command> [args]

Commands:
  list-devices [--json] [--config <path>]
  capture <out.jpg> [--flash on|off] [--switch] [--config <path>]
  info";

fn main() -> Result<()> {
    init_logging();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        eprintln!("{}", USAGE);
        std::process::exit(1);
    }

    let command = &args[1];
    match command.as_str() {
        "list-devices" => cmd_list_devices(&args),
        "capture" => cmd_capture(&args),
        "info" => cmd_info(),
        _ => {
            eprintln!("Unknown command: {}\n\n{}", command, USAGE);
            std::process::exit(1);
        }
    }
}

fn load_config(args: &[String]) -> Result<ControllerConfig> {
    let path = match args.iter().position(|a| a == "--config") {
        Some(i) => PathBuf::from(
            args.get(i + 1)
                .ok_or_else(|| anyhow!("--config needs a path"))?,
        ),
        None => ControllerConfig::default_path(),
    };
    Ok(ControllerConfig::load_layered(&path)?)
}

fn cmd_list_devices(args: &[String]) -> Result<()> {
    let config = load_config(args)?;
    let backend = default_backend(&config);
    let devices = backend.list_devices()?;

    if args.contains(&"--json".to_string()) {
        println!("{}", serde_json::to_string(&devices)?);
        return Ok(());
    }

    for d in &devices {
        let facing = d.position.map(|p| p.as_str()).unwrap_or("unknown");
        println!("{}: {} ({})", d.id, d.name, facing);
    }
    let discovery = discover_devices(backend.as_ref())?;
    if let Some(rear) = &discovery.rear {
        println!("rear camera: {}", rear.name);
    }
    if let Some(front) = &discovery.front {
        println!("front camera: {}", front.name);
    }
    for warning in &discovery.warnings {
        eprintln!("warning: {}", warning);
    }
    Ok(())
}

fn cmd_capture(args: &[String]) -> Result<()> {
    let mut output = None;
    let mut flash = None;
    let mut switch = false;

    let mut i = 2;
    while i < args.len() {
        match args[i].as_str() {
            "--flash" => {
                i += 1;
                let value = args.get(i).ok_or_else(|| anyhow!("--flash needs on|off"))?;
                flash = Some(value.parse::<FlashMode>().map_err(|e| anyhow!(e))?);
            }
            "--switch" => switch = true,
            "--config" => i += 1,
            other => {
                if output.is_none() {
                    output = Some(PathBuf::from(other));
                }
            }
        }
        i += 1;
    }
    let output = output.ok_or_else(|| anyhow!("output path required"))?;

    let config = load_config(args)?;
    let wait = config
        .capture
        .timeout()
        .unwrap_or(Duration::from_secs(60))
        + Duration::from_secs(5);
    let backend = default_backend(&config);
    let queue = MainQueue::new();
    let controller = CameraController::with_config(backend, Arc::new(queue.clone()), config)?;

    let prepared = Arc::new(Mutex::new(None));
    let slot = prepared.clone();
    controller.prepare(move |result| {
        if let Ok(mut slot) = slot.lock() {
            *slot = Some(result);
        }
    });
    if !queue.run_until(|| prepared.lock().map(|p| p.is_some()).unwrap_or(true), wait) {
        bail!("timed out preparing the camera session");
    }
    if let Some(Err(e)) = prepared.lock().map_err(|_| anyhow!("lock poisoned"))?.take() {
        return Err(e).context("failed to prepare the camera session");
    }
    for warning in controller.discovery_warnings() {
        log::warn!("{}", warning);
    }

    if switch {
        controller.switch_cameras()?;
    }
    if let Some(mode) = flash {
        controller.set_flash_mode(mode);
    }

    let captured = Arc::new(Mutex::new(None));
    let slot = captured.clone();
    controller.capture_image(move |result| {
        if let Ok(mut slot) = slot.lock() {
            *slot = Some(result);
        }
    })?;
    if !queue.run_until(|| captured.lock().map(|c| c.is_some()).unwrap_or(true), wait) {
        bail!("timed out waiting for the photo");
    }
    let photo = captured
        .lock()
        .map_err(|_| anyhow!("lock poisoned"))?
        .take()
        .ok_or_else(|| anyhow!("no photo delivered"))??;

    std::fs::write(&output, &photo.encoded)
        .with_context(|| format!("failed to write {}", output.display()))?;
    println!(
        "Saved {}x{} photo from the {} camera to {}",
        photo.width(),
        photo.height(),
        photo.position,
        output.display()
    );

    controller.close(Duration::from_secs(2))?;
    Ok(())
}

fn cmd_info() -> Result<()> {
    println!("{}", serde_json::to_string_pretty(&camera_controller::get_info())?);
    Ok(())
}
