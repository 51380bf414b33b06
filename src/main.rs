//! asi-cam-control binary: print a status report for every connected camera.

use asi_cam_control::{connected_cameras, AsiDriver, Camera};

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(err) = run() {
        eprintln!("Error: {err}");
        std::process::exit(1);
    }
}

fn run() -> asi_cam_control::Result<()> {
    let count = connected_cameras(&mut AsiDriver::new());
    if count == 0 {
        println!("No ASI camera connected");
        return Ok(());
    }

    for index in 0..count {
        let mut camera = Camera::open(AsiDriver::new(), index)?;
        println!("{}", camera.status_report()?);
        camera.close();
    }
    Ok(())
}
