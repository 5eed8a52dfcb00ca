//! List scroll-capable devices.

use smoothwheel_platform_linux::list_scroll_devices;

pub fn run(json: bool) -> anyhow::Result<()> {
    let devices = list_scroll_devices();

    if json {
        println!("{}", serde_json::to_string_pretty(&devices)?);
        return Ok(());
    }

    if devices.is_empty() {
        println!("No readable scroll devices found (try `smoothwheel check`).");
        return Ok(());
    }

    println!("Scroll devices:");
    for d in &devices {
        let mut features = Vec::new();
        if d.horizontal {
            features.push("horizontal");
        }
        if d.hi_res {
            features.push("hi-res");
        }
        println!("  {}  {}", d.path.display(), d.name);
        if !features.is_empty() {
            println!("      {}", features.join(", "));
        }
    }
    Ok(())
}
