//! Check system capabilities.

use smoothwheel_platform_linux::permissions;

pub fn run(keywords: &[String]) -> anyhow::Result<()> {
    println!("smoothwheel System Check");
    println!("{}", "=".repeat(50));

    let capabilities = permissions::check_capabilities(keywords);
    println!();
    permissions::print_capability_report(&capabilities);

    println!();
    if permissions::all_required_available(&capabilities) {
        println!("All required capabilities are available. smoothwheel is ready.");
    } else {
        println!("Some required capabilities are missing. See above for fixes.");
    }

    Ok(())
}
