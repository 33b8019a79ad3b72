//! Plan command

use std::error::Error;

use meshflash_core::device::DeviceProfile;
use meshflash_core::partition::{plan, PartitionScheme, PartitionTable, PlanImages};

pub fn run(
    scheme: PartitionScheme,
    version: &str,
    has_mui: bool,
    app_size: Option<u32>,
) -> Result<(), Box<dyn Error>> {
    let device = DeviceProfile {
        has_mui,
        ..DeviceProfile::default()
    };
    let table = PartitionTable::select(scheme, &device, version);

    println!("Scheme:          {}", scheme);
    println!("Firmware:        {}", version);
    println!("Companion UI:    {}", if has_mui { "yes" } else { "no" });
    println!("Table:           {:?} ({})", table, table.variant_label());
    println!();

    let images = PlanImages {
        app: vec![0; app_size.unwrap_or(0) as usize],
        ..PlanImages::default()
    };
    let plan = plan(scheme, &device, version, images);
    for image in plan.images() {
        println!("  {:12} 0x{:06X}", image.name, image.address);
    }

    if app_size.is_some() {
        plan.validate()?;
        println!();
        println!("Application fits below the OTA partition");
    }
    Ok(())
}
