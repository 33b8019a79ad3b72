//! Releases command

use std::error::Error;

use meshflash_core::config::FlasherConfig;
use meshflash_core::release::FirmwareArtifact;
use meshflash_fetch::{fetch_release_list, ReqwestClient};

fn print_channel(title: &str, releases: &[FirmwareArtifact]) {
    if releases.is_empty() {
        return;
    }
    println!("{}:", title);
    for release in releases {
        if release.title.is_empty() || release.title == release.id {
            println!("  {}", release.id);
        } else {
            println!("  {:24} {}", release.id, release.title);
        }
    }
}

pub async fn run(config: &FlasherConfig, unlock_prerelease: bool) -> Result<(), Box<dyn Error>> {
    let http = ReqwestClient::new()?;
    let previews = if unlock_prerelease {
        config.preview_releases.clone()
    } else {
        Vec::new()
    };
    let list = fetch_release_list(&http, &config.release_list_url, previews).await;

    if list.could_not_fetch {
        println!("Could not fetch the firmware list, showing the fallback release");
        println!();
    }
    print_channel("Stable", &list.stable);
    print_channel("Alpha", &list.alpha);
    print_channel("Preview", &list.previews);
    print_channel("Pull requests", &list.pull_requests);
    Ok(())
}
