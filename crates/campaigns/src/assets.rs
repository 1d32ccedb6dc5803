//! Boundary to the asset pipeline. Downloading is someone else's job; the
//! engine only needs to know which assets a campaign requires and whether
//! all of them have arrived.

use dashmap::DashSet;
use parking_lot::RwLock;

use crate::model::{Campaign, CdnPaths};

/// Readiness check consulted after a campaign passes rule evaluation. A
/// campaign is only displayable once every asset it references is local.
pub trait AssetGate: Send + Sync {
    fn check_assets_for_campaign(&self, campaign: &Campaign) -> bool;
}

/// Asset names referenced by one campaign, deduplicated, declaration order.
/// Embedded campaigns reference no downloadable assets.
pub fn campaign_assets(campaign: &Campaign) -> Vec<String> {
    let mut assets = Vec::new();
    for message in &campaign.messages {
        for format in &message.formats {
            for image in &format.images {
                if !image.name.is_empty() && !assets.contains(&image.name) {
                    assets.push(image.name.clone());
                }
            }
            for button in &format.buttons {
                if !button.image_up.is_empty() && !assets.contains(&button.image_up) {
                    assets.push(button.image_up.clone());
                }
            }
        }
    }
    assets
}

/// Unique asset names across a whole campaign list, for batch download.
pub fn collect_assets(campaigns: &[Campaign]) -> Vec<String> {
    let mut assets = Vec::new();
    for campaign in campaigns {
        for asset in campaign_assets(campaign) {
            if !assets.contains(&asset) {
                assets.push(asset);
            }
        }
    }
    assets
}

/// Tracks which assets the external downloader has finished fetching.
/// Written from the download task, read from the engine thread.
#[derive(Default)]
pub struct AssetRegistry {
    downloaded: DashSet<String>,
    cdn: RwLock<CdnPaths>,
}

impl AssetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_cdn_paths(&self, cdn: CdnPaths) {
        *self.cdn.write() = cdn;
    }

    pub fn image_url(&self, asset: &str) -> String {
        format!("{}{asset}", self.cdn.read().message_images)
    }

    pub fn images_cdn(&self) -> String {
        self.cdn.read().message_images.clone()
    }

    pub fn mark_downloaded(&self, asset: &str) {
        self.downloaded.insert(asset.to_string());
    }

    pub fn is_downloaded(&self, asset: &str) -> bool {
        self.downloaded.contains(asset)
    }
}

impl AssetGate for AssetRegistry {
    fn check_assets_for_campaign(&self, campaign: &Campaign) -> bool {
        campaign_assets(campaign)
            .iter()
            .all(|asset| self.downloaded.contains(asset))
    }
}

/// Gate that treats every campaign as ready. Used in tests and by hosts
/// without image rendering.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysReady;

impl AssetGate for AlwaysReady {
    fn check_assets_for_campaign(&self, _campaign: &Campaign) -> bool {
        true
    }
}
