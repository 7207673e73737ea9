use super::test_helpers::*;
use super::*;
use crate::types::{CampaignStatus, ExecutionOptions, TargetSpec};


fn email_only() -> ExecutionOptions {
    ExecutionOptions {
        send_messaging: false,
        ..ExecutionOptions::default()
    }
}

/// Three vendors and an email-only campaign targeting all of them
async fn three_vendor_campaign(t: &TestEngine) -> (CampaignId, Vec<crate::types::Vendor>) {
    let mut vendors = Vec::new();
    for (name, code) in [("Anand Weaves", "V1"), ("Bharat Fabrics", "V2"), ("Chetan Mills", "V3")] {
        vendors.push(seed_vendor(&t.db, name, code).await);
    }
    let template = seed_template(&t.db, Channel::Email).await;
    let campaign = seed_campaign(&t.db, TargetSpec::default(), Some(template), None).await;
    (campaign, vendors)
}

async fn campaign_status(t: &TestEngine, id: CampaignId) -> CampaignStatus {
    t.db.get_campaign(id).await.unwrap().unwrap().status
}
