pub mod http;

use crate::error::RepositoryError;
use crate::types::{
    ActivityEntry, Campaign, CampaignEdit, CampaignId, ContactUpdate, EntryId, LogSnapshot,
    NewCampaign,
};

/// Request/response boundary to the remote campaign service.
///
/// Implementations are stateless and never retry; retry policy belongs to
/// the caller. `start` and `stop` succeed when the remote accepted the
/// transition, not when it finished.
pub trait CampaignRepository: Send {
    fn name(&self) -> &'static str;

    fn list_campaigns(&mut self) -> Result<Vec<Campaign>, RepositoryError>;
    fn fetch_log(&mut self, id: CampaignId) -> Result<LogSnapshot, RepositoryError>;
    fn fetch_activity(&mut self, id: CampaignId) -> Result<Vec<ActivityEntry>, RepositoryError>;
    fn start(&mut self, id: CampaignId) -> Result<(), RepositoryError>;
    fn stop(&mut self, id: CampaignId) -> Result<(), RepositoryError>;
    fn delete_campaign(&mut self, id: CampaignId) -> Result<(), RepositoryError>;
    fn update_contact(
        &mut self,
        entry: EntryId,
        update: &ContactUpdate,
    ) -> Result<(), RepositoryError>;

    fn create_campaign(&mut self, campaign: &NewCampaign) -> Result<Campaign, RepositoryError>;
    fn update_campaign(
        &mut self,
        id: CampaignId,
        edit: &CampaignEdit,
    ) -> Result<Campaign, RepositoryError>;
    fn remove_contact(&mut self, entry: EntryId) -> Result<(), RepositoryError>;
}

/// Create a repository by name.
///
/// - `"http"` talks to the prospecting API at `base_url`, sending `token`
///   as a bearer credential when present.
pub fn create_repository(
    kind: &str,
    base_url: &str,
    token: Option<&str>,
) -> Result<Box<dyn CampaignRepository>, RepositoryError> {
    match kind {
        "http" => Ok(Box::new(http::HttpRepository::new(base_url, token)?)),
        other => Err(RepositoryError::InvalidResponse(format!(
            "unknown repository kind: {other}"
        ))),
    }
}

impl<R: CampaignRepository + ?Sized> CampaignRepository for Box<R> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn list_campaigns(&mut self) -> Result<Vec<Campaign>, RepositoryError> {
        (**self).list_campaigns()
    }

    fn fetch_log(&mut self, id: CampaignId) -> Result<LogSnapshot, RepositoryError> {
        (**self).fetch_log(id)
    }

    fn fetch_activity(&mut self, id: CampaignId) -> Result<Vec<ActivityEntry>, RepositoryError> {
        (**self).fetch_activity(id)
    }

    fn start(&mut self, id: CampaignId) -> Result<(), RepositoryError> {
        (**self).start(id)
    }

    fn stop(&mut self, id: CampaignId) -> Result<(), RepositoryError> {
        (**self).stop(id)
    }

    fn delete_campaign(&mut self, id: CampaignId) -> Result<(), RepositoryError> {
        (**self).delete_campaign(id)
    }

    fn update_contact(
        &mut self,
        entry: EntryId,
        update: &ContactUpdate,
    ) -> Result<(), RepositoryError> {
        (**self).update_contact(entry, update)
    }

    fn create_campaign(&mut self, campaign: &NewCampaign) -> Result<Campaign, RepositoryError> {
        (**self).create_campaign(campaign)
    }

    fn update_campaign(
        &mut self,
        id: CampaignId,
        edit: &CampaignEdit,
    ) -> Result<Campaign, RepositoryError> {
        (**self).update_campaign(id, edit)
    }

    fn remove_contact(&mut self, entry: EntryId) -> Result<(), RepositoryError> {
        (**self).remove_contact(entry)
    }
}
