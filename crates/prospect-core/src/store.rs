use std::collections::HashMap;

use crate::types::{Campaign, CampaignId, CampaignStatus};

/// Ordered, keyed collection of the campaigns the client knows about.
///
/// Order follows the last list response, with newly created campaigns in
/// front. Every status change goes through [`CampaignStore::reconcile`].
#[derive(Debug, Default)]
pub struct CampaignStore {
    order: Vec<CampaignId>,
    campaigns: HashMap<CampaignId, Campaign>,
}

impl CampaignStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole collection, keeping the given order. A repeated id
    /// keeps its first position and its last value.
    pub fn replace_all(&mut self, campaigns: Vec<Campaign>) {
        self.order.clear();
        self.campaigns.clear();
        for campaign in campaigns {
            if !self.campaigns.contains_key(&campaign.id) {
                self.order.push(campaign.id);
            }
            self.campaigns.insert(campaign.id, campaign);
        }
    }

    pub fn insert_front(&mut self, campaign: Campaign) {
        if self.campaigns.contains_key(&campaign.id) {
            self.order.retain(|id| *id != campaign.id);
        }
        self.order.insert(0, campaign.id);
        self.campaigns.insert(campaign.id, campaign);
    }

    /// Replace a stored campaign's descriptive fields, keeping its position.
    /// The status goes through [`CampaignStore::reconcile`]. Returns false
    /// when the campaign is not stored.
    pub fn update_details(&mut self, campaign: Campaign) -> bool {
        let id = campaign.id;
        let status = campaign.status;
        let Some(stored) = self.campaigns.get_mut(&id) else {
            return false;
        };
        *stored = Campaign {
            status: stored.status,
            ..campaign
        };
        self.reconcile(id, status);
        true
    }

    pub fn remove(&mut self, id: CampaignId) -> Option<Campaign> {
        let removed = self.campaigns.remove(&id)?;
        self.order.retain(|entry| *entry != id);
        Some(removed)
    }

    /// Write the authoritative status for `id`. Returns the previous status,
    /// or `None` when the campaign is not stored.
    pub fn reconcile(&mut self, id: CampaignId, status: CampaignStatus) -> Option<CampaignStatus> {
        let campaign = self.campaigns.get_mut(&id)?;
        let previous = campaign.status;
        if previous != status {
            tracing::debug!(campaign = %id, from = %previous, to = %status, "status reconciled");
        }
        campaign.status = status;
        Some(previous)
    }

    pub fn get(&self, id: CampaignId) -> Option<&Campaign> {
        self.campaigns.get(&id)
    }

    pub fn status(&self, id: CampaignId) -> Option<CampaignStatus> {
        self.campaigns.get(&id).map(|campaign| campaign.status)
    }

    pub fn contains(&self, id: CampaignId) -> bool {
        self.campaigns.contains_key(&id)
    }

    pub fn first_id(&self) -> Option<CampaignId> {
        self.order.first().copied()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Campaigns in display order.
    pub fn snapshot(&self) -> Vec<Campaign> {
        self.order
            .iter()
            .filter_map(|id| self.campaigns.get(id).cloned())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn campaign(id: i64, status: CampaignStatus) -> Campaign {
        Campaign {
            id: CampaignId(id),
            name: format!("campaign {id}"),
            status,
            config_id: None,
            followup_interval_minutes: 0,
            initial_message_interval_seconds: 0,
            created_at: None,
        }
    }

    #[test]
    fn replace_all_keeps_response_order() {
        let mut store = CampaignStore::new();
        store.replace_all(vec![
            campaign(3, CampaignStatus::Pending),
            campaign(1, CampaignStatus::Running),
        ]);
        let ids: Vec<i64> = store.snapshot().iter().map(|c| c.id.0).collect();
        assert_eq!(ids, vec![3, 1]);
        assert_eq!(store.first_id(), Some(CampaignId(3)));
    }

    #[test]
    fn reconcile_changes_one_row_only() {
        let mut store = CampaignStore::new();
        store.replace_all(vec![
            campaign(1, CampaignStatus::Pending),
            campaign(2, CampaignStatus::Running),
        ]);
        let previous = store.reconcile(CampaignId(2), CampaignStatus::Completed);
        assert_eq!(previous, Some(CampaignStatus::Running));
        assert_eq!(store.status(CampaignId(2)), Some(CampaignStatus::Completed));
        assert_eq!(store.status(CampaignId(1)), Some(CampaignStatus::Pending));
        assert_eq!(store.reconcile(CampaignId(9), CampaignStatus::Running), None);
    }

    #[test]
    fn insert_front_and_remove() {
        let mut store = CampaignStore::new();
        store.replace_all(vec![campaign(1, CampaignStatus::Pending)]);
        store.insert_front(campaign(5, CampaignStatus::Pending));
        assert_eq!(store.first_id(), Some(CampaignId(5)));
        assert_eq!(store.len(), 2);

        assert!(store.remove(CampaignId(5)).is_some());
        assert!(store.remove(CampaignId(5)).is_none());
        assert_eq!(store.first_id(), Some(CampaignId(1)));
    }

    #[test]
    fn update_details_keeps_position() {
        let mut store = CampaignStore::new();
        store.replace_all(vec![
            campaign(1, CampaignStatus::Pending),
            campaign(2, CampaignStatus::Stopped),
        ]);
        let mut edited = campaign(2, CampaignStatus::Stopped);
        edited.name = "renamed".into();
        assert!(store.update_details(edited));
        assert_eq!(store.snapshot()[1].name, "renamed");
        assert!(!store.update_details(campaign(8, CampaignStatus::Pending)));
    }

    #[test]
    fn duplicate_ids_collapse() {
        let mut store = CampaignStore::new();
        store.replace_all(vec![
            campaign(1, CampaignStatus::Pending),
            campaign(1, CampaignStatus::Stopped),
        ]);
        assert_eq!(store.len(), 1);
        assert_eq!(store.status(CampaignId(1)), Some(CampaignStatus::Stopped));
    }
}
