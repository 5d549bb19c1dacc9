use std::time::{Duration, Instant};

use crate::error::{ControllerError, ErrorNotice, RepositoryError};
use crate::poll::{DEFAULT_POLL_INTERVAL, PollingScheduler};
use crate::repository::CampaignRepository;
use crate::store::CampaignStore;
use crate::types::{
    ActivityEntry, Campaign, CampaignEdit, CampaignId, CampaignStatus, ContactUpdate, EntryId,
    LogSnapshot, NewCampaign,
};

/// Identifies one polling session for one campaign. A result is applied only
/// while its ticket still matches the controller's current session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PollTicket {
    pub campaign_id: CampaignId,
    pub session: u64,
}

/// Progress log of the selected campaign.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum LogState {
    /// Nothing selected, or not fetched yet.
    #[default]
    Idle,
    Loaded(String),
    /// The remote no longer knows the campaign. Polling stays off.
    Unavailable,
}

impl LogState {
    pub fn text(&self) -> Option<&str> {
        match self {
            LogState::Loaded(text) => Some(text),
            LogState::Idle | LogState::Unavailable => None,
        }
    }
}

/// Immutable snapshot of everything a view needs to render.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ControllerView {
    pub campaigns: Vec<Campaign>,
    pub selected: Option<CampaignId>,
    pub selected_status: Option<CampaignStatus>,
    pub log: LogState,
    pub activity: Vec<ActivityEntry>,
    pub polling: bool,
    pub visible: bool,
    pub skipped_ticks: u64,
    pub error: Option<ErrorNotice>,
}

impl ControllerView {
    pub fn selected_campaign(&self) -> Option<&Campaign> {
        let id = self.selected?;
        self.campaigns.iter().find(|campaign| campaign.id == id)
    }
}

/// Owns selection, lifecycle commands and live polling for campaigns.
///
/// Single-threaded: the owner drives it from one loop, calling
/// [`CampaignController::on_timer`] when [`CampaignController::next_deadline`]
/// passes. Every repository failure is recorded in the error state and also
/// returned.
pub struct CampaignController<R> {
    repo: R,
    store: CampaignStore,
    selected: Option<CampaignId>,
    log: LogState,
    activity: Vec<ActivityEntry>,
    scheduler: PollingScheduler<PollTicket>,
    interval: Duration,
    session: u64,
    in_flight: Option<PollTicket>,
    error: Option<ErrorNotice>,
    error_from_poll: bool,
}

impl<R: CampaignRepository> CampaignController<R> {
    pub fn new(repo: R) -> Self {
        Self::with_interval(repo, DEFAULT_POLL_INTERVAL)
    }

    pub fn with_interval(repo: R, interval: Duration) -> Self {
        Self {
            repo,
            store: CampaignStore::new(),
            selected: None,
            log: LogState::Idle,
            activity: Vec::new(),
            scheduler: PollingScheduler::new(),
            interval,
            session: 0,
            in_flight: None,
            error: None,
            error_from_poll: false,
        }
    }

    pub fn repository(&self) -> &R {
        &self.repo
    }

    pub fn store(&self) -> &CampaignStore {
        &self.store
    }

    pub fn selected(&self) -> Option<CampaignId> {
        self.selected
    }

    pub fn log(&self) -> &LogState {
        &self.log
    }

    pub fn activity(&self) -> &[ActivityEntry] {
        &self.activity
    }

    pub fn error(&self) -> Option<&ErrorNotice> {
        self.error.as_ref()
    }

    pub fn clear_error(&mut self) {
        self.error = None;
        self.error_from_poll = false;
    }

    pub fn is_polling(&self) -> bool {
        self.scheduler.is_active()
    }

    pub fn session(&self) -> u64 {
        self.session
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.scheduler.next_deadline()
    }

    /// Fetch the campaign list and select the first campaign when nothing is
    /// selected yet. Only a failed list fetch is returned; a failed
    /// auto-select stays in the error state.
    pub fn load(&mut self, now: Instant) -> Result<(), ControllerError> {
        self.load_list(now)?;
        if self.selected.is_none()
            && let Some(first) = self.store.first_id()
        {
            let _ = self.select_campaign(first, now);
        }
        Ok(())
    }

    /// Fetch the campaign list without fetching any log or activity. A
    /// selection that vanished from the list is dropped.
    pub fn load_list(&mut self, now: Instant) -> Result<(), ControllerError> {
        let campaigns = match self.repo.list_campaigns() {
            Ok(campaigns) => campaigns,
            Err(err) => return self.fail(err.into()),
        };
        tracing::info!(count = campaigns.len(), "campaigns loaded");
        self.store.replace_all(campaigns);
        self.clear_error();

        if let Some(id) = self.selected
            && !self.store.contains(id)
        {
            self.clear_selection();
        }
        self.sync_polling(now);
        Ok(())
    }

    /// Make `id` the selected campaign and fetch its log and activity.
    /// Polling for the previous selection ends before anything is fetched.
    pub fn select_campaign(&mut self, id: CampaignId, now: Instant) -> Result<(), ControllerError> {
        if !self.store.contains(id) {
            return self.fail(ControllerError::UnknownCampaign(id));
        }
        self.end_session();
        self.selected = Some(id);
        self.log = LogState::Idle;
        self.activity.clear();
        self.clear_error();
        tracing::debug!(campaign = %id, "campaign selected");

        let mut outcome = Ok(());
        match self.repo.fetch_log(id) {
            Ok(snapshot) => self.apply_snapshot(id, snapshot),
            Err(err) => {
                if err.is_not_found() {
                    self.log = LogState::Unavailable;
                }
                outcome = self.fail(err.into());
            }
        }
        if self.log != LogState::Unavailable {
            match self.repo.fetch_activity(id) {
                Ok(activity) => self.activity = activity,
                Err(err) => {
                    let failed = self.fail(err.into());
                    if outcome.is_ok() {
                        outcome = failed;
                    }
                }
            }
        }
        self.sync_polling(now);
        outcome
    }

    pub fn start(&mut self, id: CampaignId, now: Instant) -> Result<(), ControllerError> {
        let status = self.known_status(id)?;
        if !status.can_start() {
            return self.fail(ControllerError::Refused(format!(
                "campaign {id} is {status} and cannot be started"
            )));
        }
        tracing::info!(campaign = %id, "starting campaign");
        if let Err(err) = self.repo.start(id) {
            return self.fail(err.into());
        }
        self.store.reconcile(id, CampaignStatus::Running);
        self.clear_error();
        if self.selected == Some(id) {
            if self.log == LogState::Unavailable {
                self.log = LogState::Idle;
            }
            self.begin_session(id, now);
        }
        Ok(())
    }

    /// Ask the remote to stop. On failure the status and polling are left
    /// exactly as they were.
    pub fn stop(&mut self, id: CampaignId, confirmed: bool) -> Result<(), ControllerError> {
        let status = self.known_status(id)?;
        if !confirmed {
            return self.fail(ControllerError::ConfirmationRequired { action: "stop" });
        }
        if !status.can_stop() {
            return self.fail(ControllerError::Refused(format!(
                "campaign {id} is {status}, not running"
            )));
        }
        tracing::info!(campaign = %id, "stopping campaign");
        if let Err(err) = self.repo.stop(id) {
            return self.fail(err.into());
        }
        self.store.reconcile(id, CampaignStatus::Stopped);
        self.clear_error();
        if self.selected == Some(id) {
            self.end_session();
        }
        Ok(())
    }

    /// Delete a campaign. Refused without a request while it is running.
    pub fn delete(
        &mut self,
        id: CampaignId,
        confirmed: bool,
        now: Instant,
    ) -> Result<(), ControllerError> {
        let status = self.known_status(id)?;
        if !status.allows_mutation() {
            return self.fail(ControllerError::Refused(
                "cannot delete a running campaign; stop it first".into(),
            ));
        }
        if !confirmed {
            return self.fail(ControllerError::ConfirmationRequired { action: "delete" });
        }
        tracing::info!(campaign = %id, "deleting campaign");
        if let Err(err) = self.repo.delete_campaign(id) {
            return self.fail(err.into());
        }
        self.store.remove(id);
        self.clear_error();
        if self.selected == Some(id) {
            self.clear_selection();
            if let Some(first) = self.store.first_id() {
                // The delete itself succeeded; a failed reselect is in the error state.
                let _ = self.select_campaign(first, now);
            }
        }
        Ok(())
    }

    /// Run one tick if one is due. Returns whether a result was applied.
    pub fn on_timer(&mut self, now: Instant) -> bool {
        let Some(ticket) = self.begin_tick(now) else {
            return false;
        };
        let result = self.repo.fetch_log(ticket.campaign_id);
        self.apply_tick(ticket, result)
    }

    /// Claim a due tick. Returns `None` when nothing is due, the surface is
    /// hidden, or a tick for this session is still outstanding.
    pub fn begin_tick(&mut self, now: Instant) -> Option<PollTicket> {
        let ticket = self.scheduler.poll(now)?;
        if self.in_flight.is_some() {
            tracing::debug!(campaign = %ticket.campaign_id, "tick skipped; previous fetch outstanding");
            return None;
        }
        if !self.is_current(ticket) {
            return None;
        }
        self.in_flight = Some(ticket);
        Some(ticket)
    }

    /// Fold a tick's fetch result into state. Results for a superseded
    /// session or selection are discarded.
    pub fn apply_tick(
        &mut self,
        ticket: PollTicket,
        result: Result<LogSnapshot, RepositoryError>,
    ) -> bool {
        if self.in_flight == Some(ticket) {
            self.in_flight = None;
        }
        if !self.is_current(ticket) {
            tracing::debug!(
                campaign = %ticket.campaign_id,
                session = ticket.session,
                current = self.session,
                "discarding stale poll result"
            );
            return false;
        }

        let id = ticket.campaign_id;
        match result {
            Ok(snapshot) => {
                if self.error_from_poll {
                    self.clear_error();
                }
                self.apply_snapshot(id, snapshot);
                if self.store.status(id).is_some_and(|status| !status.is_running()) {
                    tracing::info!(campaign = %id, "campaign left running; polling stopped");
                    self.end_session();
                }
            }
            Err(err) if err.is_not_found() => {
                self.log = LogState::Unavailable;
                self.end_session();
                let _ = self.fail::<()>(err.into());
                self.error_from_poll = true;
            }
            Err(err) => {
                let _ = self.fail::<()>(err.into());
                self.error_from_poll = true;
            }
        }
        true
    }

    pub fn refresh_activity(&mut self) -> Result<(), ControllerError> {
        let Some(id) = self.selected else {
            return self.fail(ControllerError::NoSelection);
        };
        match self.repo.fetch_activity(id) {
            Ok(activity) => {
                self.activity = activity;
                Ok(())
            }
            Err(err) => self.fail(err.into()),
        }
    }

    /// Change a contact's stage and notes, then patch the local row.
    pub fn update_contact(
        &mut self,
        entry: EntryId,
        update: ContactUpdate,
    ) -> Result<(), ControllerError> {
        if let Err(err) = self.repo.update_contact(entry, &update) {
            return self.fail(err.into());
        }
        tracing::info!(entry = %entry, stage = update.stage.as_wire(), "contact updated");
        if let Some(row) = self.activity.iter_mut().find(|row| row.id == entry) {
            row.stage = update.stage;
            row.notes = update.notes;
        }
        self.clear_error();
        Ok(())
    }

    pub fn remove_contact(&mut self, entry: EntryId, confirmed: bool) -> Result<(), ControllerError> {
        if !confirmed {
            return self.fail(ControllerError::ConfirmationRequired {
                action: "remove contact",
            });
        }
        if let Err(err) = self.repo.remove_contact(entry) {
            return self.fail(err.into());
        }
        tracing::info!(entry = %entry, "contact removed from campaign");
        self.activity.retain(|row| row.id != entry);
        self.clear_error();
        Ok(())
    }

    /// Create a campaign, put it at the top of the list and select it.
    pub fn create_campaign(
        &mut self,
        campaign: NewCampaign,
        now: Instant,
    ) -> Result<CampaignId, ControllerError> {
        if campaign.name.trim().is_empty() {
            return self.fail(ControllerError::Refused("campaign name is required".into()));
        }
        if campaign.contact_ids.is_empty() {
            return self.fail(ControllerError::Refused(
                "a campaign needs at least one contact".into(),
            ));
        }
        let created = match self.repo.create_campaign(&campaign) {
            Ok(created) => created,
            Err(err) => return self.fail(err.into()),
        };
        let id = created.id;
        tracing::info!(campaign = %id, "campaign created");
        self.store.insert_front(created);
        // The create itself succeeded; a failed select is in the error state.
        let _ = self.select_campaign(id, now);
        Ok(id)
    }

    pub fn edit_campaign(&mut self, id: CampaignId, edit: CampaignEdit) -> Result<(), ControllerError> {
        let status = self.known_status(id)?;
        if !status.allows_mutation() {
            return self.fail(ControllerError::Refused(
                "cannot edit a running campaign; stop it first".into(),
            ));
        }
        if edit.is_empty() {
            return self.fail(ControllerError::Refused("nothing to change".into()));
        }
        let updated = match self.repo.update_campaign(id, &edit) {
            Ok(updated) => updated,
            Err(err) => return self.fail(err.into()),
        };
        tracing::info!(campaign = %id, "campaign edited");
        self.store.update_details(updated);
        self.clear_error();
        Ok(())
    }

    /// Hidden surfaces keep their polling session but skip due ticks.
    pub fn set_visible(&mut self, visible: bool) {
        self.scheduler.set_visible(visible);
    }

    /// Stop polling and invalidate every outstanding ticket.
    pub fn teardown(&mut self) {
        self.end_session();
        tracing::debug!(session = self.session, "controller torn down");
    }

    pub fn view(&self) -> ControllerView {
        ControllerView {
            campaigns: self.store.snapshot(),
            selected: self.selected,
            selected_status: self.selected.and_then(|id| self.store.status(id)),
            log: self.log.clone(),
            activity: self.activity.clone(),
            polling: self.scheduler.is_active(),
            visible: self.scheduler.is_visible(),
            skipped_ticks: self.scheduler.skipped(),
            error: self.error.clone(),
        }
    }

    fn apply_snapshot(&mut self, id: CampaignId, snapshot: LogSnapshot) {
        self.store.reconcile(id, snapshot.status);
        self.log = LogState::Loaded(snapshot.text);
    }

    fn known_status(&mut self, id: CampaignId) -> Result<CampaignStatus, ControllerError> {
        match self.store.status(id) {
            Some(status) => Ok(status),
            None => self.fail(ControllerError::UnknownCampaign(id)),
        }
    }

    fn is_current(&self, ticket: PollTicket) -> bool {
        ticket.session == self.session && self.selected == Some(ticket.campaign_id)
    }

    /// Poll iff the selection is known to be running and still exists remotely.
    fn sync_polling(&mut self, now: Instant) {
        let running = self
            .selected
            .filter(|_| self.log != LogState::Unavailable)
            .filter(|id| self.store.status(*id).is_some_and(CampaignStatus::is_running));
        match running {
            Some(id) => {
                if !self.scheduler.is_active() {
                    self.begin_session(id, now);
                }
            }
            None => {
                if self.scheduler.is_active() {
                    self.end_session();
                }
            }
        }
    }

    fn begin_session(&mut self, id: CampaignId, now: Instant) {
        self.session += 1;
        self.in_flight = None;
        let ticket = PollTicket {
            campaign_id: id,
            session: self.session,
        };
        self.scheduler.start(ticket, self.interval, now);
        tracing::debug!(campaign = %id, session = self.session, "polling started");
    }

    fn end_session(&mut self) {
        self.session += 1;
        self.in_flight = None;
        if self.scheduler.is_active() {
            self.scheduler.stop();
            tracing::debug!(session = self.session, "polling stopped");
        }
    }

    fn clear_selection(&mut self) {
        self.end_session();
        self.selected = None;
        self.log = LogState::Idle;
        self.activity.clear();
    }

    fn fail<T>(&mut self, err: ControllerError) -> Result<T, ControllerError> {
        if let ControllerError::Repository(inner) = &err {
            tracing::warn!(error = %inner, "repository request failed");
        }
        self.error = Some(ErrorNotice::from(&err));
        self.error_from_poll = false;
        Err(err)
    }
}
