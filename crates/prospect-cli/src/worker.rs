use prospect_core::{
    CampaignController, CampaignId, CampaignRepository, ContactUpdate, ControllerError,
    ControllerView, EntryId,
};
use std::io;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Upper bound on how long the worker sleeps when no tick is scheduled.
const IDLE_WAIT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
pub enum ControllerCommand {
    Reload,
    Select(CampaignId),
    Start(CampaignId),
    Stop { id: CampaignId, confirmed: bool },
    Delete { id: CampaignId, confirmed: bool },
    RefreshActivity,
    UpdateContact { entry: EntryId, update: ContactUpdate },
    RemoveContact { entry: EntryId, confirmed: bool },
    SetVisible(bool),
    Shutdown,
}

pub enum WorkerEvent {
    View(Box<ControllerView>),
}

pub struct WorkerHandle {
    pub commands: Sender<ControllerCommand>,
    pub events: Receiver<WorkerEvent>,
    thread: Option<JoinHandle<()>>,
}

impl WorkerHandle {
    pub fn shutdown(mut self) {
        let _ = self.commands.send(ControllerCommand::Shutdown);
        if let Some(handle) = self.thread.take() {
            let _ = handle.join();
        }
    }
}

/// Run the controller on its own thread. The UI talks to it only through
/// commands in and view snapshots out.
pub fn spawn<R>(repo: R, interval: Duration) -> io::Result<WorkerHandle>
where
    R: CampaignRepository + 'static,
{
    let (cmd_tx, cmd_rx) = mpsc::channel();
    let (event_tx, event_rx) = mpsc::channel();
    let thread = thread::Builder::new()
        .name("prospect-controller".into())
        .spawn(move || {
            let controller = CampaignController::with_interval(repo, interval);
            run(controller, cmd_rx, event_tx);
        })?;
    Ok(WorkerHandle {
        commands: cmd_tx,
        events: event_rx,
        thread: Some(thread),
    })
}

fn run<R: CampaignRepository>(
    mut controller: CampaignController<R>,
    commands: Receiver<ControllerCommand>,
    events: Sender<WorkerEvent>,
) {
    tracing::info!(repository = controller.repository().name(), "controller started");
    let _ = controller.load(Instant::now());
    if publish(&controller, &events).is_err() {
        return;
    }

    loop {
        let timeout = controller
            .next_deadline()
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
            .unwrap_or(IDLE_WAIT);
        match commands.recv_timeout(timeout) {
            Ok(ControllerCommand::Shutdown) => break,
            Ok(command) => {
                let _ = apply(&mut controller, command, Instant::now());
            }
            Err(RecvTimeoutError::Timeout) => {
                if !controller.on_timer(Instant::now()) {
                    continue;
                }
            }
            Err(RecvTimeoutError::Disconnected) => break,
        }
        if publish(&controller, &events).is_err() {
            break;
        }
    }

    controller.teardown();
    tracing::info!("controller stopped");
}

fn publish<R: CampaignRepository>(
    controller: &CampaignController<R>,
    events: &Sender<WorkerEvent>,
) -> Result<(), mpsc::SendError<WorkerEvent>> {
    events.send(WorkerEvent::View(Box::new(controller.view())))
}

/// Dispatch one command. Failures are already recorded in the controller's
/// error state; the result is for one-shot callers.
pub fn apply<R: CampaignRepository>(
    controller: &mut CampaignController<R>,
    command: ControllerCommand,
    now: Instant,
) -> Result<(), ControllerError> {
    match command {
        ControllerCommand::Reload => controller.load(now),
        ControllerCommand::Select(id) => controller.select_campaign(id, now),
        ControllerCommand::Start(id) => controller.start(id, now),
        ControllerCommand::Stop { id, confirmed } => controller.stop(id, confirmed),
        ControllerCommand::Delete { id, confirmed } => controller.delete(id, confirmed, now),
        ControllerCommand::RefreshActivity => controller.refresh_activity(),
        ControllerCommand::UpdateContact { entry, update } => {
            controller.update_contact(entry, update)
        }
        ControllerCommand::RemoveContact { entry, confirmed } => {
            controller.remove_contact(entry, confirmed)
        }
        ControllerCommand::SetVisible(visible) => {
            controller.set_visible(visible);
            Ok(())
        }
        ControllerCommand::Shutdown => {
            controller.teardown();
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prospect_core::{
        ActivityEntry, Campaign, CampaignEdit, CampaignStatus, LogSnapshot, NewCampaign,
        RepositoryError,
    };

    struct FixedRepo {
        campaigns: Vec<Campaign>,
    }

    impl FixedRepo {
        fn new(statuses: &[CampaignStatus]) -> Self {
            let campaigns = statuses
                .iter()
                .enumerate()
                .map(|(idx, status)| Campaign {
                    id: CampaignId(idx as i64 + 1),
                    name: format!("campaign {}", idx + 1),
                    status: *status,
                    config_id: None,
                    followup_interval_minutes: 0,
                    initial_message_interval_seconds: 0,
                    created_at: None,
                })
                .collect();
            Self { campaigns }
        }

        fn find(&self, id: CampaignId) -> Result<&Campaign, RepositoryError> {
            self.campaigns
                .iter()
                .find(|campaign| campaign.id == id)
                .ok_or_else(|| RepositoryError::NotFound(format!("campaign {id}")))
        }
    }

    impl CampaignRepository for FixedRepo {
        fn name(&self) -> &'static str {
            "fixed"
        }

        fn list_campaigns(&mut self) -> Result<Vec<Campaign>, RepositoryError> {
            Ok(self.campaigns.clone())
        }

        fn fetch_log(&mut self, id: CampaignId) -> Result<LogSnapshot, RepositoryError> {
            let campaign = self.find(id)?;
            Ok(LogSnapshot {
                text: format!("log {id}"),
                status: campaign.status,
            })
        }

        fn fetch_activity(
            &mut self,
            id: CampaignId,
        ) -> Result<Vec<ActivityEntry>, RepositoryError> {
            self.find(id)?;
            Ok(Vec::new())
        }

        fn start(&mut self, id: CampaignId) -> Result<(), RepositoryError> {
            self.find(id).map(|_| ())
        }

        fn stop(&mut self, id: CampaignId) -> Result<(), RepositoryError> {
            self.find(id).map(|_| ())
        }

        fn delete_campaign(&mut self, id: CampaignId) -> Result<(), RepositoryError> {
            self.find(id)?;
            self.campaigns.retain(|campaign| campaign.id != id);
            Ok(())
        }

        fn update_contact(
            &mut self,
            _entry: EntryId,
            _update: &ContactUpdate,
        ) -> Result<(), RepositoryError> {
            Ok(())
        }

        fn create_campaign(&mut self, _new: &NewCampaign) -> Result<Campaign, RepositoryError> {
            Err(RepositoryError::Rejected {
                status: 400,
                detail: "not supported".into(),
            })
        }

        fn update_campaign(
            &mut self,
            id: CampaignId,
            _edit: &CampaignEdit,
        ) -> Result<Campaign, RepositoryError> {
            self.find(id).cloned()
        }

        fn remove_contact(&mut self, _entry: EntryId) -> Result<(), RepositoryError> {
            Ok(())
        }
    }

    fn next_view(handle: &WorkerHandle) -> ControllerView {
        match handle.events.recv_timeout(Duration::from_secs(5)) {
            Ok(WorkerEvent::View(view)) => *view,
            Err(err) => panic!("no view from worker: {err}"),
        }
    }

    #[test]
    fn worker_publishes_initial_view_and_follows_commands() {
        let repo = FixedRepo::new(&[CampaignStatus::Pending, CampaignStatus::Running]);
        let handle = spawn(repo, Duration::from_secs(30)).unwrap();

        let view = next_view(&handle);
        assert_eq!(view.campaigns.len(), 2);
        assert_eq!(view.selected, Some(CampaignId(1)));
        assert!(!view.polling);

        handle
            .commands
            .send(ControllerCommand::Select(CampaignId(2)))
            .unwrap();
        let view = next_view(&handle);
        assert_eq!(view.selected, Some(CampaignId(2)));
        assert!(view.polling);

        handle
            .commands
            .send(ControllerCommand::Stop {
                id: CampaignId(2),
                confirmed: true,
            })
            .unwrap();
        let view = next_view(&handle);
        assert_eq!(view.selected_status, Some(CampaignStatus::Stopped));
        assert!(!view.polling);

        handle.shutdown();
    }

    #[test]
    fn worker_ticks_while_selection_runs() {
        let repo = FixedRepo::new(&[CampaignStatus::Running]);
        let handle = spawn(repo, Duration::from_millis(20)).unwrap();
        let initial = next_view(&handle);
        assert!(initial.polling);

        let ticked = next_view(&handle);
        assert_eq!(ticked.log, prospect_core::LogState::Loaded("log 1".into()));
        assert!(ticked.polling);
        handle.shutdown();
    }

    #[test]
    fn apply_reports_refusals() {
        let repo = FixedRepo::new(&[CampaignStatus::Running]);
        let mut controller = CampaignController::new(repo);
        let now = Instant::now();
        apply(&mut controller, ControllerCommand::Reload, now).unwrap();
        let result = apply(
            &mut controller,
            ControllerCommand::Delete {
                id: CampaignId(1),
                confirmed: true,
            },
            now,
        );
        assert!(matches!(result, Err(ControllerError::Refused(_))));
    }
}
