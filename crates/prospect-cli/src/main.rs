mod config;
mod config_cmd;
mod logging;
mod tui;
mod worker;

use clap::{Parser, Subcommand};
use config::{Config, ConfigError, ConfigPaths};
use prospect_core::repository::create_repository;
use prospect_core::transcript;
use prospect_core::types::{
    ActivityEntry, Campaign, CampaignEdit, CampaignId, EntryId, Message, NewCampaign, Speaker,
};
use prospect_core::{
    CampaignController, CampaignRepository, ControllerError, LogState, RepositoryError,
};
use std::io;
use std::time::{Duration, Instant};
use thiserror::Error;

#[derive(Parser)]
#[command(
    name = "prospect",
    version,
    about = "campaign lifecycle monitor for the prospecting API"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    #[command(flatten)]
    connection: ConnectionArgs,
}

#[derive(Subcommand)]
enum Command {
    /// List campaigns with their status
    List,
    /// Print the progress log of a campaign
    Log { id: i64 },
    /// List the contacts of a campaign with their stage
    Activity { id: i64 },
    /// Start a pending or stopped campaign
    Start { id: i64 },
    /// Stop a running campaign
    Stop {
        id: i64,
        /// Confirm the stop
        #[arg(long)]
        yes: bool,
    },
    /// Delete a campaign that is not running
    Delete {
        id: i64,
        /// Confirm the deletion
        #[arg(long)]
        yes: bool,
    },
    /// Print the conversation with one contact of a campaign
    Conversation { campaign: i64, entry: i64 },
    /// Create a campaign over a set of contacts
    Create(CreateArgs),
    /// Change a campaign that is not running
    Edit(EditArgs),
    Config(config_cmd::ConfigArgs),
}

#[derive(clap::Args, Debug, Clone)]
struct CreateArgs {
    /// Campaign name
    #[arg(long)]
    name: String,

    /// Message template (persona/prompt) id
    #[arg(long, value_name = "id")]
    config_id: i64,

    /// Contact to prospect; repeat for each contact
    #[arg(long = "contact", value_name = "id", required = true)]
    contacts: Vec<i64>,

    /// Minutes before a follow-up message (0 disables follow-ups)
    #[arg(long, value_name = "minutes", default_value_t = 0)]
    followup_minutes: u32,

    /// Seconds between first messages to consecutive contacts
    #[arg(long, value_name = "secs", default_value_t = 90)]
    initial_interval_secs: u32,
}

impl From<CreateArgs> for NewCampaign {
    fn from(args: CreateArgs) -> Self {
        Self {
            name: args.name,
            config_id: args.config_id,
            contact_ids: args.contacts,
            followup_interval_minutes: args.followup_minutes,
            initial_message_interval_seconds: args.initial_interval_secs,
        }
    }
}

#[derive(clap::Args, Debug, Clone)]
struct EditArgs {
    id: i64,

    #[arg(long)]
    name: Option<String>,

    #[arg(long, value_name = "id")]
    config_id: Option<i64>,

    #[arg(long, value_name = "minutes")]
    followup_minutes: Option<u32>,

    #[arg(long, value_name = "secs")]
    initial_interval_secs: Option<u32>,

    /// Add a contact to the campaign; repeat for each contact
    #[arg(long = "add-contact", value_name = "id")]
    add_contacts: Vec<i64>,
}

impl EditArgs {
    fn into_edit(self) -> (CampaignId, CampaignEdit) {
        let edit = CampaignEdit {
            name: self.name,
            config_id: self.config_id,
            followup_interval_minutes: self.followup_minutes,
            initial_message_interval_seconds: self.initial_interval_secs,
            contact_ids_to_add: self.add_contacts,
        };
        (CampaignId(self.id), edit)
    }
}

#[derive(Parser, Debug, Clone, Default)]
struct ConnectionArgs {
    /// API base url (overrides config and PROSPECT_API_URL)
    #[arg(long, global = true, value_name = "url")]
    api_url: Option<String>,

    /// API bearer token (overrides config and PROSPECT_API_TOKEN)
    #[arg(long, global = true, value_name = "token")]
    token: Option<String>,

    /// Live log refresh interval in milliseconds
    #[arg(long, global = true, value_name = "ms")]
    poll_interval_ms: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Connection {
    base_url: String,
    token: Option<String>,
    poll_interval: Duration,
}

impl ConnectionArgs {
    /// Flags win over the environment, the environment over the config file.
    fn resolve<F>(self, config: &Config, env: F) -> Result<Connection, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut effective = config.clone();
        if let Some(value) = env("PROSPECT_API_URL") {
            effective.api.base_url = value;
        }
        if let Some(value) = env("PROSPECT_API_TOKEN") {
            effective.api.token = value;
        }
        if let Some(value) = self.api_url.as_deref().and_then(non_empty_str) {
            effective.api.base_url = value.to_string();
        }
        if let Some(value) = self.token.as_deref().and_then(non_empty_str) {
            effective.api.token = value.to_string();
        }
        if let Some(value) = self.poll_interval_ms {
            effective.poll.interval_ms = value;
        }
        effective.validate()?;

        Ok(Connection {
            base_url: effective.api.base_url.trim().trim_end_matches('/').to_string(),
            token: non_empty_str(&effective.api.token).map(str::to_string),
            poll_interval: Duration::from_millis(effective.poll.interval_ms),
        })
    }
}

#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Controller(#[from] ControllerError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("{0}")]
    NotFound(String),
    #[error("terminal ui failed: {0}")]
    Tui(String),
}

fn env_override(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn non_empty_str(value: &str) -> Option<&str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed)
    }
}

fn main() {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let paths = match ConfigPaths::from_home() {
        Ok(paths) => paths,
        Err(err) => {
            eprintln!("config paths error: {err}");
            std::process::exit(1);
        }
    };

    let config = match Config::load_or_create(&paths) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("config load failed: {err}");
            std::process::exit(1);
        }
    };

    if let Err(err) = logging::init(&paths.logs_dir) {
        eprintln!("log file unavailable: {err}");
    }

    if let Some(Command::Config(args)) = &cli.command {
        if let Err(e) = config_cmd::run(args, &paths) {
            eprintln!("config failed: {e}");
            std::process::exit(1);
        }
        return;
    }

    let connection = match cli.connection.resolve(&config, env_override) {
        Ok(connection) => connection,
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(1);
        }
    };
    tracing::info!(base_url = %connection.base_url, "using prospecting API");

    let result = match cli.command {
        Some(command) => run_command(command, &connection),
        None => run_tui(&connection, &config),
    };
    if let Err(err) = result {
        tracing::error!(error = %err, "command failed");
        eprintln!("error: {err}");
        if let CliError::Controller(ControllerError::ConfirmationRequired { .. }) = err {
            eprintln!("pass --yes to confirm");
        }
        std::process::exit(1);
    }
}

fn connect(connection: &Connection) -> Result<Box<dyn CampaignRepository>, CliError> {
    Ok(create_repository(
        "http",
        &connection.base_url,
        connection.token.as_deref(),
    )?)
}

fn run_tui(connection: &Connection, config: &Config) -> Result<(), CliError> {
    let repo = connect(connection)?;
    let worker = worker::spawn(repo, connection.poll_interval)?;
    tui::run(tui::TuiContext {
        worker,
        ui_config: config.ui.clone(),
        poll_interval: connection.poll_interval,
    })
    .map_err(|err| CliError::Tui(err.to_string()))
}

fn run_command(command: Command, connection: &Connection) -> Result<(), CliError> {
    let mut repo = connect(connection)?;
    if let Command::List = command {
        let campaigns = repo.list_campaigns()?;
        print!("{}", campaign_table(&campaigns));
        return Ok(());
    }

    let mut controller = CampaignController::with_interval(repo, connection.poll_interval);
    let now = Instant::now();
    controller.load_list(now)?;
    let outcome = run_with_controller(&mut controller, command, now);
    controller.teardown();
    outcome
}

fn run_with_controller<R: CampaignRepository>(
    controller: &mut CampaignController<R>,
    command: Command,
    now: Instant,
) -> Result<(), CliError> {
    match command {
        Command::Log { id } => {
            let id = CampaignId(id);
            controller.select_campaign(id, now)?;
            if let Some(status) = controller.store().status(id) {
                println!("campaign {id} [{status}]");
            }
            match controller.log() {
                LogState::Loaded(text) if !text.trim().is_empty() => println!("{text}"),
                LogState::Unavailable => println!("log unavailable"),
                _ => println!("no log output yet"),
            }
        }
        Command::Activity { id } => {
            controller.select_campaign(CampaignId(id), now)?;
            print!("{}", activity_table(controller.activity()));
        }
        Command::Start { id } => {
            let id = CampaignId(id);
            controller.start(id, now)?;
            println!("campaign {id} started");
        }
        Command::Stop { id, yes } => {
            let id = CampaignId(id);
            controller.stop(id, yes)?;
            println!("campaign {id} stopped");
        }
        Command::Delete { id, yes } => {
            let id = CampaignId(id);
            controller.delete(id, yes, now)?;
            println!("campaign {id} deleted");
        }
        Command::Conversation { campaign, entry } => {
            let campaign = CampaignId(campaign);
            let entry = EntryId(entry);
            controller.select_campaign(campaign, now)?;
            let row = controller
                .activity()
                .iter()
                .find(|row| row.id == entry)
                .ok_or_else(|| {
                    CliError::NotFound(format!("contact {entry} not found in campaign {campaign}"))
                })?;
            print!("{}", conversation_text(&transcript::parse(&row.transcript)));
        }
        Command::Create(args) => {
            let id = controller.create_campaign(args.into(), now)?;
            println!("campaign {id} created");
        }
        Command::Edit(args) => {
            let (id, edit) = args.into_edit();
            controller.edit_campaign(id, edit)?;
            println!("campaign {id} updated");
        }
        Command::List | Command::Config(_) => {}
    }
    Ok(())
}

fn campaign_table(campaigns: &[Campaign]) -> String {
    if campaigns.is_empty() {
        return "no campaigns\n".to_string();
    }
    let mut out = String::new();
    for campaign in campaigns {
        out.push_str(&format!(
            "{:>6}  {:<10}  {}\n",
            campaign.id.0,
            campaign.status.label(),
            campaign.name
        ));
    }
    out
}

fn activity_table(entries: &[ActivityEntry]) -> String {
    if entries.is_empty() {
        return "no contacts\n".to_string();
    }
    let mut out = String::new();
    for entry in entries {
        out.push_str(&format!(
            "{:>6}  {:<20}  {:<24}  {}\n",
            entry.id.0,
            entry.stage.label(),
            entry.contact_name,
            entry.contact_phone
        ));
    }
    out
}

fn conversation_text(messages: &[Message]) -> String {
    if messages.is_empty() {
        return "no conversation history\n".to_string();
    }
    let mut out = String::new();
    for message in messages {
        let label = match message.speaker {
            Speaker::Operator => "Operator",
            Speaker::Contact => "Contact",
        };
        out.push_str(&format!("{label}: {}\n", message.text));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use prospect_core::types::{CampaignStatus, ContactUpdate, LogSnapshot};
    use std::collections::HashMap;

    /// Campaigns kept in memory; records the ids of every log fetch.
    struct MemoryRepo {
        campaigns: Vec<Campaign>,
        log_fetches: Vec<i64>,
    }

    impl MemoryRepo {
        fn with(statuses: &[(i64, CampaignStatus)]) -> Self {
            let campaigns = statuses
                .iter()
                .map(|(id, status)| Campaign {
                    id: CampaignId(*id),
                    name: format!("campaign {id}"),
                    status: *status,
                    config_id: Some(1),
                    followup_interval_minutes: 0,
                    initial_message_interval_seconds: 90,
                    created_at: None,
                })
                .collect();
            Self {
                campaigns,
                log_fetches: Vec::new(),
            }
        }

        fn find_mut(&mut self, id: CampaignId) -> Result<&mut Campaign, RepositoryError> {
            self.campaigns
                .iter_mut()
                .find(|campaign| campaign.id == id)
                .ok_or_else(|| RepositoryError::NotFound(format!("campaign {id}")))
        }
    }

    impl CampaignRepository for MemoryRepo {
        fn name(&self) -> &'static str {
            "memory"
        }

        fn list_campaigns(&mut self) -> Result<Vec<Campaign>, RepositoryError> {
            Ok(self.campaigns.clone())
        }

        fn fetch_log(&mut self, id: CampaignId) -> Result<LogSnapshot, RepositoryError> {
            self.log_fetches.push(id.0);
            let status = self.find_mut(id)?.status;
            Ok(LogSnapshot {
                text: String::new(),
                status,
            })
        }

        fn fetch_activity(
            &mut self,
            id: CampaignId,
        ) -> Result<Vec<ActivityEntry>, RepositoryError> {
            self.find_mut(id)?;
            Ok(Vec::new())
        }

        fn start(&mut self, id: CampaignId) -> Result<(), RepositoryError> {
            self.find_mut(id)?.status = CampaignStatus::Running;
            Ok(())
        }

        fn stop(&mut self, id: CampaignId) -> Result<(), RepositoryError> {
            self.find_mut(id)?.status = CampaignStatus::Stopped;
            Ok(())
        }

        fn delete_campaign(&mut self, id: CampaignId) -> Result<(), RepositoryError> {
            self.find_mut(id)?;
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

        fn create_campaign(&mut self, new: &NewCampaign) -> Result<Campaign, RepositoryError> {
            let id = self.campaigns.iter().map(|c| c.id.0).max().unwrap_or(0) + 1;
            let created = Campaign {
                id: CampaignId(id),
                name: new.name.clone(),
                status: CampaignStatus::Pending,
                config_id: Some(new.config_id),
                followup_interval_minutes: new.followup_interval_minutes,
                initial_message_interval_seconds: new.initial_message_interval_seconds,
                created_at: None,
            };
            self.campaigns.insert(0, created.clone());
            Ok(created)
        }

        fn update_campaign(
            &mut self,
            id: CampaignId,
            edit: &CampaignEdit,
        ) -> Result<Campaign, RepositoryError> {
            let stored = self.find_mut(id)?;
            if let Some(name) = &edit.name {
                stored.name = name.clone();
            }
            if let Some(minutes) = edit.followup_interval_minutes {
                stored.followup_interval_minutes = minutes;
            }
            Ok(stored.clone())
        }

        fn remove_contact(&mut self, _entry: EntryId) -> Result<(), RepositoryError> {
            Ok(())
        }
    }

    fn one_shot(
        repo: MemoryRepo,
        args: &[&str],
    ) -> (CampaignController<MemoryRepo>, Result<(), CliError>) {
        let cli = Cli::try_parse_from(args).unwrap();
        let now = Instant::now();
        let mut controller = CampaignController::new(repo);
        controller.load_list(now).unwrap();
        let command = cli.command.unwrap();
        let result = run_with_controller(&mut controller, command, now);
        (controller, result)
    }

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn resolve_uses_config_without_overrides() {
        let config = Config::default();
        let connection = ConnectionArgs::default()
            .resolve(&config, env_from(&[]))
            .unwrap();
        assert_eq!(connection.base_url, "http://localhost:8000");
        assert_eq!(connection.token, None);
        assert_eq!(connection.poll_interval, Duration::from_millis(5000));
    }

    #[test]
    fn resolve_prefers_flags_over_env_over_config() {
        let mut config = Config::default();
        config.api.token = "from-config".into();
        let env = env_from(&[
            ("PROSPECT_API_URL", "https://env.example.com/"),
            ("PROSPECT_API_TOKEN", "from-env"),
        ]);

        let connection = ConnectionArgs::default().resolve(&config, &env).unwrap();
        assert_eq!(connection.base_url, "https://env.example.com");
        assert_eq!(connection.token.as_deref(), Some("from-env"));

        let args = ConnectionArgs {
            api_url: Some("https://flag.example.com".into()),
            token: Some("from-flag".into()),
            poll_interval_ms: Some(2000),
        };
        let connection = args.resolve(&config, &env).unwrap();
        assert_eq!(connection.base_url, "https://flag.example.com");
        assert_eq!(connection.token.as_deref(), Some("from-flag"));
        assert_eq!(connection.poll_interval, Duration::from_millis(2000));
    }

    #[test]
    fn resolve_rejects_too_fast_polling() {
        let args = ConnectionArgs {
            poll_interval_ms: Some(10),
            ..ConnectionArgs::default()
        };
        assert!(args.resolve(&Config::default(), env_from(&[])).is_err());
    }

    #[test]
    fn cli_parses_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "prospect",
            "stop",
            "4",
            "--yes",
            "--api-url",
            "https://crm.example.com",
        ])
        .unwrap();
        assert!(matches!(cli.command, Some(Command::Stop { id: 4, yes: true })));
        assert_eq!(
            cli.connection.api_url.as_deref(),
            Some("https://crm.example.com")
        );
    }

    #[test]
    fn create_collects_repeated_contacts_and_defaults() {
        let cli = Cli::try_parse_from([
            "prospect", "create", "--name", "Clínicas", "--config-id", "3", "--contact", "4",
            "--contact", "9",
        ])
        .unwrap();
        let Some(Command::Create(args)) = cli.command else {
            panic!("expected create");
        };
        let new = NewCampaign::from(args);
        assert_eq!(new.contact_ids, vec![4, 9]);
        assert_eq!(new.followup_interval_minutes, 0);
        assert_eq!(new.initial_message_interval_seconds, 90);

        assert!(
            Cli::try_parse_from(["prospect", "create", "--name", "x", "--config-id", "1"])
                .is_err()
        );
    }

    #[test]
    fn edit_flags_become_a_partial_edit() {
        let cli = Cli::try_parse_from([
            "prospect", "edit", "7", "--followup-minutes", "60", "--add-contact", "5",
        ])
        .unwrap();
        let Some(Command::Edit(args)) = cli.command else {
            panic!("expected edit");
        };
        let (id, edit) = args.into_edit();
        assert_eq!(id, CampaignId(7));
        assert_eq!(edit.name, None);
        assert_eq!(edit.followup_interval_minutes, Some(60));
        assert_eq!(edit.contact_ids_to_add, vec![5]);
    }

    #[test]
    fn one_shot_create_prepends_and_selects() {
        let repo = MemoryRepo::with(&[(1, CampaignStatus::Stopped)]);
        let (controller, result) = one_shot(
            repo,
            &["prospect", "create", "--name", "Lojas", "--config-id", "2", "--contact", "8"],
        );
        result.unwrap();
        assert_eq!(controller.store().first_id(), Some(CampaignId(2)));
        assert_eq!(controller.selected(), Some(CampaignId(2)));
        assert_eq!(
            controller.store().get(CampaignId(2)).map(|c| c.name.as_str()),
            Some("Lojas")
        );
    }

    #[test]
    fn one_shot_edit_goes_through_controller_rules() {
        let repo = MemoryRepo::with(&[(1, CampaignStatus::Running), (2, CampaignStatus::Pending)]);
        let (_, result) = one_shot(repo, &["prospect", "edit", "1", "--name", "renamed"]);
        assert!(matches!(
            result,
            Err(CliError::Controller(ControllerError::Refused(_)))
        ));

        let repo = MemoryRepo::with(&[(1, CampaignStatus::Running), (2, CampaignStatus::Pending)]);
        let (controller, result) = one_shot(repo, &["prospect", "edit", "2", "--name", "renamed"]);
        result.unwrap();
        assert_eq!(
            controller.store().get(CampaignId(2)).map(|c| c.name.as_str()),
            Some("renamed")
        );
    }

    #[test]
    fn one_shot_stop_touches_only_its_campaign() {
        let repo = MemoryRepo::with(&[(1, CampaignStatus::Running), (7, CampaignStatus::Running)]);
        let (controller, result) = one_shot(repo, &["prospect", "stop", "7", "--yes"]);
        result.unwrap();
        assert_eq!(
            controller.store().status(CampaignId(7)),
            Some(CampaignStatus::Stopped)
        );
        assert!(controller.repository().log_fetches.is_empty());
        assert_eq!(controller.selected(), None);
    }

    #[test]
    fn campaign_table_lists_status_and_name() {
        let campaigns = vec![Campaign {
            id: CampaignId(12),
            name: "Spring outreach".into(),
            status: CampaignStatus::Running,
            config_id: None,
            followup_interval_minutes: 0,
            initial_message_interval_seconds: 0,
            created_at: None,
        }];
        assert_eq!(
            campaign_table(&campaigns),
            "    12  Running     Spring outreach\n"
        );
        assert_eq!(campaign_table(&[]), "no campaigns\n");
    }

    #[test]
    fn conversation_text_labels_speakers() {
        let messages = transcript::parse_str("- Eu: Olá\n- Contato: Oi");
        assert_eq!(
            conversation_text(&messages),
            "Operator: Olá\nContact: Oi\n"
        );
        assert_eq!(conversation_text(&[]), "no conversation history\n");
    }
}
