use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use ureq::Agent;

use super::CampaignRepository;
use crate::error::RepositoryError;
use crate::http::{classify_status, default_agent, extract_detail, transport_error};
use crate::types::{
    ActivityEntry, Campaign, CampaignEdit, CampaignId, CampaignStatus, ContactStage,
    ContactUpdate, EntryId, LogSnapshot, NewCampaign, RawTranscript,
};

const API_PREFIX: &str = "/prospecting";

/// Campaign repository backed by the prospecting REST API.
pub struct HttpRepository {
    agent: Agent,
    base_url: String,
    token: Option<String>,
}

impl HttpRepository {
    pub fn new(base_url: &str, token: Option<&str>) -> Result<Self, RepositoryError> {
        let base_url = base_url.trim().trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(RepositoryError::InvalidResponse("API base url not set".into()));
        }
        let token = token
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string);
        Ok(Self {
            agent: default_agent(),
            base_url,
            token,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{API_PREFIX}{path}", self.base_url)
    }

    fn auth_header(&self) -> Option<String> {
        self.token.as_ref().map(|token| format!("Bearer {token}"))
    }

    fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, RepositoryError> {
        let url = self.url(path);
        tracing::debug!(%url, "GET");
        let mut request = self.agent.get(&url);
        if let Some(auth) = self.auth_header() {
            request = request.header("Authorization", &auth);
        }
        let response = request.call().map_err(|err| transport_error(&err))?;
        decode(read_success(response)?)
    }

    fn post_empty(&self, path: &str) -> Result<String, RepositoryError> {
        let url = self.url(path);
        tracing::debug!(%url, "POST");
        let mut request = self.agent.post(&url);
        if let Some(auth) = self.auth_header() {
            request = request.header("Authorization", &auth);
        }
        let response = request.send_empty().map_err(|err| transport_error(&err))?;
        read_success(response)
    }

    fn post_json<B: Serialize>(&self, path: &str, body: &B) -> Result<String, RepositoryError> {
        let url = self.url(path);
        tracing::debug!(%url, "POST");
        let mut request = self.agent.post(&url);
        if let Some(auth) = self.auth_header() {
            request = request.header("Authorization", &auth);
        }
        let response = request
            .send_json(body)
            .map_err(|err| transport_error(&err))?;
        read_success(response)
    }

    fn put_json<B: Serialize>(&self, path: &str, body: &B) -> Result<String, RepositoryError> {
        let url = self.url(path);
        tracing::debug!(%url, "PUT");
        let mut request = self.agent.put(&url);
        if let Some(auth) = self.auth_header() {
            request = request.header("Authorization", &auth);
        }
        let response = request
            .send_json(body)
            .map_err(|err| transport_error(&err))?;
        read_success(response)
    }

    fn delete(&self, path: &str) -> Result<String, RepositoryError> {
        let url = self.url(path);
        tracing::debug!(%url, "DELETE");
        let mut request = self.agent.delete(&url);
        if let Some(auth) = self.auth_header() {
            request = request.header("Authorization", &auth);
        }
        let response = request.call().map_err(|err| transport_error(&err))?;
        read_success(response)
    }
}

impl CampaignRepository for HttpRepository {
    fn name(&self) -> &'static str {
        "http"
    }

    fn list_campaigns(&mut self) -> Result<Vec<Campaign>, RepositoryError> {
        let wire: Vec<WireCampaign> = self.get("/")?;
        Ok(wire.into_iter().map(Campaign::from).collect())
    }

    fn fetch_log(&mut self, id: CampaignId) -> Result<LogSnapshot, RepositoryError> {
        let wire: WireLog = self.get(&format!("/{id}/log"))?;
        Ok(wire.into())
    }

    fn fetch_activity(&mut self, id: CampaignId) -> Result<Vec<ActivityEntry>, RepositoryError> {
        let sheet: WireSheet = self.get(&format!("/sheet/{id}"))?;
        Ok(sheet.data.into_iter().map(ActivityEntry::from).collect())
    }

    fn start(&mut self, id: CampaignId) -> Result<(), RepositoryError> {
        self.post_empty(&format!("/{id}/start"))?;
        Ok(())
    }

    fn stop(&mut self, id: CampaignId) -> Result<(), RepositoryError> {
        self.post_empty(&format!("/{id}/stop"))?;
        Ok(())
    }

    fn delete_campaign(&mut self, id: CampaignId) -> Result<(), RepositoryError> {
        self.delete(&format!("/{id}"))?;
        Ok(())
    }

    fn update_contact(
        &mut self,
        entry: EntryId,
        update: &ContactUpdate,
    ) -> Result<(), RepositoryError> {
        let body = WireContactUpdate {
            situacao: &update.stage,
            observacoes: update.notes.as_deref(),
        };
        self.put_json(&format!("/contacts/{entry}"), &body)?;
        Ok(())
    }

    fn create_campaign(&mut self, campaign: &NewCampaign) -> Result<Campaign, RepositoryError> {
        let body = WireNewCampaign {
            nome_prospeccao: &campaign.name,
            config_id: campaign.config_id,
            contact_ids: &campaign.contact_ids,
            followup_interval_minutes: campaign.followup_interval_minutes,
            initial_message_interval_seconds: campaign.initial_message_interval_seconds,
        };
        let raw = self.post_json("/", &body)?;
        decode::<WireCampaign>(raw).map(Campaign::from)
    }

    fn update_campaign(
        &mut self,
        id: CampaignId,
        edit: &CampaignEdit,
    ) -> Result<Campaign, RepositoryError> {
        let body = WireCampaignEdit {
            nome_prospeccao: edit.name.as_deref(),
            config_id: edit.config_id,
            followup_interval_minutes: edit.followup_interval_minutes,
            initial_message_interval_seconds: edit.initial_message_interval_seconds,
            contact_ids_to_add: &edit.contact_ids_to_add,
        };
        let raw = self.put_json(&format!("/{id}"), &body)?;
        decode::<WireCampaign>(raw).map(Campaign::from)
    }

    fn remove_contact(&mut self, entry: EntryId) -> Result<(), RepositoryError> {
        self.delete(&format!("/contacts/{entry}"))?;
        Ok(())
    }
}

fn read_success(response: ureq::http::Response<ureq::Body>) -> Result<String, RepositoryError> {
    let status = response.status().as_u16();
    let body = response
        .into_body()
        .read_to_string()
        .map_err(|err| transport_error(&err))?;
    if (200..300).contains(&status) {
        Ok(body)
    } else {
        tracing::debug!(status, "request refused by remote");
        Err(classify_status(status, extract_detail(&body)))
    }
}

fn decode<T: DeserializeOwned>(raw: String) -> Result<T, RepositoryError> {
    serde_json::from_str(raw.trim()).map_err(|err| RepositoryError::InvalidResponse(err.to_string()))
}

#[derive(Deserialize)]
struct WireCampaign {
    id: i64,
    #[serde(alias = "name")]
    nome_prospeccao: String,
    status: CampaignStatus,
    #[serde(default)]
    config_id: Option<i64>,
    #[serde(default)]
    followup_interval_minutes: Option<u32>,
    #[serde(default)]
    initial_message_interval_seconds: Option<u32>,
    #[serde(default)]
    created_at: Option<String>,
}

impl From<WireCampaign> for Campaign {
    fn from(wire: WireCampaign) -> Self {
        Self {
            id: CampaignId(wire.id),
            name: wire.nome_prospeccao,
            status: wire.status,
            config_id: wire.config_id,
            followup_interval_minutes: wire.followup_interval_minutes.unwrap_or_default(),
            initial_message_interval_seconds: wire
                .initial_message_interval_seconds
                .unwrap_or_default(),
            created_at: wire.created_at,
        }
    }
}

#[derive(Deserialize)]
struct WireLog {
    #[serde(default)]
    log: Option<String>,
    status: CampaignStatus,
}

impl From<WireLog> for LogSnapshot {
    fn from(wire: WireLog) -> Self {
        Self {
            text: wire.log.unwrap_or_default(),
            status: wire.status,
        }
    }
}

/// Contact sheet of one campaign. Only `data` is read; `headers` and
/// `prospect_name` duplicate what the campaign list already carries.
#[derive(Deserialize)]
struct WireSheet {
    #[serde(default)]
    data: Vec<WireSheetRow>,
}

/// One sheet row. `id` is the campaign-contact id, the same id the
/// `/contacts/{id}` update and remove routes take.
#[derive(Deserialize)]
struct WireSheetRow {
    id: i64,
    #[serde(default)]
    contact_id: Option<i64>,
    #[serde(default)]
    nome: Option<String>,
    #[serde(default)]
    whatsapp: Option<String>,
    situacao: ContactStage,
    #[serde(default)]
    observacoes: Option<String>,
    #[serde(default)]
    updated_at: Option<String>,
    #[serde(default)]
    conversa: Option<String>,
}

impl From<WireSheetRow> for ActivityEntry {
    fn from(wire: WireSheetRow) -> Self {
        let transcript = wire
            .conversa
            .as_deref()
            .map(RawTranscript::resolve)
            .unwrap_or_default();
        Self {
            id: EntryId(wire.id),
            contact_id: wire.contact_id,
            contact_name: wire.nome.unwrap_or_default(),
            contact_phone: wire.whatsapp.unwrap_or_default(),
            stage: wire.situacao,
            notes: wire.observacoes,
            transcript,
            updated_at: wire.updated_at,
        }
    }
}

#[derive(Serialize)]
struct WireContactUpdate<'a> {
    situacao: &'a ContactStage,
    observacoes: Option<&'a str>,
}

#[derive(Serialize)]
struct WireNewCampaign<'a> {
    nome_prospeccao: &'a str,
    config_id: i64,
    contact_ids: &'a [i64],
    followup_interval_minutes: u32,
    initial_message_interval_seconds: u32,
}

#[derive(Serialize)]
struct WireCampaignEdit<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    nome_prospeccao: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    config_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    followup_interval_minutes: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    initial_message_interval_seconds: Option<u32>,
    #[serde(skip_serializing_if = "<[i64]>::is_empty")]
    contact_ids_to_add: &'a [i64],
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_rejects_blank_base_url_and_trims_slash() {
        assert!(HttpRepository::new("  ", None).is_err());
        let repo = HttpRepository::new("http://localhost:8000/", Some("  ")).unwrap();
        assert_eq!(repo.url("/7/log"), "http://localhost:8000/prospecting/7/log");
        assert!(repo.auth_header().is_none());

        let repo = HttpRepository::new("http://api", Some("tok")).unwrap();
        assert_eq!(repo.auth_header().as_deref(), Some("Bearer tok"));
    }

    #[test]
    fn campaign_list_decodes_backend_shape() {
        let body = r#"[
            {"id": 1, "nome_prospeccao": "Clínicas SP", "status": "Pendente",
             "config_id": 3, "followup_interval_minutes": 1440,
             "initial_message_interval_seconds": 90, "created_at": "2025-01-10T12:00:00"},
            {"id": 2, "name": "Lojas", "status": "Em Andamento"}
        ]"#;
        let wire: Vec<WireCampaign> = decode(body.to_string()).unwrap();
        let campaigns: Vec<Campaign> = wire.into_iter().map(Campaign::from).collect();
        assert_eq!(campaigns[0].id, CampaignId(1));
        assert_eq!(campaigns[0].status, CampaignStatus::Pending);
        assert_eq!(campaigns[0].followup_interval_minutes, 1440);
        assert_eq!(campaigns[1].name, "Lojas");
        assert_eq!(campaigns[1].status, CampaignStatus::Running);
        assert_eq!(campaigns[1].config_id, None);
    }

    #[test]
    fn unknown_status_is_an_invalid_response() {
        let body = r#"{"log": "x", "status": "Arquivado"}"#;
        let err = decode::<WireLog>(body.to_string()).err().unwrap();
        assert!(matches!(err, RepositoryError::InvalidResponse(_)));
    }

    #[test]
    fn null_log_becomes_empty_text() {
        let wire: WireLog = decode(r#"{"log": null, "status": "Parado"}"#.to_string()).unwrap();
        let snapshot = LogSnapshot::from(wire);
        assert_eq!(snapshot.text, "");
        assert_eq!(snapshot.status, CampaignStatus::Stopped);
    }

    #[test]
    fn sheet_rows_become_activity_entries() {
        let body = r#"{
            "headers": ["id", "nome", "whatsapp", "situacao", "observacoes", "conversa"],
            "data": [
                {"id": 11, "nome": "Ana", "whatsapp": "5511999990000",
                 "situacao": "Resposta Recebida", "observacoes": null,
                 "conversa": "[{\"role\": \"assistant\", \"content\": \"Olá\"}]"},
                {"id": 12, "nome": null, "whatsapp": null,
                 "situacao": "Aguardando Início", "observacoes": "ligar depois",
                 "conversa": null}
            ],
            "prospect_name": "Clínicas SP"
        }"#;
        let sheet: WireSheet = decode(body.to_string()).unwrap();
        let entries: Vec<ActivityEntry> =
            sheet.data.into_iter().map(ActivityEntry::from).collect();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].id, EntryId(11));
        assert_eq!(entries[0].contact_name, "Ana");
        assert_eq!(entries[0].contact_phone, "5511999990000");
        assert_eq!(entries[0].contact_id, None);
        assert_eq!(entries[0].stage, ContactStage::ReplyReceived);
        assert!(matches!(
            entries[0].transcript,
            RawTranscript::StructuredTurns(ref turns) if turns.len() == 1
        ));
        assert_eq!(entries[1].contact_name, "");
        assert_eq!(entries[1].notes.as_deref(), Some("ligar depois"));
        assert!(entries[1].transcript.is_empty());
    }

    #[test]
    fn sheet_row_without_stage_is_invalid() {
        let sheet: WireSheet =
            decode(r#"{"headers": [], "data": [], "prospect_name": "x"}"#.to_string()).unwrap();
        assert!(sheet.data.is_empty());
        let err = decode::<WireSheet>(r#"{"data": [{"id": 3, "nome": "Ana"}]}"#.to_string())
            .err()
            .unwrap();
        assert!(matches!(err, RepositoryError::InvalidResponse(_)));
    }

    #[test]
    fn edit_body_only_carries_changed_fields() {
        let edit = CampaignEdit {
            name: Some("Novo".into()),
            ..CampaignEdit::default()
        };
        let body = WireCampaignEdit {
            nome_prospeccao: edit.name.as_deref(),
            config_id: edit.config_id,
            followup_interval_minutes: edit.followup_interval_minutes,
            initial_message_interval_seconds: edit.initial_message_interval_seconds,
            contact_ids_to_add: &edit.contact_ids_to_add,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json, serde_json::json!({"nome_prospeccao": "Novo"}));
    }

    #[test]
    fn contact_update_serializes_wire_stage() {
        let stage = ContactStage::MeetingScheduled;
        let body = WireContactUpdate {
            situacao: &stage,
            observacoes: Some("call tuesday"),
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"situacao": "Reunião Agendada", "observacoes": "call tuesday"})
        );
    }
}
