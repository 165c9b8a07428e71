use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use serde_json::json;
use std::collections::BTreeSet;
use std::time::Duration;
use crate::models::{
    normalize_skill_name, tidy_skill_name, Direction, NewDeclaration, NewSwapRequest, PublicProfile,
    Skill, SkillDeclaration, SkillId, SkillOffer, SwapRequest, SwapRequestStatus,
};
use crate::services::ledger::{
    rejected_by_database, verify_swap_request, LedgerError, SkillLedger, SkillRegistry,
};

/// Rows requested per page when listing offers
pub const DEFAULT_PAGE_SIZE: usize = 1000;

// Columns safe to read for any user; email stays with the owner.
const PUBLIC_PROFILE_FIELDS: &str = "id,name,bio,rating,completed_swaps";
const SKILL_FIELDS: &str = "id,name,category,description";

/// Error body returned by the REST API for rejected requests
#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    code: Option<String>,
}

/// Table names in the hosted database
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RestTables {
    pub profiles: String,
    pub skills: String,
    pub user_skills: String,
    pub swap_requests: String,
}

impl Default for RestTables {
    fn default() -> Self {
        Self {
            profiles: "profiles".to_string(),
            skills: "skills".to_string(),
            user_skills: "user_skills".to_string(),
            swap_requests: "skill_swap_requests".to_string(),
        }
    }
}

/// `user_skills` row as returned by the REST API
#[derive(Debug, Deserialize)]
struct UserSkillRow {
    #[serde(default)]
    user_id: Option<String>,
    skill_id: String,
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default)]
    level: Option<String>,
    #[serde(default)]
    created_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl UserSkillRow {
    fn into_declaration(self) -> Result<SkillDeclaration, LedgerError> {
        let user_id = self
            .user_id
            .ok_or_else(|| LedgerError::InvalidResponse("user_skills row without user_id".into()))?;
        let direction = self
            .kind
            .as_deref()
            .unwrap_or_default()
            .parse::<Direction>()
            .map_err(LedgerError::InvalidResponse)?;

        Ok(SkillDeclaration {
            user_id,
            skill_id: self.skill_id,
            direction,
            level: self.level,
            created_at: self.created_at,
        })
    }
}

/// `skill_swap_requests` row as returned by the REST API
#[derive(Debug, Deserialize)]
struct SwapRequestRow {
    id: String,
    requester_id: String,
    receiver_id: String,
    offered_skill_id: String,
    requested_skill_id: String,
    status: String,
    #[serde(default)]
    created_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl SwapRequestRow {
    fn into_request(self) -> Result<SwapRequest, LedgerError> {
        Ok(SwapRequest {
            status: self.status.parse().map_err(LedgerError::InvalidResponse)?,
            id: self.id,
            requester_id: self.requester_id,
            receiver_id: self.receiver_id,
            offered_skill_id: self.offered_skill_id,
            requested_skill_id: self.requested_skill_id,
            created_at: self.created_at,
        })
    }
}

/// Client for the hosted database's REST interface
///
/// Handles all HTTP communication with the backend including:
/// - Reading skill declarations, skills and public profiles
/// - Lazily creating skills and declaring them for users
/// - Inserting swap requests
pub struct RestLedger {
    base_url: String,
    api_key: String,
    client: Client,
    tables: RestTables,
    page_size: usize,
}

impl RestLedger {
    /// Create a new REST ledger client
    pub fn new(
        base_url: String,
        api_key: String,
        timeout_secs: u64,
        tables: RestTables,
    ) -> Result<Self, LedgerError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;

        Ok(Self {
            base_url,
            api_key,
            client,
            tables,
            page_size: DEFAULT_PAGE_SIZE,
        })
    }

    /// Set how many rows each page of a listing request asks for
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Build a table URL with encoded filter parameters
    fn table_url(&self, table: &str, params: &[(&str, String)]) -> String {
        let query = params
            .iter()
            .map(|(key, value)| format!("{}={}", key, urlencoding::encode(value)))
            .collect::<Vec<_>>()
            .join("&");

        let base = format!("{}/rest/v1/{}", self.base_url.trim_end_matches('/'), table);
        if query.is_empty() {
            base
        } else {
            format!("{}?{}", base, query)
        }
    }

    fn get(&self, url: &str) -> reqwest::RequestBuilder {
        self.client
            .get(url)
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
    }

    fn post(&self, url: &str) -> reqwest::RequestBuilder {
        self.client
            .post(url)
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
            .header("Prefer", "return=representation")
    }

    async fn fetch_rows<T>(&self, url: &str, context: &str) -> Result<Vec<T>, LedgerError>
    where
        T: for<'de> Deserialize<'de>,
    {
        tracing::debug!("Request to {}: {}", context, url);

        let response = check_status(self.get(url).send().await?, context).await?;
        response.json::<Vec<T>>().await.map_err(|e| {
            LedgerError::InvalidResponse(format!("Failed to parse response to {}: {}", context, e))
        })
    }

    /// Find a skill by name, ignoring case and runs of whitespace
    pub async fn find_skill_by_name(&self, name: &str) -> Result<Option<Skill>, LedgerError> {
        let key = normalize_skill_name(name);
        let url = self.table_url(
            &self.tables.skills,
            &[
                ("select", SKILL_FIELDS.to_string()),
                ("name", format!("imatch.{}", name_pattern(&key))),
            ],
        );

        let skills: Vec<Skill> = self.fetch_rows(&url, "fetch skill by name").await?;
        Ok(skills.into_iter().find(|s| s.canonical_name() == key))
    }

    async fn create_skill(&self, declaration: &NewDeclaration) -> Result<Skill, LedgerError> {
        let url = self.table_url(&self.tables.skills, &[("select", SKILL_FIELDS.to_string())]);
        let payload = json!({
            "name": tidy_skill_name(&declaration.name),
            "category": declaration.category.trim(),
            "description": declaration.description,
        });

        let response = check_status(self.post(&url).json(&payload).send().await?, "create skill").await?;
        let mut rows: Vec<Skill> = response
            .json()
            .await
            .map_err(|e| LedgerError::InvalidResponse(format!("Failed to parse created skill: {}", e)))?;

        rows.pop()
            .ok_or_else(|| LedgerError::InvalidResponse("Skill insert returned no rows".into()))
    }

    /// Resolve a skill by name, creating it on first mention
    async fn resolve_skill(&self, declaration: &NewDeclaration) -> Result<Skill, LedgerError> {
        if let Some(skill) = self.find_skill_by_name(&declaration.name).await? {
            return Ok(skill);
        }

        match self.create_skill(declaration).await {
            Ok(skill) => {
                tracing::info!("Created skill {} ({})", skill.id, skill.name);
                Ok(skill)
            }
            // Another user created it between our lookup and insert
            Err(LedgerError::Conflict(_)) => self
                .find_skill_by_name(&declaration.name)
                .await?
                .ok_or_else(|| LedgerError::NotFound(format!("Skill {}", declaration.name))),
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl SkillLedger for RestLedger {
    async fn skills_by_user_and_direction(
        &self,
        user_id: &str,
        direction: Direction,
    ) -> Result<BTreeSet<SkillId>, LedgerError> {
        let url = self.table_url(
            &self.tables.user_skills,
            &[
                ("select", "skill_id".to_string()),
                ("user_id", format!("eq.{}", user_id)),
                ("type", format!("eq.{}", direction)),
            ],
        );

        let rows: Vec<UserSkillRow> = self.fetch_rows(&url, "fetch user skills").await?;
        Ok(rows.into_iter().map(|r| r.skill_id).collect())
    }

    async fn offerers_of_skills(
        &self,
        skill_ids: &BTreeSet<SkillId>,
        excluding_user_id: &str,
    ) -> Result<Vec<SkillOffer>, LedgerError> {
        if skill_ids.is_empty() {
            return Ok(Vec::new());
        }

        let skills = in_list(skill_ids);
        let mut rows: Vec<UserSkillRow> = Vec::new();

        // The server may cap pages below our size, so only an empty page ends the listing
        loop {
            let url = self.table_url(
                &self.tables.user_skills,
                &[
                    ("select", "user_id,skill_id".to_string()),
                    ("type", format!("eq.{}", Direction::Offer)),
                    ("user_id", format!("neq.{}", excluding_user_id)),
                    ("skill_id", format!("in.{}", skills)),
                    ("order", "user_id.asc,skill_id.asc".to_string()),
                    ("limit", self.page_size.to_string()),
                    ("offset", rows.len().to_string()),
                ],
            );

            let page: Vec<UserSkillRow> = self.fetch_rows(&url, "fetch skill offerers").await?;
            if page.is_empty() {
                break;
            }
            rows.extend(page);
        }

        tracing::debug!("Fetched {} offers for {} skills", rows.len(), skill_ids.len());

        rows.into_iter()
            .map(|row| {
                let user_id = row.user_id.ok_or_else(|| {
                    LedgerError::InvalidResponse("offer row without user_id".into())
                })?;
                Ok(SkillOffer {
                    user_id,
                    skill_id: row.skill_id,
                })
            })
            .collect()
    }

    async fn skills_by_ids(&self, skill_ids: &BTreeSet<SkillId>) -> Result<Vec<Skill>, LedgerError> {
        if skill_ids.is_empty() {
            return Ok(Vec::new());
        }

        let url = self.table_url(
            &self.tables.skills,
            &[
                ("select", SKILL_FIELDS.to_string()),
                ("id", format!("in.{}", in_list(skill_ids))),
            ],
        );

        self.fetch_rows(&url, "fetch skills").await
    }

    async fn public_profile_summary(&self, user_id: &str) -> Result<Option<PublicProfile>, LedgerError> {
        let url = self.table_url(
            &self.tables.profiles,
            &[
                ("select", PUBLIC_PROFILE_FIELDS.to_string()),
                ("id", format!("eq.{}", user_id)),
            ],
        );

        let mut rows: Vec<PublicProfile> = self.fetch_rows(&url, "fetch public profile").await?;
        Ok(if rows.is_empty() { None } else { Some(rows.swap_remove(0)) })
    }
}

#[async_trait]
impl SkillRegistry for RestLedger {
    async fn declare_skill(&self, declaration: NewDeclaration) -> Result<SkillDeclaration, LedgerError> {
        let skill = self.resolve_skill(&declaration).await?;

        let url = self.table_url(&self.tables.user_skills, &[]);
        let payload = json!({
            "user_id": declaration.user_id,
            "skill_id": skill.id,
            "type": declaration.direction.as_str(),
            "level": declaration.level,
        });

        let response = check_status(self.post(&url).json(&payload).send().await?, "declare skill").await?;
        let mut rows: Vec<UserSkillRow> = response
            .json()
            .await
            .map_err(|e| LedgerError::InvalidResponse(format!("Failed to parse declaration: {}", e)))?;

        let row = rows
            .pop()
            .ok_or_else(|| LedgerError::InvalidResponse("Declaration insert returned no rows".into()))?;

        tracing::debug!(
            "Declared skill {} for {} ({})",
            skill.id,
            declaration.user_id,
            declaration.direction
        );

        row.into_declaration()
    }

    async fn remove_declaration(
        &self,
        user_id: &str,
        skill_id: &str,
        direction: Direction,
    ) -> Result<bool, LedgerError> {
        let url = self.table_url(
            &self.tables.user_skills,
            &[
                ("user_id", format!("eq.{}", user_id)),
                ("skill_id", format!("eq.{}", skill_id)),
                ("type", format!("eq.{}", direction)),
            ],
        );

        let response = self
            .client
            .delete(&url)
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
            .header("Prefer", "return=representation")
            .send()
            .await?;
        let response = check_status(response, "remove declaration").await?;

        let rows: Vec<serde_json::Value> = response
            .json()
            .await
            .map_err(|e| LedgerError::InvalidResponse(format!("Failed to parse delete result: {}", e)))?;

        Ok(!rows.is_empty())
    }

    async fn create_swap_request(&self, request: NewSwapRequest) -> Result<SwapRequest, LedgerError> {
        verify_swap_request(self, &request).await?;

        let url = self.table_url(&self.tables.swap_requests, &[]);
        let payload = json!({
            "requester_id": request.requester_id,
            "receiver_id": request.receiver_id,
            "offered_skill_id": request.offered_skill_id,
            "requested_skill_id": request.requested_skill_id,
            "status": SwapRequestStatus::Pending.as_str(),
        });

        let response = check_status(self.post(&url).json(&payload).send().await?, "create swap request").await?;
        let mut rows: Vec<SwapRequestRow> = response
            .json()
            .await
            .map_err(|e| LedgerError::InvalidResponse(format!("Failed to parse swap request: {}", e)))?;

        rows.pop()
            .ok_or_else(|| LedgerError::InvalidResponse("Swap request insert returned no rows".into()))?
            .into_request()
    }

    async fn health_check(&self) -> Result<bool, LedgerError> {
        let url = format!("{}/rest/v1/", self.base_url.trim_end_matches('/'));
        let response = self.get(&url).send().await?;
        Ok(response.status().is_success())
    }
}

/// Map a non-success response onto a ledger error
///
/// `context` is a verb phrase such as "fetch user skills".
async fn check_status(response: Response, context: &str) -> Result<Response, LedgerError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "Unable to read body".to_string());
    let message = format!("Failed to {}: {}", context, body);

    // Database rejections carry their SQLSTATE in `code`
    let code = serde_json::from_str::<ApiErrorBody>(&body)
        .ok()
        .and_then(|b| b.code);
    if let Some(err) = code.and_then(|c| rejected_by_database(&c, message.clone())) {
        tracing::warn!("{} ({})", message, status);
        return Err(err);
    }

    tracing::error!("{} ({})", message, status);
    Err(match status {
        StatusCode::NOT_FOUND => LedgerError::NotFound(message),
        StatusCode::CONFLICT => LedgerError::Conflict(message),
        _ => LedgerError::Api {
            status: status.as_u16(),
            message,
        },
    })
}

/// Render ids as a quoted `in.(...)` list
fn in_list(ids: &BTreeSet<SkillId>) -> String {
    let quoted = ids
        .iter()
        .map(|id| format!("\"{}\"", id.replace('\\', "\\\\").replace('"', "\\\"")))
        .collect::<Vec<_>>()
        .join(",");
    format!("({})", quoted)
}

/// Anchored pattern matching a normalized name with any run of whitespace
/// between its words
fn name_pattern(normalized: &str) -> String {
    let words = normalized
        .split_whitespace()
        .map(escape_regex)
        .collect::<Vec<_>>()
        .join(r"\s+");
    format!(r"^\s*{}\s*$", words)
}

/// Escape regex metacharacters so names match literally
fn escape_regex(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(
            c,
            '\\' | '.' | '^' | '$' | '|' | '?' | '*' | '+' | '(' | ')' | '[' | ']' | '{' | '}'
        ) {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    fn client(url: String) -> RestLedger {
        RestLedger::new(url, "test_key".to_string(), 5, RestTables::default()).unwrap()
    }

    fn set(items: &[&str]) -> BTreeSet<SkillId> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_in_list_quotes_values() {
        assert_eq!(in_list(&set(&["b", "a"])), r#"("a","b")"#);
        assert_eq!(in_list(&set(&[r#"x"y"#])), r#"("x\"y")"#);
    }

    #[test]
    fn test_name_pattern_tolerates_spacing() {
        assert_eq!(name_pattern("python programming"), r"^\s*python\s+programming\s*$");
        assert_eq!(name_pattern("c++ (basics)"), r"^\s*c\+\+\s+\(basics\)\s*$");
        assert_eq!(escape_regex("a.b|c"), r"a\.b\|c");
    }

    #[test]
    fn test_table_url_encodes_filters() {
        let ledger = client("https://db.test/".to_string());
        let url = ledger.table_url("skills", &[("id", "in.(\"a\")".to_string())]);
        assert_eq!(url, "https://db.test/rest/v1/skills?id=in.%28%22a%22%29");
    }

    fn offers_page(offset: &str) -> Matcher {
        Matcher::AllOf(vec![
            Matcher::UrlEncoded("type".into(), "eq.offer".into()),
            Matcher::UrlEncoded("user_id".into(), "neq.me".into()),
            Matcher::UrlEncoded("skill_id".into(), r#"in.("french","spanish")"#.into()),
            Matcher::UrlEncoded("order".into(), "user_id.asc,skill_id.asc".into()),
            Matcher::UrlEncoded("limit".into(), "2".into()),
            Matcher::UrlEncoded("offset".into(), offset.into()),
        ])
    }

    #[tokio::test]
    async fn test_offerers_query_reads_every_page() {
        let mut server = mockito::Server::new_async().await;
        let first = server
            .mock("GET", "/rest/v1/user_skills")
            .match_header("apikey", "test_key")
            .match_header("authorization", "Bearer test_key")
            .match_query(offers_page("0"))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"[{"user_id":"a","skill_id":"spanish"},{"user_id":"b","skill_id":"french"}]"#)
            .create_async()
            .await;
        let second = server
            .mock("GET", "/rest/v1/user_skills")
            .match_query(offers_page("2"))
            .with_status(200)
            .with_body(r#"[{"user_id":"c","skill_id":"french"}]"#)
            .create_async()
            .await;
        let last = server
            .mock("GET", "/rest/v1/user_skills")
            .match_query(offers_page("3"))
            .with_status(200)
            .with_body("[]")
            .create_async()
            .await;

        let ledger = client(server.url()).with_page_size(2);
        let offers = ledger
            .offerers_of_skills(&set(&["spanish", "french"]), "me")
            .await
            .unwrap();

        first.assert_async().await;
        second.assert_async().await;
        last.assert_async().await;
        let users: Vec<&str> = offers.iter().map(|o| o.user_id.as_str()).collect();
        assert_eq!(users, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_public_profile_missing() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/rest/v1/profiles")
            .match_query(Matcher::UrlEncoded("select".into(), PUBLIC_PROFILE_FIELDS.into()))
            .with_status(200)
            .with_body("[]")
            .create_async()
            .await;

        let ledger = client(server.url());
        assert!(ledger.public_profile_summary("ghost").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_server_error_maps_to_api_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/rest/v1/user_skills")
            .match_query(Matcher::Any)
            .with_status(503)
            .with_body("upstream down")
            .create_async()
            .await;

        let ledger = client(server.url());
        let err = ledger
            .skills_by_user_and_direction("me", Direction::Want)
            .await
            .unwrap_err();

        assert!(matches!(err, LedgerError::Api { status: 503, .. }));
        assert!(err.is_retryable());
        assert!(err.to_string().contains("Failed to fetch user skills: upstream down"));
    }

    #[tokio::test]
    async fn test_database_rejection_is_invalid_input() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/rest/v1/user_skills")
            .match_query(Matcher::Any)
            .with_status(400)
            .with_body(r#"{"code":"22P02","message":"invalid input syntax for type uuid: \"nope\""}"#)
            .create_async()
            .await;

        let ledger = client(server.url());
        let err = ledger
            .skills_by_user_and_direction("nope", Direction::Offer)
            .await
            .unwrap_err();

        assert!(matches!(err, LedgerError::InvalidInput(_)));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_missing_reference_on_insert_is_invalid_input() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/rest/v1/skill_swap_requests")
            .with_status(409)
            .with_body(r#"{"code":"23503","message":"violates foreign key constraint"}"#)
            .create_async()
            .await;

        let response = client(server.url())
            .client
            .post(format!("{}/rest/v1/skill_swap_requests", server.url()))
            .send()
            .await
            .unwrap();
        let err = check_status(response, "create swap request").await.unwrap_err();

        assert!(matches!(err, LedgerError::InvalidInput(_)));
        assert!(err.to_string().contains("Failed to create swap request"));
    }

    #[tokio::test]
    async fn test_declare_skill_reuses_existing_skill() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/rest/v1/skills")
            .match_query(Matcher::UrlEncoded(
                "name".into(),
                r"imatch.^\s*python\s+programming\s*$".into(),
            ))
            .with_status(200)
            .with_body(r#"[{"id":"s1","name":"Python  Programming","category":"Programming","description":null}]"#)
            .create_async()
            .await;
        let create = server
            .mock("POST", "/rest/v1/skills")
            .match_query(Matcher::Any)
            .expect(0)
            .create_async()
            .await;
        let insert = server
            .mock("POST", "/rest/v1/user_skills")
            .match_body(Matcher::PartialJson(json!({"skill_id": "s1", "type": "want"})))
            .with_status(201)
            .with_body(r#"[{"user_id":"u1","skill_id":"s1","type":"want","level":null}]"#)
            .create_async()
            .await;

        let ledger = client(server.url());
        let declaration = ledger
            .declare_skill(NewDeclaration {
                user_id: "u1".to_string(),
                name: "  Python   Programming".to_string(),
                category: "Programming".to_string(),
                description: None,
                direction: Direction::Want,
                level: None,
            })
            .await
            .unwrap();

        insert.assert_async().await;
        create.assert_async().await;
        assert_eq!(declaration.skill_id, "s1");
        assert_eq!(declaration.direction, Direction::Want);
    }
}
