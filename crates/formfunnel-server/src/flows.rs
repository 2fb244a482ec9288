use crate::server::AppState;
use formfunnel_core::{parse_request_data, FormFunnelError, ParsedRow, Payload, Slot, TableSchema};
use formfunnel_mail::Replacement;
use formfunnel_store::{Condition, Database, RowUpdate, SelectedRow, Selection};
use metrics::counter;
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde_json::Value;
use tracing::{error, info, warn};

pub const LEADS_TABLE: &str = "leads";
pub const MEMBERSHIP_TABLE: &str = "membership_applicants";

pub const TOKEN_LENGTH: usize = 32;
/// Stored in place of a verification token once it has been used.
pub const ALREADY_VERIFIED: &str = "ALREADY_VERIFIED";

pub const TEMPLATE_KINDS: [&str; 4] = [
    "verify",
    "verification_successful",
    "membership_application",
    "user_registered",
];

/// Result pages, relative to the configured redirect base.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Page {
    LeadInvalidData,
    ContactSuccess,
    VerificationSuccess,
    AlreadyVerified,
    MembershipInvalidData,
    ApplicationSuccess,
}

impl Page {
    pub fn path(self) -> &'static str {
        match self {
            Page::LeadInvalidData => "leadgen/invalid-data.html",
            Page::ContactSuccess => "leadgen/contact_success.html",
            Page::VerificationSuccess => "leadgen/verification-success.html",
            Page::AlreadyVerified => "leadgen/already-verified.html",
            Page::MembershipInvalidData => "membership/invalid-data.html",
            Page::ApplicationSuccess => "membership/application-success.html",
        }
    }

    pub fn is_rejection(self) -> bool {
        !matches!(
            self,
            Page::ContactSuccess | Page::VerificationSuccess | Page::ApplicationSuccess
        )
    }
}

pub fn generate_token() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(TOKEN_LENGTH)
        .map(char::from)
        .collect()
}

fn slot_str<'a>(row: &'a ParsedRow, column: &str) -> &'a str {
    row.get(column)
        .and_then(Slot::as_value)
        .and_then(Value::as_str)
        .unwrap_or_default()
}

fn reject_incomplete(row: &ParsedRow, table: &TableSchema) -> bool {
    let missing = row.missing_columns(table);
    if missing.is_empty() {
        return false;
    }
    warn!(table = %table.name, ?missing, "rejecting submission: missing or invalid fields");
    true
}

async fn send_email(
    state: &AppState,
    kind: &str,
    from: Option<&str>,
    to: Option<&str>,
    replacements: &[Replacement],
) {
    let composed = state.templates.envelope(kind).and_then(|envelope| {
        let mut envelope = envelope.clone();
        if let Some(from) = from {
            envelope.from = from.to_string();
        }
        if let Some(to) = to {
            envelope.to = to.to_string();
        }
        state.templates.compose(kind, envelope, replacements)
    });
    let result = match composed {
        Ok(email) => state.mailer.send(&email).await,
        Err(err) => Err(err),
    };
    match result {
        Ok(()) => {
            counter!("email_sent_total").increment(1);
            info!("sent {kind} email");
        }
        Err(err) => {
            counter!("email_error_total").increment(1);
            error!("failed to send {kind} email: {err}");
        }
    }
}

pub async fn leadgen(state: &AppState, payload: Payload) -> Page {
    match register_lead(state, &payload).await {
        Ok(page) => page,
        Err(err) => {
            error!("leadgen failed: {err}");
            Page::LeadInvalidData
        }
    }
}

async fn register_lead(state: &AppState, payload: &Payload) -> Result<Page, FormFunnelError> {
    let table = state.catalog.table(LEADS_TABLE)?;
    let mut row = parse_request_data(payload, table);
    if reject_incomplete(&row, table) {
        return Ok(Page::LeadInvalidData);
    }
    let token = generate_token();
    if !row.set("verification_token", token.as_str()) {
        return Err(FormFunnelError::Schema(format!(
            "table {} has no verification_token column",
            table.name
        )));
    }

    let db = state.store.open().await?;
    let inserted = insert_into(&db, table, &row).await;
    db.close().await;
    inserted?;

    let name = slot_str(&row, "name");
    let email = slot_str(&row, "email");
    info!("registered lead {email}");
    send_email(
        state,
        "verify",
        None,
        Some(email),
        &[
            Replacement::new("nombre", name),
            Replacement::new("verification-token", token.as_str()),
        ],
    )
    .await;
    Ok(Page::ContactSuccess)
}

async fn insert_into(
    db: &Database,
    table: &TableSchema,
    row: &ParsedRow,
) -> Result<u64, FormFunnelError> {
    db.create_table(table).await?;
    db.insert_row(&table.name, row).await
}

#[derive(Debug)]
struct ConfirmedLead {
    name: String,
    email: String,
    organization: String,
    role: String,
    message: String,
    user_token: String,
}

enum Confirmation {
    Confirmed(ConfirmedLead),
    Rejected(Page),
}

pub async fn verification(state: &AppState, token: Option<&str>) -> Page {
    let Some(token) = token else {
        warn!("verification without token");
        return Page::LeadInvalidData;
    };
    if token.chars().count() != TOKEN_LENGTH {
        warn!("verification with malformed token {token:?}");
        return Page::LeadInvalidData;
    }
    match verify_lead(state, token).await {
        Ok(page) => page,
        Err(err) => {
            error!("verification failed: {err}");
            Page::LeadInvalidData
        }
    }
}

async fn verify_lead(state: &AppState, token: &str) -> Result<Page, FormFunnelError> {
    let table = state.catalog.table(LEADS_TABLE)?;
    let db = state.store.open().await?;
    let confirmation = confirm_lead(&db, table, token).await;
    db.close().await;

    let lead = match confirmation? {
        Confirmation::Confirmed(lead) => lead,
        Confirmation::Rejected(page) => return Ok(page),
    };
    info!("verified lead {}", lead.email);

    send_email(
        state,
        "verification_successful",
        None,
        Some(&lead.email),
        &[
            Replacement::new("nombre", lead.name.as_str()),
            Replacement::new("user-token", lead.user_token.as_str()),
        ],
    )
    .await;

    if !lead.message.is_empty() {
        let organization = if lead.organization.is_empty() {
            String::new()
        } else {
            format!(", pertenezco a {}", lead.organization)
        };
        let role = if lead.role.is_empty() {
            ",".to_string()
        } else {
            format!(", como {},", lead.role)
        };
        send_email(
            state,
            "user_registered",
            Some(&lead.email),
            None,
            &[
                Replacement::new("nombre", lead.name.as_str()),
                Replacement::new("organization", organization),
                Replacement::new("role", role),
                Replacement::new("message", lead.message.as_str()),
            ],
        )
        .await;
    }
    Ok(Page::VerificationSuccess)
}

async fn confirm_lead(
    db: &Database,
    table: &TableSchema,
    token: &str,
) -> Result<Confirmation, FormFunnelError> {
    db.create_table(table).await?;
    let selection = Selection::new(
        [
            "verification_token",
            "email",
            "name",
            "organization",
            "role",
            "message",
        ],
        Condition::eq("verification_token", token),
    );
    // Used tokens are overwritten, so a miss usually means a repeated click.
    let Some(found) = db.select_one(&table.name, &selection).await? else {
        return Ok(Confirmation::Rejected(Page::AlreadyVerified));
    };
    match found.get_str("verification_token") {
        Some(ALREADY_VERIFIED) => return Ok(Confirmation::Rejected(Page::AlreadyVerified)),
        Some(stored) if stored == token => {}
        _ => return Ok(Confirmation::Rejected(Page::LeadInvalidData)),
    }

    let user_token = generate_token();
    let update = RowUpdate::new(Condition::eq("verification_token", token))
        .set("user_token", user_token.as_str())
        .set("verification_token", ALREADY_VERIFIED);
    db.update_rows(&table.name, &[update]).await?;

    let text = |row: &SelectedRow, column: &str| row.get_str(column).unwrap_or_default().to_string();
    Ok(Confirmation::Confirmed(ConfirmedLead {
        name: text(&found, "name"),
        email: text(&found, "email"),
        organization: text(&found, "organization"),
        role: text(&found, "role"),
        message: text(&found, "message"),
        user_token,
    }))
}

struct Applicant {
    name: String,
    email: String,
}

pub async fn membership(state: &AppState, payload: Payload) -> Page {
    match register_applicant(state, &payload).await {
        Ok(page) => page,
        Err(err) => {
            error!("membership application failed: {err}");
            Page::MembershipInvalidData
        }
    }
}

async fn register_applicant(state: &AppState, payload: &Payload) -> Result<Page, FormFunnelError> {
    let leads = state.catalog.table(LEADS_TABLE)?;
    let table = state.catalog.table(MEMBERSHIP_TABLE)?;
    let row = parse_request_data(payload, table);
    if reject_incomplete(&row, table) {
        return Ok(Page::MembershipInvalidData);
    }
    let token = match payload.get("user_token").and_then(Value::as_str) {
        Some(token) if token.chars().count() == TOKEN_LENGTH => token,
        _ => {
            warn!("membership application without a valid user_token");
            return Ok(Page::MembershipInvalidData);
        }
    };

    let db = state.store.open().await?;
    let applicant = store_applicant(&db, leads, table, row, token).await;
    db.close().await;

    let Some(applicant) = applicant? else {
        return Ok(Page::MembershipInvalidData);
    };
    info!("registered membership application for {}", applicant.email);
    send_email(
        state,
        "membership_application",
        None,
        Some(&applicant.email),
        &[Replacement::new("nombre", applicant.name.as_str())],
    )
    .await;
    Ok(Page::ApplicationSuccess)
}

async fn store_applicant(
    db: &Database,
    leads: &TableSchema,
    table: &TableSchema,
    mut row: ParsedRow,
    token: &str,
) -> Result<Option<Applicant>, FormFunnelError> {
    db.create_table(leads).await?;
    let lead = db
        .select_one(
            &leads.name,
            &Selection::new(["user_token", "name", "email"], Condition::eq("user_token", token)),
        )
        .await?;
    let applicant = lead.and_then(|lead| {
        let stored = lead.get_str("user_token")?;
        if stored != token {
            return None;
        }
        Some(Applicant {
            name: lead.get_str("name")?.to_string(),
            email: lead.get_str("email")?.to_string(),
        })
    });
    let Some(applicant) = applicant else {
        warn!("user_token does not belong to a verified lead");
        return Ok(None);
    };

    db.create_table(table).await?;
    let existing = db
        .select_one(
            &table.name,
            &Selection::new(["user_token"], Condition::eq("user_token", token)),
        )
        .await?;
    if existing.is_some() {
        warn!("user_token already used for a membership application");
        return Ok(None);
    }
    if !row.set("user_token", token) {
        return Err(FormFunnelError::Schema(format!(
            "table {} has no user_token column",
            table.name
        )));
    }
    db.insert_row(&table.name, &row).await?;
    Ok(Some(applicant))
}
