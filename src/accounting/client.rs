//! HTTP client for the accounting platform.
//!
//! The wire format follows the Xero accounting API: PascalCase JSON bodies
//! wrapped in a plural envelope (`{"Contacts": [...]}`), bearer tokens, and
//! the organisation selected with the `xero-tenant-id` header.

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, NaiveDate, Utc};
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::RequestBuilder;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

use super::AccountingError;
use crate::config::{self, AccountingConfig};
use crate::database::models::accounting::AccountingConnection;

/// Header selecting the organisation a request acts on
pub const TENANT_HEADER: &str = "xero-tenant-id";

/// Contacts returned per page by the platform
const CONTACT_PAGE_SIZE: usize = 100;

/// Upper bound on contact pages fetched in one sync
const MAX_CONTACT_PAGES: u32 = 50;

/// Tokens issued by the platform's token endpoint
#[derive(Debug, Clone)]
pub struct TokenSet {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: i64,
    pub external_tenant_id: Option<String>,
}

impl TokenSet {
    pub fn expires_at(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now + ChronoDuration::seconds(self.expires_in)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteContact {
    pub id: String,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
}

/// A local client or vendor as sent to the platform
#[derive(Debug, Clone)]
pub struct ContactPayload {
    pub id: Option<String>,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub is_customer: bool,
    pub is_supplier: bool,
}

/// A sales invoice as sent to the platform
#[derive(Debug, Clone)]
pub struct InvoicePayload {
    pub contact_id: String,
    pub number: String,
    pub reference: Option<String>,
    pub issue_date: NaiveDate,
    pub due_date: Option<NaiveDate>,
    pub subtotal: Decimal,
    pub tax_amount: Decimal,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RemoteInvoiceStatus {
    pub id: String,
    pub status: String,
    pub amount_paid: Decimal,
}

impl RemoteInvoiceStatus {
    pub fn is_paid(&self) -> bool {
        self.status.eq_ignore_ascii_case("PAID")
    }
}

/// Operations the sync needs from an accounting platform
#[async_trait]
pub trait AccountingProvider: Send + Sync {
    /// Where to send the browser to grant access
    fn authorize_url(&self, state: &str) -> Result<String, AccountingError>;

    async fn exchange_code(&self, code: &str) -> Result<TokenSet, AccountingError>;

    async fn refresh_token(&self, refresh_token: &str) -> Result<TokenSet, AccountingError>;

    async fn list_contacts(&self, connection: &AccountingConnection) -> Result<Vec<RemoteContact>, AccountingError>;

    /// Create or update a contact, returning its remote id
    async fn upsert_contact(
        &self,
        connection: &AccountingConnection,
        contact: &ContactPayload,
    ) -> Result<String, AccountingError>;

    /// Create a sales invoice, returning its remote id
    async fn push_invoice(
        &self,
        connection: &AccountingConnection,
        invoice: &InvoicePayload,
    ) -> Result<String, AccountingError>;

    async fn invoice_status(
        &self,
        connection: &AccountingConnection,
        remote_id: &str,
    ) -> Result<RemoteInvoiceStatus, AccountingError>;
}

pub struct HttpAccountingClient {
    http: reqwest::Client,
    config: AccountingConfig,
}

impl HttpAccountingClient {
    pub fn new(config: AccountingConfig) -> Result<Self, AccountingError> {
        if !config.is_configured() {
            return Err(AccountingError::NotConfigured);
        }
        let http = reqwest::Client::builder()
            .user_agent(concat!("bizops-api/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;
        Ok(Self { http, config })
    }

    /// Client for the globally configured platform
    pub fn from_config() -> Result<Self, AccountingError> {
        Self::new(config::config().accounting.clone())
    }

    fn endpoint(&self, path: &str) -> Result<Url, AccountingError> {
        let base = self.config.api_base_url.trim_end_matches('/');
        Ok(Url::parse(&format!("{}/{}", base, path))?)
    }

    fn authorized(&self, builder: RequestBuilder, connection: &AccountingConnection) -> RequestBuilder {
        let builder = builder
            .bearer_auth(&connection.access_token)
            .header(ACCEPT, "application/json");
        match &connection.external_tenant_id {
            Some(tenant_id) => builder.header(TENANT_HEADER, tenant_id),
            None => builder,
        }
    }

    async fn token_request(&self, params: &[(&str, &str)]) -> Result<TokenSet, AccountingError> {
        let body = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(params)
            .finish();

        let resp = self
            .http
            .post(&self.config.token_url)
            .basic_auth(&self.config.client_id, Some(&self.config.client_secret))
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .header(ACCEPT, "application/json")
            .body(body)
            .send()
            .await?;

        let token: TokenResponse = check_response(resp).await?.json().await?;
        Ok(TokenSet {
            access_token: token.access_token,
            refresh_token: token.refresh_token,
            expires_in: token.expires_in,
            external_tenant_id: None,
        })
    }

    /// First organisation the token has been granted
    async fn first_organisation(&self, access_token: &str) -> Result<Option<String>, AccountingError> {
        if self.config.connections_url.is_empty() {
            return Ok(None);
        }
        let resp = self
            .http
            .get(&self.config.connections_url)
            .bearer_auth(access_token)
            .header(ACCEPT, "application/json")
            .send()
            .await?;
        let orgs: Vec<WireOrganisation> = check_response(resp).await?.json().await?;
        Ok(orgs.into_iter().next().map(|org| org.tenant_id))
    }
}

#[async_trait]
impl AccountingProvider for HttpAccountingClient {
    fn authorize_url(&self, state: &str) -> Result<String, AccountingError> {
        let mut url = Url::parse(&self.config.authorize_url)?;
        url.query_pairs_mut()
            .append_pair("response_type", "code")
            .append_pair("client_id", &self.config.client_id)
            .append_pair("redirect_uri", &self.config.redirect_uri)
            .append_pair("scope", &self.config.scopes)
            .append_pair("state", state);
        Ok(url.into())
    }

    async fn exchange_code(&self, code: &str) -> Result<TokenSet, AccountingError> {
        let mut tokens = self
            .token_request(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", &self.config.redirect_uri),
            ])
            .await?;
        tokens.external_tenant_id = self.first_organisation(&tokens.access_token).await?;
        Ok(tokens)
    }

    async fn refresh_token(&self, refresh_token: &str) -> Result<TokenSet, AccountingError> {
        self.token_request(&[("grant_type", "refresh_token"), ("refresh_token", refresh_token)])
            .await
    }

    async fn list_contacts(&self, connection: &AccountingConnection) -> Result<Vec<RemoteContact>, AccountingError> {
        let mut contacts = Vec::new();
        for page in 1..=MAX_CONTACT_PAGES {
            let mut url = self.endpoint("Contacts")?;
            url.query_pairs_mut().append_pair("page", &page.to_string());

            let resp = self.authorized(self.http.get(url), connection).send().await?;
            let envelope: ContactsEnvelope = check_response(resp).await?.json().await?;

            let fetched = envelope.contacts.len();
            contacts.extend(envelope.contacts.into_iter().map(RemoteContact::from));
            if fetched < CONTACT_PAGE_SIZE {
                break;
            }
        }
        tracing::debug!("Fetched {} remote contacts", contacts.len());
        Ok(contacts)
    }

    async fn upsert_contact(
        &self,
        connection: &AccountingConnection,
        contact: &ContactPayload,
    ) -> Result<String, AccountingError> {
        let body = ContactsEnvelope {
            contacts: vec![WireContact::from(contact)],
        };
        let resp = self
            .authorized(self.http.post(self.endpoint("Contacts")?), connection)
            .json(&body)
            .send()
            .await?;
        let envelope: ContactsEnvelope = check_response(resp).await?.json().await?;

        envelope
            .contacts
            .into_iter()
            .next()
            .and_then(|c| c.contact_id)
            .ok_or_else(|| empty_response("contact"))
    }

    async fn push_invoice(
        &self,
        connection: &AccountingConnection,
        invoice: &InvoicePayload,
    ) -> Result<String, AccountingError> {
        let body = InvoicesEnvelope {
            invoices: vec![WireInvoice::from(invoice)],
        };
        let resp = self
            .authorized(self.http.post(self.endpoint("Invoices")?), connection)
            .json(&body)
            .send()
            .await?;
        let envelope: InvoicesEnvelope = check_response(resp).await?.json().await?;

        envelope
            .invoices
            .into_iter()
            .next()
            .and_then(|i| i.invoice_id)
            .ok_or_else(|| empty_response("invoice"))
    }

    async fn invoice_status(
        &self,
        connection: &AccountingConnection,
        remote_id: &str,
    ) -> Result<RemoteInvoiceStatus, AccountingError> {
        let url = self.endpoint(&format!("Invoices/{}", remote_id))?;
        let resp = self.authorized(self.http.get(url), connection).send().await?;
        let envelope: InvoicesEnvelope = check_response(resp).await?.json().await?;

        let invoice = envelope
            .invoices
            .into_iter()
            .next()
            .ok_or_else(|| empty_response("invoice"))?;
        Ok(RemoteInvoiceStatus {
            id: invoice.invoice_id.unwrap_or_else(|| remote_id.to_string()),
            status: invoice.status.unwrap_or_default(),
            amount_paid: invoice.amount_paid.unwrap_or_default(),
        })
    }
}

/// Map a non-success response to [`AccountingError::Remote`]
pub async fn check_response(resp: reqwest::Response) -> Result<reqwest::Response, AccountingError> {
    let status = resp.status();
    if !status.is_success() {
        return Err(AccountingError::Remote {
            status: status.as_u16(),
            body: resp.text().await.unwrap_or_default(),
        });
    }
    Ok(resp)
}

fn empty_response(what: &str) -> AccountingError {
    AccountingError::Remote {
        status: 200,
        body: format!("response contained no {}", what),
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    expires_in: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireOrganisation {
    tenant_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct ContactsEnvelope {
    #[serde(rename = "Contacts", default)]
    contacts: Vec<WireContact>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct WireContact {
    #[serde(rename = "ContactID", skip_serializing_if = "Option::is_none")]
    contact_id: Option<String>,
    #[serde(default)]
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    email_address: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    phones: Vec<WirePhone>,
    #[serde(skip_serializing_if = "Option::is_none")]
    is_customer: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    is_supplier: Option<bool>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct WirePhone {
    phone_type: String,
    #[serde(default)]
    phone_number: Option<String>,
}

const DEFAULT_PHONE: &str = "DEFAULT";

impl From<&ContactPayload> for WireContact {
    fn from(contact: &ContactPayload) -> Self {
        let phones = contact
            .phone
            .as_ref()
            .map(|number| {
                vec![WirePhone {
                    phone_type: DEFAULT_PHONE.to_string(),
                    phone_number: Some(number.clone()),
                }]
            })
            .unwrap_or_default();

        WireContact {
            contact_id: contact.id.clone(),
            name: contact.name.clone(),
            email_address: contact.email.clone(),
            phones,
            is_customer: Some(contact.is_customer),
            is_supplier: Some(contact.is_supplier),
        }
    }
}

impl From<WireContact> for RemoteContact {
    fn from(wire: WireContact) -> Self {
        let phone = wire
            .phones
            .into_iter()
            .filter(|p| p.phone_type == DEFAULT_PHONE)
            .find_map(|p| p.phone_number.filter(|n| !n.trim().is_empty()));

        RemoteContact {
            id: wire.contact_id.unwrap_or_default(),
            name: wire.name,
            email: wire.email_address.filter(|e| !e.trim().is_empty()),
            phone,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct InvoicesEnvelope {
    #[serde(rename = "Invoices", default)]
    invoices: Vec<WireInvoice>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct WireInvoice {
    #[serde(rename = "InvoiceID", skip_serializing_if = "Option::is_none")]
    invoice_id: Option<String>,
    #[serde(rename = "Type", skip_serializing_if = "Option::is_none")]
    kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    contact: Option<WireContactRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    invoice_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reference: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    due_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    line_amount_types: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    line_items: Vec<WireLineItem>,
    #[serde(
        default,
        with = "rust_decimal::serde::float_option",
        skip_serializing_if = "Option::is_none"
    )]
    amount_paid: Option<Decimal>,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireContactRef {
    #[serde(rename = "ContactID")]
    contact_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct WireLineItem {
    description: String,
    #[serde(with = "rust_decimal::serde::float")]
    quantity: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    unit_amount: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    tax_amount: Decimal,
}

const DATE_FORMAT: &str = "%Y-%m-%d";

impl From<&InvoicePayload> for WireInvoice {
    fn from(invoice: &InvoicePayload) -> Self {
        WireInvoice {
            kind: Some("ACCREC".to_string()),
            contact: Some(WireContactRef {
                contact_id: invoice.contact_id.clone(),
            }),
            invoice_number: Some(invoice.number.clone()),
            reference: invoice.reference.clone(),
            date: Some(invoice.issue_date.format(DATE_FORMAT).to_string()),
            due_date: invoice.due_date.map(|d| d.format(DATE_FORMAT).to_string()),
            status: Some("AUTHORISED".to_string()),
            line_amount_types: Some("Exclusive".to_string()),
            line_items: vec![WireLineItem {
                description: format!("Invoice {}", invoice.number),
                quantity: Decimal::ONE,
                unit_amount: invoice.subtotal,
                tax_amount: invoice.tax_amount,
            }],
            ..WireInvoice::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn test_config() -> AccountingConfig {
        AccountingConfig {
            provider: "xero".into(),
            client_id: "client-123".into(),
            client_secret: "secret".into(),
            redirect_uri: "http://localhost:3000/accounting/callback".into(),
            authorize_url: "https://login.example.com/authorize".into(),
            token_url: "https://login.example.com/token".into(),
            api_base_url: "https://api.example.com/2.0/".into(),
            connections_url: String::new(),
            scopes: "offline_access accounting.contacts".into(),
            request_timeout_secs: 5,
        }
    }

    #[test]
    fn unconfigured_client_is_rejected() {
        let mut config = test_config();
        config.client_secret.clear();
        assert!(matches!(
            HttpAccountingClient::new(config),
            Err(AccountingError::NotConfigured)
        ));
    }

    #[test]
    fn authorize_url_carries_oauth_parameters() {
        let client = HttpAccountingClient::new(test_config()).unwrap();
        let url = Url::parse(&client.authorize_url("st@te").unwrap()).unwrap();
        let pairs: std::collections::HashMap<_, _> = url.query_pairs().into_owned().collect();

        assert_eq!(url.host_str(), Some("login.example.com"));
        assert_eq!(pairs["response_type"], "code");
        assert_eq!(pairs["client_id"], "client-123");
        assert_eq!(pairs["redirect_uri"], "http://localhost:3000/accounting/callback");
        assert_eq!(pairs["scope"], "offline_access accounting.contacts");
        assert_eq!(pairs["state"], "st@te");
    }

    #[test]
    fn endpoint_joins_without_double_slash() {
        let client = HttpAccountingClient::new(test_config()).unwrap();
        let url = client.endpoint("Invoices/abc").unwrap();
        assert_eq!(url.as_str(), "https://api.example.com/2.0/Invoices/abc");
    }

    #[test]
    fn remote_contacts_pick_default_phone() {
        let envelope: ContactsEnvelope = serde_json::from_value(json!({
            "Contacts": [{
                "ContactID": "c-1",
                "Name": "Acme Ltd",
                "EmailAddress": "",
                "Phones": [
                    {"PhoneType": "MOBILE", "PhoneNumber": "0400"},
                    {"PhoneType": "DEFAULT", "PhoneNumber": "9000 1234"}
                ]
            }]
        }))
        .unwrap();

        let contact = RemoteContact::from(envelope.contacts.into_iter().next().unwrap());
        assert_eq!(contact.id, "c-1");
        assert_eq!(contact.email, None);
        assert_eq!(contact.phone.as_deref(), Some("9000 1234"));
    }

    #[test]
    fn invoice_payload_serializes_as_sales_invoice() {
        let payload = InvoicePayload {
            contact_id: "c-1".into(),
            number: "INV-2024-0001".into(),
            reference: Some("Fit-out".into()),
            issue_date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            due_date: NaiveDate::from_ymd_opt(2024, 3, 31),
            subtotal: Decimal::new(100000, 2),
            tax_amount: Decimal::new(10000, 2),
        };
        let body = serde_json::to_value(WireInvoice::from(&payload)).unwrap();

        assert_eq!(body["Type"], "ACCREC");
        assert_eq!(body["Contact"]["ContactID"], "c-1");
        assert_eq!(body["Date"], "2024-03-01");
        assert_eq!(body["DueDate"], "2024-03-31");
        assert_eq!(body["LineItems"][0]["UnitAmount"], 1000.0);
        assert_eq!(body["LineItems"][0]["TaxAmount"], 100.0);
        assert!(body.get("InvoiceID").is_none());
        assert!(body.get("AmountPaid").is_none());
    }

    #[test]
    fn paid_status_is_case_insensitive() {
        let status = RemoteInvoiceStatus {
            id: "i-1".into(),
            status: "Paid".into(),
            amount_paid: Decimal::ZERO,
        };
        assert!(status.is_paid());
    }

    #[test]
    fn token_set_expiry_is_relative_to_now() {
        let now = Utc::now();
        let tokens = TokenSet {
            access_token: "a".into(),
            refresh_token: "r".into(),
            expires_in: 1800,
            external_tenant_id: None,
        };
        assert_eq!(tokens.expires_at(now) - now, ChronoDuration::seconds(1800));
    }
}
