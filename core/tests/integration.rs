//! Tokenizer gateway lifecycle against the live mock server.
//!
//! # Design
//! Starts the mock server on a random port, then drives a small tokenizer
//! integration built on the toolkit: registry lookup, request validation,
//! typed responses, nested models, storage and debug logging, all over real
//! HTTP through the default ureq transport.

use std::sync::{Arc, Mutex};

use gateway_core::{
    apply_params, model, Endpoint, EndpointResponse, Error, FileStorage, Gateway, GatewayCore,
    GatewayLogger, GatewayRegistry, GatewayType, HttpMethod, Logger, Nested, Params, Request,
    RequestAttributes, StaticMetadata, Storage, StorageValue, TestMode, Transport, TransportError,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

model! {
    pub struct Holder {
        pub name: String,
    }
}

model! {
    pub struct Card {
        pub card_number: String,
        pub expiry_month: u32,
        pub expiry_year: u32,
        pub holder: Holder,
    }
}

model! {
    pub struct Token {
        pub token: String,
        pub last4: String,
        pub expiry_month: u32,
        pub expiry_year: u32,
        pub holder: Holder,
    }
}

model! {
    pub struct TokenList {
        pub tokens: Nested<Token>,
    }
}

model! {
    pub struct TokenFilter {
        pub last4: String,
    }
}

model! {
    pub struct Problem {
        pub message: String,
        pub errors: Vec<String>,
    }
}

model! {
    pub struct Nothing {}
}

struct Tokenize;

impl Endpoint for Tokenize {
    type Data = Card;
    type Ok = Token;
    type Err = Problem;

    const NAME: &'static str = "Tokenize";

    fn default_attributes(&self) -> RequestAttributes {
        RequestAttributes::new(HttpMethod::Post, "/tokens")
    }

    fn validate(&self, card: &Card) -> Result<(), String> {
        match card.card_number.as_deref() {
            Some(number) if gateway_core::validate_luhn(number) => Ok(()),
            Some(_) => Err("card_number fails the Luhn check".to_string()),
            None => Err("card_number is required".to_string()),
        }
    }

    fn validate_response(&self, response: &EndpointResponse<Self>) -> gateway_core::Result<()> {
        let token = response.data().and_then(|t| t.token.as_deref());
        if response.is_successful() && token.is_none() {
            return Err(Error::InvalidResponse("tokenize answered without a token".to_string()));
        }
        Ok(())
    }
}

struct ListTokens;

impl Endpoint for ListTokens {
    type Data = TokenFilter;
    type Ok = TokenList;
    type Err = Problem;

    const NAME: &'static str = "ListTokens";

    fn default_attributes(&self) -> RequestAttributes {
        RequestAttributes::new(HttpMethod::Get, "/tokens")
    }
}

struct FetchToken(String);

impl Endpoint for FetchToken {
    type Data = Nothing;
    type Ok = Token;
    type Err = Problem;

    const NAME: &'static str = "FetchToken";

    fn default_attributes(&self) -> RequestAttributes {
        RequestAttributes::new(HttpMethod::Get, format!("/tokens/{}", self.0))
    }
}

struct DeleteToken(String);

impl Endpoint for DeleteToken {
    type Data = Nothing;
    type Ok = Nothing;
    type Err = Problem;

    const NAME: &'static str = "DeleteToken";

    fn default_attributes(&self) -> RequestAttributes {
        RequestAttributes::new(HttpMethod::Delete, format!("/tokens/{}", self.0))
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct TokenizerSettings {
    api_key: Option<String>,
}

pub struct TokenizerGateway {
    core: GatewayCore,
    settings: TokenizerSettings,
}

impl TokenizerGateway {
    fn tokenize(&self, card: Card) -> Request<Tokenize> {
        self.create_request(Tokenize, Some(card), None)
    }

    fn list(&self, last4: &str) -> Request<ListTokens> {
        let filter = TokenFilter {
            last4: Some(last4.to_string()),
        };
        self.create_request(ListTokens, Some(filter), None)
    }

    fn fetch(&self, token: &str) -> Request<FetchToken> {
        self.create_request(FetchToken(token.to_string()), Some(Nothing::default()), None)
    }

    fn delete(&self, token: &str) -> Request<DeleteToken> {
        self.create_request(DeleteToken(token.to_string()), Some(Nothing::default()), None)
    }
}

impl Gateway for TokenizerGateway {
    fn name(&self) -> &str {
        "Tokenizer"
    }

    fn core(&self) -> &GatewayCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut GatewayCore {
        &mut self.core
    }

    fn initialize(&mut self, params: &Params) -> gateway_core::Result<()> {
        apply_params(&mut self.settings, params)?;
        self.core.initialize(params)
    }
}

impl GatewayType for TokenizerGateway {
    fn create(
        params: Params,
        transport: Option<Arc<dyn Transport>>,
        logger: Option<Arc<dyn Logger>>,
        storage: Option<Arc<dyn Storage>>,
    ) -> gateway_core::Result<Self> {
        let mut settings = TokenizerSettings::default();
        apply_params(&mut settings, &params)?;
        Ok(Self {
            core: GatewayCore::new(params, transport, logger, storage)?,
            settings,
        })
    }
}

fn start_mock_server() -> std::net::SocketAddr {
    let std_listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = std_listener.local_addr().unwrap();
    std_listener.set_nonblocking(true).unwrap();

    std::thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async {
            let listener = tokio::net::TcpListener::from_std(std_listener).unwrap();
            mock_server::run(listener).await
        })
        .unwrap();
    });

    addr
}

fn params(value: Value) -> Params {
    match value {
        Value::Object(map) => map,
        _ => panic!("expected object"),
    }
}

fn visa() -> Card {
    Card {
        card_number: Some("4111111111111111".to_string()),
        expiry_month: Some(12),
        expiry_year: Some(2030),
        holder: Some(Holder {
            name: Some("Ada".to_string()),
        }),
    }
}

#[test]
fn tokenizer_lifecycle() {
    let addr = start_mock_server();
    let storage_dir = tempfile::tempdir().unwrap();

    // Step 1: registry resolves the gateway from supported metadata.
    let mut registry = GatewayRegistry::new().with_metadata(StaticMetadata(vec![
        "Tokenizer".to_string(),
        "Tokenizer_Removed".to_string(),
    ]));
    registry.register::<TokenizerGateway>();
    assert_eq!(registry.find().unwrap(), &["Tokenizer".to_string()]);

    let lines = Arc::new(Mutex::new(Vec::new()));
    let sink = lines.clone();
    let logger: Arc<dyn Logger> = Arc::new(
        GatewayLogger::to_callback(move |level, text| {
            sink.lock().unwrap().push(format!("{level}: {text}"));
        })
        .enabled(),
    );
    let storage: Arc<dyn Storage> = Arc::new(FileStorage::new(storage_dir.path()).unwrap());

    let boxed = registry
        .create(
            "tokenizer",
            params(json!({
                "base_uri": format!("http://{addr}"),
                "test_mode": 1,
                "debug": true,
                "api_key": "sk_test",
            })),
            None,
            Some(logger),
            Some(storage.clone()),
        )
        .unwrap();
    assert_eq!(boxed.alias(), "Tokenizer");
    assert_eq!(boxed.test_mode(), TestMode::Test);
    let gateway = boxed.downcast_ref::<TokenizerGateway>().unwrap();
    assert_eq!(gateway.settings.api_key.as_deref(), Some("sk_test"));

    // Step 2: a bad checksum is rejected before any HTTP call.
    let mut bad = visa();
    bad.card_number = Some("4111111111111112".to_string());
    let mut request = gateway.tokenize(bad);
    assert!(matches!(
        request.send(),
        Err(Error::InvalidRequest { request: "Tokenize", .. })
    ));
    assert!(lines.lock().unwrap().is_empty(), "no call expected");

    // Step 3: tokenize a valid card.
    let mut request = gateway.tokenize(visa());
    assert!(matches!(request.get_response(), Err(Error::ResponseNotAvailable)));
    let response = request.send().unwrap();
    assert_eq!(response.status(), 201);
    let token = response.data().unwrap().clone();
    let id = token.token.clone().unwrap();
    uuid::Uuid::parse_str(&id).unwrap();
    assert_eq!(token.last4.as_deref(), Some("1111"));
    assert_eq!(token.holder.and_then(|h| h.name).as_deref(), Some("Ada"));
    assert!(matches!(
        request.initialize_request_data(visa()),
        Err(Error::RequestAlreadySent)
    ));
    assert_eq!(request.get_response().unwrap().status(), 201);

    // Step 4: the server's own validation surfaces as the error model.
    let mut expired = visa();
    expired.expiry_month = Some(13);
    let mut request = gateway.tokenize(expired);
    let response = request.send().unwrap();
    assert_eq!(response.status(), 422);
    assert!(response.data().is_none());
    let problem = response.errors().unwrap();
    assert_eq!(problem.message.as_deref(), Some("card rejected"));
    assert_eq!(problem.errors.as_deref(), Some(&["expiry_month".to_string()][..]));

    // Step 5: list by last4 decodes a nested collection.
    let mut request = gateway.list("1111");
    let response = request.send().unwrap();
    let tokens: Vec<String> = response
        .data()
        .and_then(|list| list.tokens.as_ref())
        .map(|tokens| tokens.iter().filter_map(|t| t.token.clone()).collect())
        .unwrap();
    assert_eq!(tokens, vec![id.clone()]);
    assert!(matches!(
        response.data().and_then(|list| list.tokens.as_ref()),
        Some(Nested::Many(_))
    ));

    // Step 6: fetch and cache the token.
    let mut request = gateway.fetch(&id);
    let fetched = request.send().unwrap().data().unwrap().clone();
    assert_eq!(fetched.expiry_year, Some(2030));
    gateway
        .storage()
        .set(&id, StorageValue::Data(Value::Object(gateway_core::Model::to_flat(&fetched).unwrap())))
        .unwrap();
    let reopened = FileStorage::new(storage_dir.path()).unwrap();
    let cached = reopened.get(&id).unwrap().unwrap();
    assert_eq!(cached.as_data().and_then(|v| v.get("last4")), Some(&json!("1111")));

    // Step 7: delete, then the token is gone.
    let mut request = gateway.delete(&id);
    let response = request.send().unwrap();
    assert_eq!(response.status(), 204);
    assert_eq!(response.response_data(), &Value::Null);

    let mut request = gateway.fetch(&id);
    let response = request.send().unwrap();
    assert_eq!(response.status(), 404);
    assert_eq!(
        response.errors().and_then(|p| p.message.as_deref()),
        Some("token not found")
    );

    // Step 8: debug mode logged every call.
    let lines = lines.lock().unwrap();
    assert!(
        lines
            .iter()
            .any(|l| l == &format!("debug: POST http://{addr}/tokens")),
        "{lines:#?}"
    );
    assert!(lines
        .iter()
        .any(|l| l.starts_with(&format!("debug: GET http://{addr}/tokens?last4=1111 -> 200"))));
}

#[test]
fn qualified_name_resolves_like_alias() {
    let mut registry = GatewayRegistry::new();
    registry.register::<TokenizerGateway>();
    for name in ["Tokenizer", "\\integration\\TokenizerGateway", "integration::TokenizerGateway"] {
        let gateway = registry.create(name, Params::new(), None, None, None).unwrap();
        assert_eq!(gateway.name(), "Tokenizer", "{name}");
    }
}

#[test]
fn unreachable_server_leaves_request_unsent() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let gateway = TokenizerGateway::create(
        params(json!({"base_uri": format!("http://{addr}"), "timeout_secs": 2})),
        None,
        None,
        None,
    )
    .unwrap();
    let mut request = gateway.tokenize(visa());
    assert!(matches!(
        request.send(),
        Err(Error::Transport(TransportError::Http(_)))
    ));
    assert!(!request.is_sent());
    assert!(matches!(request.get_response(), Err(Error::ResponseNotAvailable)));
}
