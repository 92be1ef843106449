use std::{collections::HashMap, sync::Arc};

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::{net::TcpListener, sync::RwLock};
use uuid::Uuid;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Token {
    pub token: Uuid,
    pub last4: String,
    pub expiry_month: u32,
    pub expiry_year: u32,
    pub holder: Option<Holder>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Holder {
    pub name: String,
}

#[derive(Deserialize)]
pub struct TokenizeCard {
    pub card_number: String,
    pub expiry_month: u32,
    pub expiry_year: u32,
    pub holder: Option<Holder>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TokenList {
    pub tokens: Vec<Token>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Problem {
    pub message: String,
    pub errors: Vec<String>,
}

#[derive(Deserialize)]
pub struct TokenFilter {
    pub last4: Option<String>,
}

pub type Vault = Arc<RwLock<HashMap<Uuid, Token>>>;

type Failure = (StatusCode, Json<Problem>);

pub fn app() -> Router {
    let vault: Vault = Arc::new(RwLock::new(HashMap::new()));
    Router::new()
        .route("/tokens", get(list_tokens).post(tokenize))
        .route("/tokens/{token}", get(get_token).delete(delete_token))
        .with_state(vault)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

/// Luhn checksum over ASCII digits; anything else fails.
pub fn luhn_valid(number: &str) -> bool {
    if number.is_empty() || !number.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }
    let sum: u32 = number
        .bytes()
        .rev()
        .enumerate()
        .map(|(i, b)| {
            let d = u32::from(b - b'0');
            if i % 2 == 1 {
                let d = d * 2;
                if d > 9 {
                    d - 9
                } else {
                    d
                }
            } else {
                d
            }
        })
        .sum();
    sum % 10 == 0
}

fn problem(status: StatusCode, message: &str, errors: Vec<String>) -> Failure {
    (
        status,
        Json(Problem {
            message: message.to_string(),
            errors,
        }),
    )
}

async fn list_tokens(
    State(vault): State<Vault>,
    Query(filter): Query<TokenFilter>,
) -> Json<TokenList> {
    let tokens = vault.read().await;
    let mut tokens: Vec<Token> = tokens
        .values()
        .filter(|t| filter.last4.as_deref().map_or(true, |l| t.last4 == l))
        .cloned()
        .collect();
    tokens.sort_by_key(|t| t.token);
    Json(TokenList { tokens })
}

async fn tokenize(
    State(vault): State<Vault>,
    Json(input): Json<TokenizeCard>,
) -> Result<(StatusCode, Json<Token>), Failure> {
    let mut errors = Vec::new();
    if !luhn_valid(&input.card_number) {
        errors.push("card_number".to_string());
    }
    if !(1..=12).contains(&input.expiry_month) {
        errors.push("expiry_month".to_string());
    }
    if !errors.is_empty() {
        return Err(problem(StatusCode::UNPROCESSABLE_ENTITY, "card rejected", errors));
    }

    let last4 = input.card_number[input.card_number.len().saturating_sub(4)..].to_string();
    let token = Token {
        token: Uuid::new_v4(),
        last4,
        expiry_month: input.expiry_month,
        expiry_year: input.expiry_year,
        holder: input.holder,
    };
    vault.write().await.insert(token.token, token.clone());
    Ok((StatusCode::CREATED, Json(token)))
}

async fn get_token(
    State(vault): State<Vault>,
    Path(token): Path<Uuid>,
) -> Result<Json<Token>, Failure> {
    let tokens = vault.read().await;
    tokens
        .get(&token)
        .cloned()
        .map(Json)
        .ok_or_else(|| problem(StatusCode::NOT_FOUND, "token not found", Vec::new()))
}

async fn delete_token(
    State(vault): State<Vault>,
    Path(token): Path<Uuid>,
) -> Result<StatusCode, Failure> {
    let mut tokens = vault.write().await;
    tokens
        .remove(&token)
        .map(|_| StatusCode::NO_CONTENT)
        .ok_or_else(|| problem(StatusCode::NOT_FOUND, "token not found", Vec::new()))
}
