use super::{Result, WebError};
use crate::contract::{CreateAsset, UpdateAsset};
use crate::core::{Asset, HistoryEntry};
use crate::facade::Ledger;
use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub type SharedLedger = Arc<Ledger>;

pub fn router(ledger: SharedLedger) -> Router {
    Router::new()
        .route("/createAsset", post(create_asset))
        .route("/updateAsset/:msisdn", post(update_asset))
        .route("/readAsset/:msisdn", get(read_asset))
        .route("/getAssetHistory/:msisdn", get(asset_history))
        .route("/assetExists/:msisdn", get(asset_exists))
        .route("/initLedger", post(init_ledger))
        .layer(TraceLayer::new_for_http())
        .with_state(ledger)
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TxMessage {
    pub message: String,
    #[serde(rename = "txId")]
    pub tx_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ExistsResponse {
    #[serde(rename = "MSISDN")]
    pub msisdn: String,
    pub exists: bool,
}

/// Body of `POST /updateAsset/:msisdn`. The key comes from the path; the
/// balance may be sent as a JSON number or as a string.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct UpdateBody {
    #[serde(default)]
    pub balance: Value,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub trans_type: String,
    #[serde(default)]
    pub remarks: String,
}

impl UpdateBody {
    fn into_request(self, msisdn: String) -> Result<UpdateAsset> {
        let balance = match self.balance {
            Value::String(text) => text,
            Value::Number(number) => number.to_string(),
            other => {
                return Err(WebError::Input(format!(
                    "Balance must be a number or a string, got {other}"
                )));
            }
        };
        Ok(UpdateAsset {
            msisdn,
            balance,
            status: self.status,
            trans_type: self.trans_type,
            remarks: self.remarks,
        })
    }
}

async fn create_asset(
    State(ledger): State<SharedLedger>,
    Json(request): Json<CreateAsset>,
) -> Result<Json<TxMessage>> {
    let receipt = ledger.create_asset(request).await?;
    Ok(Json(TxMessage {
        message: "Asset created successfully".to_string(),
        tx_id: receipt.tx_id.to_string(),
    }))
}

async fn update_asset(
    State(ledger): State<SharedLedger>,
    Path(msisdn): Path<String>,
    Json(body): Json<UpdateBody>,
) -> Result<Json<TxMessage>> {
    let request = body.into_request(msisdn)?;
    let receipt = ledger.update_asset(request).await?;
    Ok(Json(TxMessage {
        message: "Asset updated successfully".to_string(),
        tx_id: receipt.tx_id.to_string(),
    }))
}

async fn read_asset(
    State(ledger): State<SharedLedger>,
    Path(msisdn): Path<String>,
) -> Result<Json<Asset>> {
    Ok(Json(ledger.read_asset(&msisdn).await?))
}

async fn asset_history(
    State(ledger): State<SharedLedger>,
    Path(msisdn): Path<String>,
) -> Result<Json<Vec<HistoryEntry>>> {
    Ok(Json(ledger.asset_history(&msisdn).await?))
}

async fn asset_exists(
    State(ledger): State<SharedLedger>,
    Path(msisdn): Path<String>,
) -> Result<Json<ExistsResponse>> {
    let exists = ledger.asset_exists(&msisdn).await?;
    Ok(Json(ExistsResponse { msisdn, exists }))
}

async fn init_ledger(State(ledger): State<SharedLedger>) -> Result<Json<TxMessage>> {
    let receipt = ledger.init_ledger().await?;
    Ok(Json(TxMessage {
        message: "Ledger initialized".to_string(),
        tx_id: receipt.tx_id.to_string(),
    }))
}
