//! A Nostr Wallet Connect client: a single private `call(method, params)`
//! that wraps request construction, transport, and `result`/`error`
//! extraction, the way most JSON-RPC client wrappers do — except the
//! transport here is "publish an encrypted event, wait for the matching
//! encrypted response" over relays rather than an HTTP POST.

use std::time::Duration;

use async_trait::async_trait;
use expert_core::event::{tag, UnsignedEvent};
use expert_crypto::keys::Keypair;
use expert_crypto::{codec, nip44};
use expert_relay::filter::Filter;
use expert_relay::multiplexer::RelayMultiplexer;
use tracing::{debug, warn};
use url::Url;

use crate::backend::{InvoiceHandle, InvoiceStatus, PaymentBackend};
use crate::error::PaymentBackendError;

/// Request event kind (NIP-47).
const NWC_REQUEST_KIND: u32 = 23194;
/// Response event kind (NIP-47).
const NWC_RESPONSE_KIND: u32 = 23195;
/// How long `call` waits for the wallet service to answer.
const RESPONSE_TIMEOUT: Duration = Duration::from_secs(30);

/// A parsed `nostr+walletconnect://` connection URI: the wallet service's
/// pubkey, the relay it listens on, and the client's own secret.
struct NwcUri {
    wallet_service_pubkey: String,
    relay: String,
    client_secret_hex: String,
}

fn parse_nwc_uri(uri: &str) -> Result<NwcUri, PaymentBackendError> {
    // `nostr+walletconnect://<pubkey>?relay=<url>&secret=<hex>`. `url::Url`
    // does not special-case this scheme, so we swap it for `http` just long
    // enough to borrow its query-string parser.
    let rewritten = uri.replacen("nostr+walletconnect://", "http://", 1);
    let parsed = Url::parse(&rewritten)
        .map_err(|e| PaymentBackendError::InvalidConnectionUri(e.to_string()))?;

    let wallet_service_pubkey = parsed.host_str().unwrap_or("").to_string();
    if wallet_service_pubkey.len() != 64 {
        return Err(PaymentBackendError::InvalidConnectionUri(
            "missing or malformed wallet service pubkey".to_string(),
        ));
    }

    let mut relay = None;
    let mut secret = None;
    for (key, value) in parsed.query_pairs() {
        match key.as_ref() {
            "relay" => relay = Some(value.into_owned()),
            "secret" => secret = Some(value.into_owned()),
            _ => {}
        }
    }
    let relay = relay.ok_or_else(|| {
        PaymentBackendError::InvalidConnectionUri("missing relay query parameter".to_string())
    })?;
    let client_secret_hex = secret.ok_or_else(|| {
        PaymentBackendError::InvalidConnectionUri("missing secret query parameter".to_string())
    })?;

    Ok(NwcUri {
        wallet_service_pubkey,
        relay,
        client_secret_hex,
    })
}

/// `PaymentBackend` over a real Nostr Wallet Connect service.
pub struct NwcPaymentBackend<M: RelayMultiplexer> {
    wallet_service_pubkey: String,
    relay: String,
    client_key: Keypair,
    multiplexer: M,
}

impl<M: RelayMultiplexer> NwcPaymentBackend<M> {
    pub fn new(nwc_string: &str, multiplexer: M) -> Result<Self, PaymentBackendError> {
        let parsed = parse_nwc_uri(nwc_string)?;
        let client_key = Keypair::from_hex(&parsed.client_secret_hex)
            .map_err(|e| PaymentBackendError::InvalidConnectionUri(e.to_string()))?;
        Ok(Self {
            wallet_service_pubkey: parsed.wallet_service_pubkey,
            relay: parsed.relay,
            client_key,
            multiplexer,
        })
    }

    /// Call `method` with `params`, returning the wallet's `result` field.
    async fn call(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> Result<serde_json::Value, PaymentBackendError> {
        let body = serde_json::json!({ "method": method, "params": params });
        let plaintext = serde_json::to_string(&body)
            .expect("request body is valid JSON");
        let ciphertext = nip44::encrypt(
            &plaintext,
            &self.client_key.secret_key(),
            &self.wallet_service_pubkey,
        )
        .map_err(|e| PaymentBackendError::Transport(e.to_string()))?;

        let unsigned = UnsignedEvent {
            pubkey: self.client_key.public_key_hex(),
            created_at: chrono::Utc::now().timestamp(),
            kind: NWC_REQUEST_KIND,
            tags: vec![tag("p", &self.wallet_service_pubkey)],
            content: ciphertext,
        };
        let request = codec::build_and_sign(unsigned, &self.client_key)
            .map_err(|e| PaymentBackendError::Transport(e.to_string()))?;

        let relays = vec![self.relay.clone()];
        let filter = Filter::new()
            .kind(NWC_RESPONSE_KIND)
            .tag('e', vec![request.id.clone()]);
        let mut sub = self
            .multiplexer
            .subscribe(&relays, vec![filter])
            .await
            .map_err(|e| PaymentBackendError::Transport(e.to_string()))?;

        let outcome = self.multiplexer.publish(&relays, request.clone()).await;
        if !outcome.any_accepted() {
            sub.close();
            return Err(PaymentBackendError::PublishFailed(format!(
                "no relay accepted {method} request"
            )));
        }

        let response = tokio::time::timeout(RESPONSE_TIMEOUT, sub.events.recv()).await;
        sub.close();
        let response = match response {
            Ok(Some(event)) => event,
            Ok(None) => {
                return Err(PaymentBackendError::Transport(
                    "subscription closed before a response arrived".to_string(),
                ))
            }
            Err(_) => return Err(PaymentBackendError::ResponseTimeout),
        };

        let plaintext = nip44::decrypt(
            &response.content,
            &self.client_key.secret_key(),
            &self.wallet_service_pubkey,
        )
        .map_err(|e| PaymentBackendError::MalformedResponse(e.to_string()))?;
        let value: serde_json::Value = serde_json::from_str(&plaintext)
            .map_err(|e| PaymentBackendError::MalformedResponse(e.to_string()))?;

        if let Some(err) = value.get("error") {
            let code = err
                .get("code")
                .and_then(|v| v.as_str())
                .unwrap_or("UNKNOWN")
                .to_string();
            let message = err
                .get("message")
                .and_then(|v| v.as_str())
                .unwrap_or("")
                .to_string();
            return Err(PaymentBackendError::WalletError { code, message });
        }

        value.get("result").cloned().ok_or_else(|| {
            PaymentBackendError::MalformedResponse(
                "response has neither result nor error".to_string(),
            )
        })
    }
}

#[async_trait]
impl<M: RelayMultiplexer> PaymentBackend for NwcPaymentBackend<M> {
    async fn make_invoice(
        &self,
        amount_msat: u64,
        description: &str,
    ) -> Result<InvoiceHandle, PaymentBackendError> {
        let result = self
            .call(
                "make_invoice",
                serde_json::json!({ "amount": amount_msat, "description": description }),
            )
            .await?;

        let invoice = result
            .get("invoice")
            .and_then(|v| v.as_str())
            .ok_or_else(|| {
                PaymentBackendError::MalformedResponse("missing invoice field".to_string())
            })?
            .to_string();
        let payment_hash = result
            .get("payment_hash")
            .and_then(|v| v.as_str())
            .ok_or_else(|| {
                PaymentBackendError::MalformedResponse("missing payment_hash field".to_string())
            })?
            .to_string();
        debug!(%payment_hash, "minted invoice via NWC");
        Ok(InvoiceHandle { invoice, payment_hash })
    }

    async fn lookup_invoice(
        &self,
        payment_hash: &str,
    ) -> Result<InvoiceStatus, PaymentBackendError> {
        let result = self
            .call(
                "lookup_invoice",
                serde_json::json!({ "payment_hash": payment_hash }),
            )
            .await;
        let result = match result {
            Ok(r) => r,
            Err(PaymentBackendError::WalletError { code, message }) => {
                warn!(%code, %message, "wallet reported lookup_invoice error");
                return Ok(InvoiceStatus { settled_at: None });
            }
            Err(e) => return Err(e),
        };
        let settled_at = result.get("settled_at").and_then(|v| v.as_i64());
        Ok(InvoiceStatus { settled_at })
    }
}
