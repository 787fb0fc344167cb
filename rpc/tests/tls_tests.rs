//! Real `wss://` handshakes against a server using a self-signed CA
//! certificate, the kind node and wallet daemons generate.

use std::sync::Arc;

use rustls::pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer};
use serde_json::{json, Value};
use tokio_tungstenite::tungstenite::{self, Message};

use stakepool_rpc::{ConnConfig, IgnoreNotifications, RpcClient, RpcError};
use stakepool_types::SemVer;

struct SelfSigned {
    pem: String,
    der: CertificateDer<'static>,
    key: PrivateKeyDer<'static>,
}

fn self_signed_ca() -> SelfSigned {
    let mut params =
        rcgen::CertificateParams::new(vec!["localhost".to_string(), "127.0.0.1".to_string()]);
    params.is_ca = rcgen::IsCa::Ca(rcgen::BasicConstraints::Unconstrained);
    let cert = rcgen::Certificate::from_params(params).unwrap();
    let pem = cert.serialize_pem().unwrap();
    let der = rustls_pemfile::certs(&mut pem.as_bytes())
        .next()
        .unwrap()
        .unwrap();
    let key = PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(cert.serialize_private_key_der()));
    SelfSigned { pem, der, key }
}

/// Serve one TLS websocket connection on a plain thread, answering every
/// request with a `version` result.
fn spawn_tls_server(cert: CertificateDer<'static>, key: PrivateKeyDer<'static>) -> String {
    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let config = rustls::ServerConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .unwrap()
        .with_no_client_auth()
        .with_single_cert(vec![cert], key)
        .unwrap();
    let config = Arc::new(config);

    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap().to_string();

    std::thread::spawn(move || {
        let Ok((tcp, _)) = listener.accept() else {
            return;
        };
        let conn = rustls::ServerConnection::new(config).unwrap();
        let stream = rustls::StreamOwned::new(conn, tcp);
        let Ok(mut ws) = tungstenite::accept(stream) else {
            return;
        };
        while let Ok(msg) = ws.read() {
            let text = match msg {
                Message::Text(text) => text,
                Message::Close(_) => break,
                _ => continue,
            };
            let req: Value = serde_json::from_str(&text).unwrap();
            let reply = json!({
                "result": {
                    "ecrdjsonrpcapi": {"versionstring": "6.1.1", "major": 6, "minor": 1, "patch": 1}
                },
                "error": null,
                "id": req["id"],
            });
            if ws.send(Message::Text(reply.to_string())).is_err() {
                break;
            }
        }
    });

    addr
}

#[tokio::test]
async fn handshake_succeeds_with_pinned_self_signed_ca() {
    let server_cert = self_signed_ca();
    let host = spawn_tls_server(server_cert.der.clone(), server_cert.key);

    let config =
        ConnConfig::new(&host, "rpcuser", "rpcpass").with_certificates(server_cert.pem.into_bytes());
    let client = RpcClient::connect(&config, Arc::new(IgnoreNotifications))
        .await
        .expect("TLS session with a CA:TRUE self-signed certificate");

    assert_eq!(
        client.api_version("ecrdjsonrpcapi").await.unwrap(),
        SemVer::new(6, 1, 1)
    );
}

#[tokio::test]
async fn handshake_fails_when_server_presents_another_certificate() {
    let server_cert = self_signed_ca();
    let pinned = self_signed_ca();
    let host = spawn_tls_server(server_cert.der, server_cert.key);

    let config =
        ConnConfig::new(&host, "rpcuser", "rpcpass").with_certificates(pinned.pem.into_bytes());
    let result = RpcClient::connect(&config, Arc::new(IgnoreNotifications)).await;

    assert!(matches!(result, Err(RpcError::Connect(_))));
}
