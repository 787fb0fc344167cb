//! TLS for RPC sessions, pinned to the server's own certificate.
//!
//! Node and wallet daemons generate a self-signed `rpc.cert` that is also
//! marked as a CA. Path validation refuses such a certificate as a server
//! certificate, so the connector trusts exactly the certificates it was
//! given: the server must present one of them byte for byte, and the
//! handshake signature is still checked against that certificate's key.
//!
//! Signatures are verified with the ring provider, which has no P-521
//! support. Daemons that default to P-521 keys need their certificate
//! regenerated with a P-256, P-384 or Ed25519 key.

use std::sync::Arc;

use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::{
    verify_tls12_signature, verify_tls13_signature, CryptoProvider, WebPkiSupportedAlgorithms,
};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{CertificateError, DigitallySignedStruct, SignatureScheme};
use tokio_tungstenite::Connector;

use crate::error::RpcError;

/// Accepts a server only when it presents one of the pinned certificates.
#[derive(Debug)]
pub struct PinnedCertVerifier {
    pinned: Vec<CertificateDer<'static>>,
    algorithms: WebPkiSupportedAlgorithms,
}

impl PinnedCertVerifier {
    pub fn from_pem(pem: &[u8], provider: &CryptoProvider) -> Result<Self, RpcError> {
        let pinned = rustls_pemfile::certs(&mut &pem[..])
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| RpcError::Tls(format!("invalid PEM data: {e}")))?;
        if pinned.is_empty() {
            return Err(RpcError::Tls("no certificates found in PEM data".into()));
        }
        Ok(Self {
            pinned,
            algorithms: provider.signature_verification_algorithms,
        })
    }

    pub fn pins(&self, cert: &CertificateDer<'_>) -> bool {
        self.pinned.iter().any(|p| p.as_ref() == cert.as_ref())
    }
}

impl ServerCertVerifier for PinnedCertVerifier {
    fn verify_server_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        if self.pins(end_entity) {
            Ok(ServerCertVerified::assertion())
        } else {
            Err(rustls::Error::InvalidCertificate(
                CertificateError::UnknownIssuer,
            ))
        }
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls12_signature(message, cert, dss, &self.algorithms)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls13_signature(message, cert, dss, &self.algorithms)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.algorithms.supported_schemes()
    }
}

/// Build a websocket TLS connector pinned to the given PEM certificates.
pub fn tls_connector(pem: &[u8]) -> Result<Connector, RpcError> {
    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let verifier = PinnedCertVerifier::from_pem(pem, &provider)?;
    let tls = rustls::ClientConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .map_err(|e| RpcError::Tls(e.to_string()))?
        .dangerous()
        .with_custom_certificate_verifier(Arc::new(verifier))
        .with_no_client_auth();
    Ok(Connector::Rustls(Arc::new(tls)))
}
