// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! In-process mTLS KMIP responder for tests.

use std::sync::{Arc, Mutex};

use rustls::pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer};
use rustls::server::WebPkiClientVerifier;
use rustls::{RootCertStore, ServerConfig};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_rustls::TlsAcceptor;

use super::ttlv::{read_message, Ttlv, DEFAULT_MAX_MESSAGE_SIZE};
use super::types::{Operation, ProtocolVersion, Tag, OBJECT_TYPE_SYMMETRIC_KEY};

/// CA, server and client certificates for one test.
pub(crate) struct TestPki {
    pub ca_pem: String,
    pub server_cert_pem: String,
    pub server_key_der: Vec<u8>,
    pub client_cert_pem: String,
    pub client_key_pem: String,
    pub client_key_der: Vec<u8>,
}

impl TestPki {
    /// Client certificate followed by its private key, as one PEM file.
    pub fn client_bundle_pem(&self) -> String {
        format!("{}{}", self.client_cert_pem, self.client_key_pem)
    }

    /// Client certificate followed by its key as encrypted PKCS#8.
    pub fn encrypted_client_bundle_pem(&self, password: &str) -> String {
        let info = pkcs8::PrivateKeyInfo::try_from(self.client_key_der.as_slice()).unwrap();
        let params = pkcs8::pkcs5::pbes2::Parameters::pbkdf2_sha256_aes256cbc(
            2048,
            b"kmipsalt",
            &[9u8; 16],
        )
        .unwrap();
        let encrypted = info.encrypt_with_params(params, password).unwrap();
        let key_pem = pem::encode(&pem::Pem::new(
            "ENCRYPTED PRIVATE KEY",
            encrypted.as_bytes().to_vec(),
        ));
        format!("{}{}", self.client_cert_pem, key_pem)
    }
}

pub(crate) fn generate_pki() -> TestPki {
    let ca_key = rcgen::KeyPair::generate().unwrap();
    let mut ca_params = rcgen::CertificateParams::new(vec!["KMIP Test CA".into()]).unwrap();
    ca_params.is_ca = rcgen::IsCa::Ca(rcgen::BasicConstraints::Unconstrained);
    let ca_cert = ca_params.self_signed(&ca_key).unwrap();

    let server_key = rcgen::KeyPair::generate().unwrap();
    let mut server_params =
        rcgen::CertificateParams::new(vec!["localhost".into(), "127.0.0.1".into()]).unwrap();
    server_params.extended_key_usages = vec![rcgen::ExtendedKeyUsagePurpose::ServerAuth];
    let server_cert = server_params
        .signed_by(&server_key, &ca_cert, &ca_key)
        .unwrap();

    let client_key = rcgen::KeyPair::generate().unwrap();
    let mut client_params = rcgen::CertificateParams::new(vec!["audit-decrypt".into()]).unwrap();
    client_params.extended_key_usages = vec![rcgen::ExtendedKeyUsagePurpose::ClientAuth];
    let client_cert = client_params
        .signed_by(&client_key, &ca_cert, &ca_key)
        .unwrap();

    TestPki {
        ca_pem: ca_cert.pem(),
        server_cert_pem: server_cert.pem(),
        server_key_der: server_key.serialize_der(),
        client_cert_pem: client_cert.pem(),
        client_key_pem: client_key.serialize_pem(),
        client_key_der: client_key.serialize_der(),
    }
}

/// How the responder answers each request.
#[derive(Clone)]
pub(crate) enum MockResponse {
    /// Get returns this key material; other operations fail.
    SymmetricKey(Vec<u8>),
    /// Decrypt returns this plaintext; other operations fail.
    Plaintext(Vec<u8>),
    /// Every operation fails with this result message.
    Failure(String),
    /// Create returns "created-1", Encrypt and Decrypt echo their data.
    Echo,
}

/// Fields of a received request, for assertions.
#[derive(Debug, Clone)]
pub(crate) struct RecordedRequest {
    pub operation: Option<Operation>,
    pub version: ProtocolVersion,
    pub unique_identifier: Option<String>,
    pub username: Option<String>,
    pub data: Option<Vec<u8>>,
    pub iv: Option<Vec<u8>>,
    pub has_attributes: bool,
    pub has_template_attribute: bool,
}

impl RecordedRequest {
    fn from_ttlv(request: &Ttlv) -> Self {
        let header = request.child(Tag::REQUEST_HEADER);
        let version = header.and_then(|h| h.child(Tag::PROTOCOL_VERSION));
        let item = request.child(Tag::BATCH_ITEM);
        let payload = item.and_then(|i| i.child(Tag::REQUEST_PAYLOAD));
        let payload_bytes = |tag| {
            payload
                .and_then(|p| p.child(tag))
                .and_then(Ttlv::as_bytes)
                .map(<[u8]>::to_vec)
        };

        RecordedRequest {
            operation: item
                .and_then(|i| i.child(Tag::OPERATION))
                .and_then(Ttlv::as_enumeration)
                .and_then(Operation::from_u32),
            version: ProtocolVersion {
                major: version
                    .and_then(|v| v.child(Tag::PROTOCOL_VERSION_MAJOR))
                    .and_then(Ttlv::as_integer)
                    .unwrap_or_default(),
                minor: version
                    .and_then(|v| v.child(Tag::PROTOCOL_VERSION_MINOR))
                    .and_then(Ttlv::as_integer)
                    .unwrap_or_default(),
            },
            unique_identifier: payload
                .and_then(|p| p.child(Tag::UNIQUE_IDENTIFIER))
                .and_then(Ttlv::as_text)
                .map(str::to_string),
            username: header
                .and_then(|h| h.child(Tag::AUTHENTICATION))
                .and_then(|a| a.child(Tag::CREDENTIAL))
                .and_then(|c| c.child(Tag::CREDENTIAL_VALUE))
                .and_then(|v| v.child(Tag::USERNAME))
                .and_then(Ttlv::as_text)
                .map(str::to_string),
            data: payload_bytes(Tag::DATA),
            iv: payload_bytes(Tag::IV_COUNTER_NONCE),
            has_attributes: payload.and_then(|p| p.child(Tag::ATTRIBUTES)).is_some(),
            has_template_attribute: payload
                .and_then(|p| p.child(Tag::TEMPLATE_ATTRIBUTE))
                .is_some(),
        }
    }
}

fn success(operation: Operation, payload: Vec<Ttlv>) -> Ttlv {
    batch_response(operation, 0, None, payload)
}

fn failure(operation: Operation, message: &str) -> Ttlv {
    batch_response(operation, 1, Some(message), Vec::new())
}

fn batch_response(
    operation: Operation,
    status: u32,
    message: Option<&str>,
    payload: Vec<Ttlv>,
) -> Ttlv {
    let mut item = vec![
        Ttlv::enumeration(Tag::OPERATION, operation as u32),
        Ttlv::enumeration(Tag::RESULT_STATUS, status),
    ];
    if let Some(message) = message {
        item.push(Ttlv::text(Tag::RESULT_MESSAGE, message));
    }
    item.push(Ttlv::structure(Tag::RESPONSE_PAYLOAD, payload));

    Ttlv::structure(
        Tag::RESPONSE_MESSAGE,
        vec![
            Ttlv::structure(
                Tag::RESPONSE_HEADER,
                vec![
                    Ttlv::structure(
                        Tag::PROTOCOL_VERSION,
                        vec![
                            Ttlv::integer(Tag::PROTOCOL_VERSION_MAJOR, 1),
                            Ttlv::integer(Tag::PROTOCOL_VERSION_MINOR, 2),
                        ],
                    ),
                    Ttlv::integer(Tag::BATCH_COUNT, 1),
                ],
            ),
            Ttlv::structure(Tag::BATCH_ITEM, item),
        ],
    )
}

fn respond(behavior: &MockResponse, request: &RecordedRequest) -> Ttlv {
    let operation = request.operation.unwrap_or(Operation::Get);
    let uid = request.unique_identifier.clone().unwrap_or_default();
    let data = request.data.clone().unwrap_or_default();

    match (behavior, operation) {
        (MockResponse::Failure(message), op) => failure(op, message),
        (MockResponse::SymmetricKey(key), Operation::Get) => success(
            Operation::Get,
            vec![
                Ttlv::enumeration(Tag::OBJECT_TYPE, OBJECT_TYPE_SYMMETRIC_KEY),
                Ttlv::text(Tag::UNIQUE_IDENTIFIER, uid),
                Ttlv::structure(
                    Tag::SYMMETRIC_KEY,
                    vec![Ttlv::structure(
                        Tag::KEY_BLOCK,
                        vec![
                            Ttlv::enumeration(Tag::KEY_FORMAT_TYPE, 1),
                            Ttlv::structure(
                                Tag::KEY_VALUE,
                                vec![Ttlv::bytes(Tag::KEY_MATERIAL, key.clone())],
                            ),
                        ],
                    )],
                ),
            ],
        ),
        (MockResponse::Plaintext(plaintext), Operation::Decrypt) => success(
            Operation::Decrypt,
            vec![
                Ttlv::text(Tag::UNIQUE_IDENTIFIER, uid),
                Ttlv::bytes(Tag::DATA, plaintext.clone()),
            ],
        ),
        (MockResponse::Echo, Operation::Create) => success(
            Operation::Create,
            vec![
                Ttlv::enumeration(Tag::OBJECT_TYPE, OBJECT_TYPE_SYMMETRIC_KEY),
                Ttlv::text(Tag::UNIQUE_IDENTIFIER, "created-1"),
            ],
        ),
        (MockResponse::Echo, op @ (Operation::Encrypt | Operation::Decrypt)) => success(
            op,
            vec![
                Ttlv::text(Tag::UNIQUE_IDENTIFIER, uid),
                Ttlv::bytes(Tag::DATA, data),
            ],
        ),
        (_, op) => failure(op, "Operation Not Supported"),
    }
}

/// A loopback KMIP server requiring client certificates signed by its CA.
pub(crate) struct MockKmipServer {
    port: u16,
    pki: Arc<TestPki>,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
    task: JoinHandle<()>,
}

impl MockKmipServer {
    pub async fn start(behavior: MockResponse) -> Self {
        Self::start_with_pki(generate_pki(), behavior).await
    }

    pub async fn start_with_pki(pki: TestPki, behavior: MockResponse) -> Self {
        let pki = Arc::new(pki);
        let acceptor = TlsAcceptor::from(Arc::new(server_config(&pki)));
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let requests = Arc::new(Mutex::new(Vec::new()));

        let recorded = Arc::clone(&requests);
        let task = tokio::spawn(async move {
            loop {
                let Ok((tcp, _)) = listener.accept().await else {
                    return;
                };
                let Ok(mut stream) = acceptor.accept(tcp).await else {
                    continue;
                };
                let Ok(request) = read_message(&mut stream, DEFAULT_MAX_MESSAGE_SIZE).await else {
                    continue;
                };

                let request = RecordedRequest::from_ttlv(&request);
                let response = respond(&behavior, &request);
                recorded.lock().unwrap().push(request);

                let bytes = response.encode().unwrap();
                let _ = stream.write_all(&bytes).await;
                let _ = stream.shutdown().await;
            }
        });

        Self {
            port,
            pki,
            requests,
            task,
        }
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn pki(&self) -> &TestPki {
        &self.pki
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl Drop for MockKmipServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

fn server_config(pki: &TestPki) -> ServerConfig {
    let provider = Arc::new(rustls::crypto::aws_lc_rs::default_provider());

    let mut roots = RootCertStore::empty();
    for cert in rustls_pemfile::certs(&mut pki.ca_pem.as_bytes()) {
        roots.add(cert.unwrap()).unwrap();
    }
    let verifier = WebPkiClientVerifier::builder_with_provider(Arc::new(roots), provider.clone())
        .build()
        .unwrap();

    let chain: Vec<CertificateDer<'static>> =
        rustls_pemfile::certs(&mut pki.server_cert_pem.as_bytes())
            .collect::<Result<_, _>>()
            .unwrap();
    let key = PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(pki.server_key_der.clone()));

    ServerConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .unwrap()
        .with_client_cert_verifier(verifier)
        .with_single_cert(chain, key)
        .unwrap()
}
