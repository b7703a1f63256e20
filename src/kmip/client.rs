// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! KMIP client over mutually authenticated TLS.
//!
//! Each operation opens a fresh connection, sends one request message with
//! a single batch item, reads one response message and closes the
//! connection. There is no session state and no retry. No socket timeout
//! is applied; callers that need a deadline wrap the call themselves.

use rustls::pki_types::ServerName;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tracing::{debug, instrument, warn};
use zeroize::Zeroizing;

use crate::security::{create_tls_connector, TlsConfig};

use super::error::KmipError;
use super::message::{
    build_request, parse_response, CreateResponse, Credentials, DecryptResponse, EncryptResponse,
    GetResponse, RequestHeader, RequestPayload,
};
use super::ttlv::{read_message, DEFAULT_MAX_MESSAGE_SIZE};
use super::types::ProtocolVersion;

/// Configuration of a KMIP client.
#[derive(Clone)]
pub struct KmipConfig {
    pub version: ProtocolVersion,
    /// Server IP address; dialed in preference to `hostname`.
    pub ip: String,
    /// Server hostname; also the TLS server name when set.
    pub hostname: String,
    pub port: u16,
    pub username: String,
    pub password: Zeroizing<String>,
    /// Client certificate (PEM).
    pub client_certificate: Vec<u8>,
    /// Client private key (PEM, possibly encrypted PKCS#8).
    pub client_private_key: Vec<u8>,
    pub client_key_password: Option<String>,
    /// Root CA used to verify the server (PEM).
    pub root_certificate: Vec<u8>,
    /// Upper bound on a response message.
    pub max_response_size: usize,
}

impl Default for KmipConfig {
    fn default() -> Self {
        Self {
            version: ProtocolVersion::V1_2,
            ip: String::new(),
            hostname: String::new(),
            port: 0,
            username: String::new(),
            password: Zeroizing::new(String::new()),
            client_certificate: Vec::new(),
            client_private_key: Vec::new(),
            client_key_password: None,
            root_certificate: Vec::new(),
            max_response_size: DEFAULT_MAX_MESSAGE_SIZE,
        }
    }
}

impl std::fmt::Debug for KmipConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KmipConfig")
            .field("version", &self.version)
            .field("ip", &self.ip)
            .field("hostname", &self.hostname)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("client_private_key", &"[REDACTED]")
            .finish()
    }
}

impl KmipConfig {
    pub fn new(version: ProtocolVersion, port: u16) -> Self {
        Self {
            version,
            port,
            ..Self::default()
        }
    }

    pub fn with_ip(mut self, ip: impl Into<String>) -> Self {
        self.ip = ip.into();
        self
    }

    pub fn with_hostname(mut self, hostname: impl Into<String>) -> Self {
        self.hostname = hostname.into();
        self
    }

    /// Sets username/password authentication. Sent only when both are non-empty.
    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = username.into();
        self.password = Zeroizing::new(password.into());
        self
    }

    pub fn with_client_certificate(mut self, certificate: Vec<u8>, private_key: Vec<u8>) -> Self {
        self.client_certificate = certificate;
        self.client_private_key = private_key;
        self
    }

    pub fn with_client_key_password(mut self, password: Option<String>) -> Self {
        self.client_key_password = password;
        self
    }

    pub fn with_root_certificate(mut self, certificate: Vec<u8>) -> Self {
        self.root_certificate = certificate;
        self
    }

    pub fn with_max_response_size(mut self, size: usize) -> Self {
        self.max_response_size = size;
        self
    }

    /// Checks required fields without touching the network.
    pub fn validate(&self) -> Result<(), KmipError> {
        if !self.version.is_supported() {
            return Err(KmipError::InvalidVersion(self.version));
        }
        if self.hostname.is_empty() && self.ip.is_empty() {
            return Err(KmipError::ServerAddressMissing);
        }
        if self.port == 0 {
            return Err(KmipError::ServerPortMissing);
        }
        if self.root_certificate.is_empty() {
            return Err(KmipError::RootCertMissing);
        }
        if self.client_certificate.is_empty() {
            return Err(KmipError::ClientCertMissing);
        }
        if self.client_private_key.is_empty() {
            return Err(KmipError::ClientKeyMissing);
        }
        Ok(())
    }
}

/// A KMIP client bound to one server and protocol version.
pub struct KmipClient {
    header: RequestHeader,
    connector: TlsConnector,
    server_name: ServerName<'static>,
    address: String,
    max_response_size: usize,
}

impl std::fmt::Debug for KmipClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KmipClient")
            .field("version", &self.header.version)
            .field("address", &self.address)
            .finish()
    }
}

impl KmipClient {
    /// Validates the configuration and builds the TLS context.
    ///
    /// Fails before any I/O on missing fields, unsupported versions or
    /// unparseable certificates.
    pub fn new(config: KmipConfig) -> Result<Self, KmipError> {
        config.validate()?;

        let connector = create_tls_connector(&TlsConfig {
            client_certificate: config.client_certificate.clone(),
            client_private_key: config.client_private_key.clone(),
            client_key_password: config.client_key_password.clone(),
            root_certificate: config.root_certificate.clone(),
        })?;

        let name = if config.hostname.is_empty() {
            config.ip.clone()
        } else {
            config.hostname.clone()
        };
        let server_name =
            ServerName::try_from(name.clone()).map_err(|_| KmipError::InvalidServerName(name))?;

        let host = if config.ip.is_empty() {
            &config.hostname
        } else {
            &config.ip
        };
        let address = if host.contains(':') && !host.starts_with('[') {
            format!("[{}]:{}", host, config.port)
        } else {
            format!("{}:{}", host, config.port)
        };

        let authentication = if !config.username.is_empty() && !config.password.is_empty() {
            Some(Credentials {
                username: config.username.clone(),
                password: config.password.clone(),
            })
        } else {
            None
        };

        Ok(Self {
            header: RequestHeader {
                version: config.version,
                authentication,
            },
            connector,
            server_name,
            address,
            max_response_size: config.max_response_size,
        })
    }

    pub fn version(&self) -> ProtocolVersion {
        self.header.version
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    /// Performs one request/response exchange and returns the response
    /// message's first batch item payload.
    async fn send_request(
        &self,
        payload: RequestPayload<'_>,
    ) -> Result<super::ttlv::Ttlv, KmipError> {
        let operation = payload.operation();
        let request = build_request(&self.header, &payload).encode()?;
        let request = Zeroizing::new(request);

        let connect = |source| KmipError::Connect {
            server: self.address.clone(),
            source,
        };
        let tcp = TcpStream::connect(&self.address).await.map_err(connect)?;
        let mut stream = self
            .connector
            .connect(self.server_name.clone(), tcp)
            .await
            .map_err(connect)?;

        stream.write_all(&request).await?;
        stream.flush().await?;

        let response = read_message(&mut stream, self.max_response_size).await?;

        if let Err(e) = stream.shutdown().await {
            debug!(error = %e, "KMIP connection shutdown failed");
        }

        let payload = parse_response(&response, operation).map_err(|e| {
            warn!(operation = %operation, server = %self.address, error = %e, "KMIP request failed");
            e
        })?;
        Ok(payload.clone())
    }

    /// Fetches the raw key material of a symmetric key.
    #[instrument(skip(self), fields(server = %self.address, version = %self.header.version))]
    pub async fn get_symmetric_key(&self, key_id: &str) -> Result<Zeroizing<Vec<u8>>, KmipError> {
        let payload = self
            .send_request(RequestPayload::Get {
                unique_identifier: key_id,
            })
            .await?;
        let response = GetResponse::from_payload(&payload)?;
        debug!(key_len = response.key_material.len(), "Fetched symmetric key");
        Ok(response.key_material)
    }

    /// Creates an AES key of `length` bits and returns its identifier.
    #[instrument(skip(self), fields(server = %self.address, version = %self.header.version))]
    pub async fn create_symmetric_key(&self, length: i32) -> Result<String, KmipError> {
        let payload = self.send_request(RequestPayload::Create { length }).await?;
        let response = CreateResponse::from_payload(&payload)?;
        debug!(key_id = %response.unique_identifier, "Created symmetric key");
        Ok(response.unique_identifier)
    }

    /// Encrypts `data` with a key held by the server.
    #[instrument(skip(self, data), fields(server = %self.address, len = data.len()))]
    pub async fn encrypt(&self, key_id: &str, data: &[u8]) -> Result<EncryptResponse, KmipError> {
        let payload = self
            .send_request(RequestPayload::Encrypt {
                unique_identifier: key_id,
                data,
            })
            .await?;
        EncryptResponse::from_payload(&payload)
    }

    /// Decrypts `data` with a key held by the server.
    #[instrument(skip(self, data, iv), fields(server = %self.address, len = data.len()))]
    pub async fn decrypt(
        &self,
        key_id: &str,
        data: &[u8],
        iv: &[u8],
    ) -> Result<DecryptResponse, KmipError> {
        let payload = self
            .send_request(RequestPayload::Decrypt {
                unique_identifier: key_id,
                data,
                iv_counter_nonce: iv,
            })
            .await?;
        DecryptResponse::from_payload(&payload)
    }
}
