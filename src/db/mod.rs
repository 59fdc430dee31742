//! Database related things.

use deadpool_postgres::{Config as PoolConfig, Pool, Runtime};
use rustls::{
    DigitallySignedStruct, SignatureScheme,
    client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier},
    pki_types::{CertificateDer, ServerName, UnixTime},
};
use secrecy::{ExposeSecret, SecretString};
use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
    time::{Duration, Instant},
};
use tokio_postgres::NoTls;

use crate::{http::{self, Response}, prelude::*};


pub(crate) mod cmd;
mod migrations;
mod query;
mod tx;
pub(crate) mod types;
pub(crate) mod util;

#[cfg(test)]
mod tests;

pub(crate) use self::{
    tx::Transaction,
    migrations::{MigrationPlan, migrate},
};


#[derive(Debug, confique::Config)]
pub(crate) struct DbConfig {
    /// The username of the database user.
    #[config(default = "todolist")]
    pub(crate) user: String,

    /// The password of the database user.
    pub(crate) password: SecretString,

    /// The host the database server is running on.
    #[config(default = "127.0.0.1")]
    pub(crate) host: String,

    /// The port the database server is listening on. (Just useful if your
    /// database server is not running on the default PostgreSQL port).
    #[config(default = 5432)]
    pub(crate) port: u16,

    /// The name of the database to use.
    #[config(default = "todolist")]
    pub(crate) database: String,

    /// The TLS mode for the database connection.
    ///
    /// - "on": encryption is required and the server certificate is validated
    ///    against trusted certificates which are loaded from the system's
    ///    native certificate store. If `server_cert` is set, that's also
    ///    loaded and trusted.
    /// - "without-verify-cert": encryption is required, but the server
    ///   certificate is not checked. Allows MITM attacks! Discouraged.
    /// - "off": no encryption. Discouraged even more.
    #[config(default = "on")]
    pub(crate) tls_mode: TlsMode,

    /// Path to the server certificate. This makes sense if you don't want to
    /// install the certificate globally on the system. Has to be a PEM encoded
    /// file containing one or more X509 certificates.
    pub(crate) server_cert: Option<PathBuf>,

    /// Maximum number of connections in the pool.
    #[config(default = 16)]
    pub(crate) max_connections: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub(crate) enum TlsMode {
    Off,
    On,
    WithoutVerifyCert,
}

impl DbConfig {
    pub(crate) fn validate(&self) -> Result<()> {
        if self.server_cert.is_some() && self.tls_mode != TlsMode::On {
            bail!(r#"`db.server_cert` is set, but TLS mode is NOT "on", which makes no sense"#);
        }

        Ok(())
    }
}

/// Type alias for an owned DB connection.
pub(crate) type DbConnection = deadpool::managed::Object<deadpool_postgres::Manager>;


/// Creates a new database connection pool.
pub(crate) async fn create_pool(config: &DbConfig) -> Result<Pool> {
    let mut pool_config = PoolConfig {
        user: Some(config.user.clone()),
        password: Some(config.password.expose_secret().to_owned()),
        host: Some(config.host.clone()),
        port: Some(config.port),
        dbname: Some(config.database.clone()),
        ssl_mode: Some(if config.tls_mode == TlsMode::Off {
            deadpool_postgres::SslMode::Disable
        } else {
            deadpool_postgres::SslMode::Require
        }),
        application_name: Some("todolist".into()),
        .. PoolConfig::default()
    };
    pool_config.pool = Some(deadpool_postgres::PoolConfig::new(config.max_connections));

    debug!(
        "Connecting to 'postgresql://{}:*****@{}:{}/{}' (TLS: {:?})",
        config.user,
        config.host,
        config.port,
        config.database,
        config.tls_mode,
    );

    // Handle TLS and create pool.
    let pool = if config.tls_mode == TlsMode::Off {
        pool_config.create_pool(Some(Runtime::Tokio1), NoTls)?
    } else {
        // Prepare certificate store. If we do not verify the certificate, it's
        // just empty. Otherwise we load system-wide root CAs.
        let mut root_certs = rustls::RootCertStore::empty();
        if config.tls_mode == TlsMode::On {
            let system_certs = rustls_native_certs::load_native_certs();
            for e in &system_certs.errors {
                warn!("Error loading system-wide certificate: {e}");
            }
            let (added, ignored) = root_certs.add_parsable_certificates(system_certs.certs);
            debug!("Loaded {added} system-wide certificates ({ignored} ignored)");

            // If a custom cert is given, we try to load it.
            if let Some(cert_path) = &config.server_cert {
                let custom_count = load_pem_file(cert_path, &mut root_certs)
                    .with_context(|| format!("failed to load '{}'", cert_path.display()))?;
                debug!("Loaded {} certificates from '{}'", custom_count, cert_path.display());
            }
        }

        let provider = Arc::new(rustls::crypto::ring::default_provider());
        let mut tls_config = rustls::ClientConfig::builder_with_provider(provider)
            .with_safe_default_protocol_versions()
            .context("failed to configure TLS protocol versions")?
            .with_root_certificates(root_certs)
            .with_no_client_auth();

        // Disable certificate validation if requested.
        if config.tls_mode == TlsMode::WithoutVerifyCert {
            tls_config.dangerous().set_certificate_verifier(Arc::new(DangerousAlwaysAcceptCerts));
        }

        let tls = tokio_postgres_rustls::MakeRustlsConnect::new(tls_config);
        pool_config.create_pool(Some(Runtime::Tokio1), tls)?
    };
    info!("Created database pool");


    // Test the connection by executing a simple query.
    let client = pool.get().await
        .context("failed to get DB connection")?;
    client.execute("select 1", &[]).await
        .context("failed to execute DB test query")?;
    debug!("Successfully tested database connection with test query");


    // Make sure the database uses UTF8 encoding. There is no good reason to use
    // anything else.
    let encoding = client.query_one("show server_encoding;", &[]).await
        .context("failed to check server encoding")?
        .get::<_, String>(0);

    if encoding != "UTF8" {
        bail!("Database encoding is not UTF8, but we require UTF8!");
    }

    Ok(pool)
}

/// Checks out one DB connection from the pool or returns `Err` with a "service
/// unavailable" response.
pub(crate) async fn get_conn_or_service_unavailable(pool: &Pool) -> Result<DbConnection, Response> {
    let before = Instant::now();
    let connection = pool.get().await.map_err(|e| {
        error!("Failed to obtain DB connection for API request: {}", e);
        http::response::service_unavailable()
    })?;

    let acquire_conn_time = before.elapsed();
    if acquire_conn_time > Duration::from_millis(5) {
        warn!("Acquiring DB connection from pool took {:.2?}", acquire_conn_time);
    }

    Ok(connection)
}


/// Loads the PEM file at `path` and adds all X509 certificates in it to
/// `root_certs`. Returns an error if a non-x509 item is found. Returns the
/// number of certs added to `root_certs`.
fn load_pem_file(path: &Path, root_certs: &mut rustls::RootCertStore) -> Result<usize> {
    let file = fs::read(path).context("could not read file")?;

    let mut count = 0;
    for item in rustls_pemfile::read_all(&mut &*file) {
        match item.context("could not parse file as PEM")? {
            rustls_pemfile::Item::X509Certificate(cert) => {
                root_certs.add(cert).context("failed to load X509 certificate")?;
                count += 1;
            }
            _ => bail!("found unexpected item, expected X509 certificate"),
        }
    }

    Ok(count)
}

/// Dummy certificate verifier, that blindly always says "it's valid". This is
/// used in the "don't check certificates" mode.
#[derive(Debug)]
pub(crate) struct DangerousAlwaysAcceptCerts;

impl ServerCertVerifier for DangerousAlwaysAcceptCerts {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        rustls::crypto::ring::default_provider()
            .signature_verification_algorithms
            .supported_schemes()
    }
}
