//! Development PKI for the QUIC transport: a local CA plus a server
//! certificate pair, written as PEM files that the endpoints load back.

use rcgen::{
    BasicConstraints, CertificateParams, DistinguishedName, DnType, ExtendedKeyUsagePurpose, IsCa,
    KeyPair, KeyUsagePurpose, SanType,
};
use rustls::RootCertStore;
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use std::io::{Error, ErrorKind, Result};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::path::{Path, PathBuf};

const VALIDITY_DAYS: i64 = 365;

/// File names produced in the output directory.
pub const CA_KEY_FILE: &str = "ca.key";
pub const CA_CERT_FILE: &str = "ca.crt";
pub const SERVER_KEY_FILE: &str = "server.key";
pub const SERVER_CERT_FILE: &str = "server.crt";

fn rcgen_err(e: rcgen::Error) -> Error {
    Error::new(ErrorKind::Other, format!("Certificate generation error: {}", e))
}

fn validity_window() -> (time::OffsetDateTime, time::OffsetDateTime) {
    let now = time::OffsetDateTime::now_utc();
    (now, now + time::Duration::days(VALIDITY_DAYS))
}

fn ca_params() -> CertificateParams {
    let mut params = CertificateParams::default();
    let mut dn = DistinguishedName::new();
    dn.push(DnType::CommonName, "emberview development CA");
    params.distinguished_name = dn;
    params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
    params.key_usages = vec![
        KeyUsagePurpose::KeyCertSign,
        KeyUsagePurpose::CrlSign,
        KeyUsagePurpose::DigitalSignature,
    ];
    let (not_before, not_after) = validity_window();
    params.not_before = not_before;
    params.not_after = not_after;
    params
}

fn server_params(domain: &str) -> std::result::Result<CertificateParams, rcgen::Error> {
    let mut params =
        CertificateParams::new(vec![domain.to_string(), format!("*.{}", domain)])?;
    params
        .subject_alt_names
        .push(SanType::IpAddress(IpAddr::V4(Ipv4Addr::LOCALHOST)));
    params
        .subject_alt_names
        .push(SanType::IpAddress(IpAddr::V6(Ipv6Addr::LOCALHOST)));

    let mut dn = DistinguishedName::new();
    dn.push(DnType::CommonName, domain);
    params.distinguished_name = dn;
    params.use_authority_key_identifier_extension = true;
    params.key_usages = vec![KeyUsagePurpose::DigitalSignature];
    params.extended_key_usages = vec![ExtendedKeyUsagePurpose::ServerAuth];
    let (not_before, not_after) = validity_window();
    params.not_before = not_before;
    params.not_after = not_after;
    Ok(params)
}

/// Generate `ca.key`, `ca.crt`, `server.key` and `server.crt` in
/// `output_dir`, creating the directory if needed. Existing output is
/// overwritten; stale `.csr`/`.cnf`/`.srl` droppings from an external
/// OpenSSL flow are removed. Returns the paths of the four files.
pub fn generate<P: AsRef<Path>>(output_dir: P, domain: &str) -> Result<Vec<PathBuf>> {
    let output_dir = output_dir.as_ref();
    std::fs::create_dir_all(output_dir)?;

    let ca_key = KeyPair::generate().map_err(rcgen_err)?;
    let ca_cert = ca_params().self_signed(&ca_key).map_err(rcgen_err)?;

    let server_key = KeyPair::generate().map_err(rcgen_err)?;
    let server_cert = server_params(domain)
        .map_err(rcgen_err)?
        .signed_by(&server_key, &ca_cert, &ca_key)
        .map_err(rcgen_err)?;

    let files = [
        (CA_KEY_FILE, ca_key.serialize_pem()),
        (CA_CERT_FILE, ca_cert.pem()),
        (SERVER_KEY_FILE, server_key.serialize_pem()),
        (SERVER_CERT_FILE, server_cert.pem()),
    ];

    let mut written = Vec::with_capacity(files.len());
    for (name, pem) in files {
        let path = output_dir.join(name);
        std::fs::write(&path, pem)?;
        written.push(path);
    }

    remove_stale_artifacts(output_dir)?;

    tracing::info!(dir = %output_dir.display(), domain, "generated CA and server certificates");
    Ok(written)
}

fn remove_stale_artifacts(dir: &Path) -> Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        let stale = matches!(
            path.extension().and_then(|e| e.to_str()),
            Some("csr") | Some("cnf") | Some("srl")
        );
        if stale {
            std::fs::remove_file(&path)?;
        }
    }
    Ok(())
}

/// Parse `server.crt` and `server.key` for the server endpoint.
pub fn load_server_credentials<P: AsRef<Path>>(
    certs_dir: P,
) -> Result<(Vec<CertificateDer<'static>>, PrivateKeyDer<'static>)> {
    let certs_dir = certs_dir.as_ref();
    let cert_pem = std::fs::read(certs_dir.join(SERVER_CERT_FILE))?;
    let key_pem = std::fs::read(certs_dir.join(SERVER_KEY_FILE))?;

    let certs = rustls_pemfile::certs(&mut cert_pem.as_slice())
        .collect::<std::result::Result<Vec<_>, _>>()?;
    if certs.is_empty() {
        return Err(Error::new(
            ErrorKind::InvalidData,
            "No certificate found in server.crt",
        ));
    }

    let key = rustls_pemfile::private_key(&mut key_pem.as_slice())?
        .ok_or_else(|| Error::new(ErrorKind::InvalidData, "No private key found in server.key"))?;

    Ok((certs, key))
}

/// Build a root store trusting exactly the generated `ca.crt`.
pub fn load_root_store<P: AsRef<Path>>(certs_dir: P) -> Result<RootCertStore> {
    let ca_pem = std::fs::read(certs_dir.as_ref().join(CA_CERT_FILE))?;
    let ca_certs = rustls_pemfile::certs(&mut ca_pem.as_slice())
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let mut roots = RootCertStore::empty();
    for cert in ca_certs {
        roots
            .add(cert)
            .map_err(|e| Error::new(ErrorKind::InvalidData, format!("Bad CA certificate: {}", e)))?;
    }
    if roots.is_empty() {
        return Err(Error::new(
            ErrorKind::InvalidData,
            "No CA certificate found in ca.crt",
        ));
    }
    Ok(roots)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    static DIR_COUNTER: AtomicU32 = AtomicU32::new(0);

    fn scratch_dir() -> PathBuf {
        let id = DIR_COUNTER.fetch_add(1, Ordering::Relaxed);
        std::env::temp_dir().join(format!(
            "emberview-certs-test-{}-{}",
            std::process::id(),
            id
        ))
    }

    #[test]
    fn test_generate_produces_expected_files() {
        let dir = scratch_dir();
        let written = generate(&dir, "localhost").unwrap();

        assert_eq!(written.len(), 4);
        for name in [CA_KEY_FILE, CA_CERT_FILE, SERVER_KEY_FILE, SERVER_CERT_FILE] {
            assert!(dir.join(name).is_file(), "missing {}", name);
        }

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_generate_twice_overwrites() {
        let dir = scratch_dir();
        generate(&dir, "localhost").unwrap();
        let first = std::fs::read(dir.join(SERVER_CERT_FILE)).unwrap();
        generate(&dir, "localhost").unwrap();
        let second = std::fs::read(dir.join(SERVER_CERT_FILE)).unwrap();

        // Fresh keys every run, so the certificate must differ.
        assert_ne!(first, second);

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_generate_removes_stale_artifacts() {
        let dir = scratch_dir();
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("server.csr"), b"stale").unwrap();
        std::fs::write(dir.join("san.cnf"), b"stale").unwrap();
        std::fs::write(dir.join("ca.srl"), b"stale").unwrap();

        generate(&dir, "localhost").unwrap();

        let leftovers: Vec<_> = std::fs::read_dir(&dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .filter(|n| n.ends_with(".csr") || n.ends_with(".cnf") || n.ends_with(".srl"))
            .collect();
        assert!(leftovers.is_empty(), "leftovers: {:?}", leftovers);

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_server_san_list() {
        let params = server_params("example.com").unwrap();
        let expected = [
            SanType::DnsName("example.com".try_into().unwrap()),
            SanType::DnsName("*.example.com".try_into().unwrap()),
            SanType::IpAddress(IpAddr::V4(Ipv4Addr::LOCALHOST)),
            SanType::IpAddress(IpAddr::V6(Ipv6Addr::LOCALHOST)),
        ];
        assert_eq!(params.subject_alt_names.len(), expected.len());
        for san in &expected {
            assert!(
                params.subject_alt_names.contains(san),
                "missing SAN {:?}",
                san
            );
        }
    }

    #[test]
    fn test_generated_pems_parse_back() {
        let dir = scratch_dir();
        generate(&dir, "localhost").unwrap();

        let (chain, _key) = load_server_credentials(&dir).unwrap();
        assert_eq!(chain.len(), 1);

        let roots = load_root_store(&dir).unwrap();
        assert_eq!(roots.len(), 1);

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_load_from_missing_dir_fails() {
        let dir = scratch_dir();
        assert!(load_server_credentials(&dir).is_err());
        assert!(load_root_store(&dir).is_err());
    }
}
