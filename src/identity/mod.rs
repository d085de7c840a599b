//! # Host Identity
//!
//! A host identity binds an ed25519 signing key to a (role, host uuid)
//! pair. It is issued when the host joins the cluster and stored in the
//! data directory as two files:
//!
//! - `<host_uuid>.<role>.key`: base64 ed25519 secret key
//! - `<host_uuid>.<role>.cert`: JSON certificate naming the host, the
//!   role and the public key
//!
//! The signing key only lives for the duration of connection
//! establishment; `HostIdentity` is consumed by the client handshake.

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD};
use base64::Engine;
use chrono::{DateTime, Utc};
use ed25519_dalek::{Signature, Signer, SigningKey, VerifyingKey};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use thiserror::Error;

/// Result type for identity operations
pub type IdentityResult<T> = Result<T, IdentityError>;

/// Identity loading errors
#[derive(Debug, Error)]
pub enum IdentityError {
    /// Identity files absent: the host never joined the cluster
    #[error(
        "no {} identity for host {} in {}: missing {}; this host has not joined the cluster",
        .role, .host_uuid, .data_dir.display(), .missing.display()
    )]
    NotFound {
        role: Role,
        host_uuid: String,
        data_dir: PathBuf,
        missing: PathBuf,
    },

    /// Identity files present but unusable
    #[error("identity at {} is corrupt: {}", .path.display(), .reason)]
    Corrupt { path: PathBuf, reason: String },

    /// Writing identity material failed
    #[error("failed to write {}: {}", .path.display(), .source)]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Role a host identity is issued for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Administrative access, used by aeroctl
    Admin,
    /// Regular cluster node
    Node,
    /// Control-plane (auth) server
    Auth,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Node => "node",
            Role::Auth => "auth",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Role::Admin),
            "node" => Ok(Role::Node),
            "auth" => Ok(Role::Auth),
            other => Err(format!("unknown role '{}'", other)),
        }
    }
}

/// Key under which an identity is stored
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityId {
    pub role: Role,
    pub host_uuid: String,
}

impl IdentityId {
    pub fn new(role: Role, host_uuid: impl Into<String>) -> Self {
        Self {
            role,
            host_uuid: host_uuid.into(),
        }
    }

    pub fn key_path(&self, data_dir: &Path) -> PathBuf {
        data_dir.join(format!("{}.{}.key", self.host_uuid, self.role))
    }

    pub fn cert_path(&self, data_dir: &Path) -> PathBuf {
        data_dir.join(format!("{}.{}.cert", self.host_uuid, self.role))
    }
}

/// Certificate stored next to the key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityCert {
    pub host_uuid: String,
    pub role: Role,
    /// Base64 ed25519 public key
    pub public_key: String,
    pub issued_at: DateTime<Utc>,
}

/// A loaded host identity
pub struct HostIdentity {
    id: IdentityId,
    cert: IdentityCert,
    signer: SigningKey,
}

impl fmt::Debug for HostIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostIdentity")
            .field("id", &self.id)
            .field("cert", &self.cert)
            .finish_non_exhaustive()
    }
}

impl HostIdentity {
    pub fn id(&self) -> &IdentityId {
        &self.id
    }

    pub fn cert(&self) -> &IdentityCert {
        &self.cert
    }

    pub fn public_key(&self) -> VerifyingKey {
        self.signer.verifying_key()
    }

    /// `SHA256:` fingerprint of the public key
    pub fn fingerprint(&self) -> String {
        fingerprint(self.public_key().as_bytes())
    }

    /// Sign `message` with the host key
    pub fn sign(&self, message: &[u8]) -> Signature {
        self.signer.sign(message)
    }
}

/// Load the identity stored under `id` in `data_dir`
pub fn read_identity(data_dir: &Path, id: &IdentityId) -> IdentityResult<HostIdentity> {
    let key_path = id.key_path(data_dir);
    let cert_path = id.cert_path(data_dir);

    let key_text = read_identity_file(data_dir, id, &key_path)?;
    let cert_text = read_identity_file(data_dir, id, &cert_path)?;

    let signer = decode_signing_key(key_text.trim()).map_err(|reason| IdentityError::Corrupt {
        path: key_path.clone(),
        reason,
    })?;

    let cert: IdentityCert =
        serde_json::from_str(&cert_text).map_err(|e| IdentityError::Corrupt {
            path: cert_path.clone(),
            reason: format!("invalid certificate: {}", e),
        })?;

    if cert.host_uuid != id.host_uuid || cert.role != id.role {
        return Err(IdentityError::Corrupt {
            path: cert_path,
            reason: format!(
                "certificate is for {} {}, expected {} {}",
                cert.role, cert.host_uuid, id.role, id.host_uuid
            ),
        });
    }

    let cert_key = decode_public_key(&cert.public_key).map_err(|reason| IdentityError::Corrupt {
        path: cert_path.clone(),
        reason,
    })?;
    let signer_key = signer.verifying_key();
    let matches: bool = cert_key
        .as_bytes()
        .as_slice()
        .ct_eq(signer_key.as_bytes().as_slice())
        .into();
    if !matches {
        return Err(IdentityError::Corrupt {
            path: cert_path,
            reason: "certificate public key does not match the private key".to_string(),
        });
    }

    Ok(HostIdentity {
        id: id.clone(),
        cert,
        signer,
    })
}

fn read_identity_file(data_dir: &Path, id: &IdentityId, path: &Path) -> IdentityResult<String> {
    fs::read_to_string(path).map_err(|e| {
        if e.kind() == io::ErrorKind::NotFound {
            IdentityError::NotFound {
                role: id.role,
                host_uuid: id.host_uuid.clone(),
                data_dir: data_dir.to_path_buf(),
                missing: path.to_path_buf(),
            }
        } else {
            IdentityError::Corrupt {
                path: path.to_path_buf(),
                reason: format!("unreadable: {}", e),
            }
        }
    })
}

/// Store `signer` as the identity `id` in `data_dir`
pub fn write_identity(
    data_dir: &Path,
    id: &IdentityId,
    signer: SigningKey,
) -> IdentityResult<HostIdentity> {
    let cert = IdentityCert {
        host_uuid: id.host_uuid.clone(),
        role: id.role,
        public_key: encode_public_key(&signer.verifying_key()),
        issued_at: Utc::now(),
    };

    fs::create_dir_all(data_dir).map_err(|source| IdentityError::Write {
        path: data_dir.to_path_buf(),
        source,
    })?;
    write_private(&id.key_path(data_dir), &encode_signing_key(&signer))?;

    let cert_path = id.cert_path(data_dir);
    let cert_json = serde_json::to_string_pretty(&cert).map_err(|e| IdentityError::Write {
        path: cert_path.clone(),
        source: io::Error::new(io::ErrorKind::InvalidData, e),
    })?;
    fs::write(&cert_path, cert_json).map_err(|source| IdentityError::Write {
        path: cert_path,
        source,
    })?;

    Ok(HostIdentity {
        id: id.clone(),
        cert,
        signer,
    })
}

/// Write secret material readable by the owner only
pub fn write_private(path: &Path, contents: &str) -> IdentityResult<()> {
    fs::write(path, contents).map_err(|source| IdentityError::Write {
        path: path.to_path_buf(),
        source,
    })?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o600)).map_err(|source| {
            IdentityError::Write {
                path: path.to_path_buf(),
                source,
            }
        })?;
    }

    Ok(())
}

/// Generate a fresh ed25519 signing key
pub fn generate_signing_key() -> SigningKey {
    let mut secret = [0u8; 32];
    OsRng.fill_bytes(&mut secret);
    SigningKey::from_bytes(&secret)
}

pub fn encode_signing_key(key: &SigningKey) -> String {
    STANDARD.encode(key.to_bytes())
}

pub fn decode_signing_key(encoded: &str) -> Result<SigningKey, String> {
    let bytes = STANDARD
        .decode(encoded)
        .map_err(|e| format!("private key is not valid base64: {}", e))?;
    let secret: [u8; 32] = bytes
        .as_slice()
        .try_into()
        .map_err(|_| format!("private key must be 32 bytes, got {}", bytes.len()))?;
    Ok(SigningKey::from_bytes(&secret))
}

pub fn encode_public_key(key: &VerifyingKey) -> String {
    STANDARD.encode(key.as_bytes())
}

pub fn decode_public_key(encoded: &str) -> Result<VerifyingKey, String> {
    let bytes = STANDARD
        .decode(encoded.trim())
        .map_err(|e| format!("public key is not valid base64: {}", e))?;
    let raw: [u8; 32] = bytes
        .as_slice()
        .try_into()
        .map_err(|_| format!("public key must be 32 bytes, got {}", bytes.len()))?;
    VerifyingKey::from_bytes(&raw).map_err(|e| format!("invalid public key: {}", e))
}

/// `SHA256:<base64>` fingerprint of raw key bytes
pub fn fingerprint(key_bytes: &[u8]) -> String {
    let digest = Sha256::digest(key_bytes);
    format!("SHA256:{}", STANDARD_NO_PAD.encode(digest))
}
