//! On-disk scope state: one file per scope, named by its id, in Java
//! `DataOutputStream` layout (big-endian, modified UTF-8 strings).
//!
//! ```text
//! i64 id | utf name | utf location ("" = none) | i64 parent (-1 = none)
//! i64 bundle id ... | i64 -1
//! i32 n | n × (utf type, utf namespace, utf filter)     exports
//! i32 n | n × (utf type, utf namespace, utf filter)     imports
//! ```

use crate::error::{Result, ScopeError};
use crate::policy::{PolicyType, SharePolicies, SharePolicy};
use crate::scope::{Scope, ScopeId};
use aries_api::BundleId;
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use ristretto_classfile::mutf8;
use serde::Serialize;
use std::fs;
use std::io::{Cursor, Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const NONE: i64 = -1;

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct PolicyRecord {
    pub policy_type: PolicyType,
    pub namespace: String,
    pub filter: String,
}

/// Everything about a scope that survives a restart.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct ScopeRecord {
    pub id: ScopeId,
    pub name: String,
    pub location: Option<String>,
    pub parent: Option<ScopeId>,
    pub bundles: Vec<BundleId>,
    pub exports: Vec<PolicyRecord>,
    pub imports: Vec<PolicyRecord>,
}

impl ScopeRecord {
    pub fn of(scope: &Scope) -> Self {
        let state = scope.state.read();
        let records = |t: PolicyType| {
            state
                .policies
                .iter(t)
                .map(|p| PolicyRecord {
                    policy_type: t,
                    namespace: p.namespace().to_string(),
                    filter: p.filter_source().to_string(),
                })
                .collect()
        };
        Self {
            id: scope.id(),
            name: scope.name().to_string(),
            location: scope.location().map(str::to_string),
            parent: scope.parent(),
            bundles: state.bundles.iter().copied().collect(),
            exports: records(PolicyType::Export),
            imports: records(PolicyType::Import),
        }
    }

    /// Re-parse the recorded filters.
    pub fn share_policies(&self) -> Result<SharePolicies> {
        let mut policies = SharePolicies::new();
        for record in self.exports.iter().chain(&self.imports) {
            policies.add(SharePolicy::new(
                record.policy_type,
                record.namespace.clone(),
                &record.filter,
            )?);
        }
        Ok(policies)
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        out.write_i64::<BigEndian>(self.id.0 as i64)?;
        write_utf(&mut out, &self.name)?;
        write_utf(&mut out, self.location.as_deref().unwrap_or(""))?;
        out.write_i64::<BigEndian>(self.parent.map_or(NONE, |p| p.0 as i64))?;
        for bundle in &self.bundles {
            out.write_i64::<BigEndian>(bundle.0 as i64)?;
        }
        out.write_i64::<BigEndian>(NONE)?;
        for policies in [&self.exports, &self.imports] {
            out.write_i32::<BigEndian>(policies.len() as i32)?;
            for p in policies {
                write_utf(&mut out, p.policy_type.as_str())?;
                write_utf(&mut out, &p.namespace)?;
                write_utf(&mut out, &p.filter)?;
            }
        }
        Ok(out)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let mut r = Cursor::new(bytes);
        let id = read_id(&mut r)?;
        let name = read_utf(&mut r)?;
        let location = Some(read_utf(&mut r)?).filter(|l| !l.is_empty());
        let parent = match r.read_i64::<BigEndian>()? {
            NONE => None,
            p if p >= 0 => Some(ScopeId(p as u64)),
            p => return Err(ScopeError::Format(format!("invalid parent id {p}"))),
        };
        let mut bundles = Vec::new();
        loop {
            match r.read_i64::<BigEndian>()? {
                NONE => break,
                b if b >= 0 => bundles.push(BundleId(b as u64)),
                b => return Err(ScopeError::Format(format!("invalid bundle id {b}"))),
            }
        }
        let exports = read_policies(&mut r)?;
        let imports = read_policies(&mut r)?;
        if r.position() as usize != bytes.len() {
            return Err(ScopeError::Format("trailing data after scope record".into()));
        }
        Ok(Self {
            id,
            name,
            location,
            parent,
            bundles,
            exports,
            imports,
        })
    }
}

fn read_id(r: &mut Cursor<&[u8]>) -> Result<ScopeId> {
    let id = r.read_i64::<BigEndian>()?;
    if id < 0 {
        return Err(ScopeError::Format(format!("invalid scope id {id}")));
    }
    Ok(ScopeId(id as u64))
}

/// Smallest encoding of one policy: three empty strings.
const MIN_POLICY_LEN: u64 = 6;

fn remaining(r: &Cursor<&[u8]>) -> u64 {
    (r.get_ref().len() as u64).saturating_sub(r.position())
}

fn read_policies(r: &mut Cursor<&[u8]>) -> Result<Vec<PolicyRecord>> {
    let count = r.read_i32::<BigEndian>()?;
    if count < 0 {
        return Err(ScopeError::Format(format!("negative policy count {count}")));
    }
    if count as u64 * MIN_POLICY_LEN > remaining(r) {
        return Err(ScopeError::Format(format!(
            "policy count {count} exceeds the {} remaining bytes",
            remaining(r)
        )));
    }
    let mut policies = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let kind = read_utf(r)?;
        let policy_type = PolicyType::parse(&kind)
            .ok_or_else(|| ScopeError::Format(format!("unknown share policy type '{kind}'")))?;
        policies.push(PolicyRecord {
            policy_type,
            namespace: read_utf(r)?,
            filter: read_utf(r)?,
        });
    }
    Ok(policies)
}

/// `DataOutputStream.writeUTF`: u16 length, then modified UTF-8.
fn write_utf(out: &mut impl Write, s: &str) -> Result<()> {
    let bytes = mutf8::to_bytes(s)?;
    let len = u16::try_from(bytes.len()).map_err(|_| {
        ScopeError::Format(format!("string of {} encoded bytes is too long", bytes.len()))
    })?;
    out.write_u16::<BigEndian>(len)?;
    out.write_all(&bytes)?;
    Ok(())
}

fn read_utf(r: &mut Cursor<&[u8]>) -> Result<String> {
    let len = r.read_u16::<BigEndian>()?;
    if u64::from(len) > remaining(r) {
        return Err(ScopeError::Format(format!(
            "string of {len} bytes runs past the end of the record"
        )));
    }
    let mut bytes = vec![0u8; usize::from(len)];
    r.read_exact(&mut bytes)?;
    Ok(mutf8::from_bytes(&bytes)?)
}

/// Directory of scope files.
#[derive(Debug, Clone)]
pub struct ScopeStore {
    dir: PathBuf,
}

impl ScopeStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, id: ScopeId) -> PathBuf {
        self.dir.join(id.0.to_string())
    }

    pub fn write(&self, record: &ScopeRecord) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        let bytes = record.encode()?;
        let path = self.path(record.id);
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, bytes)?;
        fs::rename(&tmp, &path)?;
        debug!("Persisted scope {} to {}", record.id, path.display());
        Ok(())
    }

    pub fn remove(&self, id: ScopeId) -> Result<()> {
        match fs::remove_file(self.path(id)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Every readable record in the directory, by id. A missing directory
    /// holds no scopes. Files whose names are not scope ids are ignored;
    /// files that do not decode are logged and skipped.
    pub fn load_all(&self) -> Result<Vec<ScopeRecord>> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut records = Vec::new();
        for entry in entries {
            let entry = entry?;
            let is_id = entry
                .file_name()
                .to_str()
                .is_some_and(|n| n.parse::<u64>().is_ok());
            if !is_id || !entry.file_type()?.is_file() {
                continue;
            }
            let path = entry.path();
            match fs::read(&path).map_err(ScopeError::from).and_then(|b| ScopeRecord::decode(&b)) {
                Ok(record) => records.push(record),
                Err(e) => warn!("Skipping unreadable scope file {}: {}", path.display(), e),
            }
        }
        records.sort_by_key(|r| r.id);
        Ok(records)
    }
}
