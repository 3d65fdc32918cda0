// request.rs — AccessRequest lifecycle and persistence.
//
// A request is created `pending` and transitions exactly once, to either
// `approved` or `denied`. Terminal thereafter: re-requesting means a new
// AccessRequest. Each request is stored as a JSON file
// `<store_dir>/<request_id>.json`; transitions run under the store's mutex
// so two racing deciders cannot both win.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use concord_access::{AccessError, PrincipalKind, Tier};

/// Lifecycle state of an access request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Pending,
    Approved,
    Denied,
}

impl std::fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RequestStatus::Pending => write!(f, "pending"),
            RequestStatus::Approved => write!(f, "approved"),
            RequestStatus::Denied => write!(f, "denied"),
        }
    }
}

/// A principal's request for access it does not currently hold.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessRequest {
    pub request_id: Uuid,
    pub intent_id: Uuid,
    pub principal_id: String,
    pub principal_kind: PrincipalKind,
    pub requested_tier: Tier,
    pub justification: String,
    pub status: RequestStatus,

    /// Who resolved the request. `None` while pending.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decided_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decided_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decision_justification: Option<String>,

    /// The tier actually granted on approval — may be a downgrade from
    /// `requested_tier`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub granted_tier: Option<Tier>,

    pub created_at: DateTime<Utc>,
}

impl AccessRequest {
    /// Create a new pending request.
    pub fn new(
        intent_id: Uuid,
        principal_id: impl Into<String>,
        principal_kind: PrincipalKind,
        requested_tier: Tier,
        justification: impl Into<String>,
    ) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            intent_id,
            principal_id: principal_id.into(),
            principal_kind,
            requested_tier,
            justification: justification.into(),
            status: RequestStatus::Pending,
            decided_by: None,
            decided_at: None,
            decision_justification: None,
            granted_tier: None,
            created_at: Utc::now(),
        }
    }

    /// Transition to `approved`. Fails with `TerminalState` unless pending.
    pub fn approve(
        &mut self,
        decided_by: impl Into<String>,
        granted_tier: Tier,
        justification: Option<String>,
    ) -> Result<(), AccessError> {
        self.ensure_pending()?;
        self.status = RequestStatus::Approved;
        self.decided_by = Some(decided_by.into());
        self.decided_at = Some(Utc::now());
        self.decision_justification = justification;
        self.granted_tier = Some(granted_tier);
        Ok(())
    }

    /// Transition to `denied`. Fails with `TerminalState` unless pending.
    pub fn deny(
        &mut self,
        decided_by: impl Into<String>,
        justification: Option<String>,
    ) -> Result<(), AccessError> {
        self.ensure_pending()?;
        self.status = RequestStatus::Denied;
        self.decided_by = Some(decided_by.into());
        self.decided_at = Some(Utc::now());
        self.decision_justification = justification;
        Ok(())
    }

    fn ensure_pending(&self) -> Result<(), AccessError> {
        if self.status != RequestStatus::Pending {
            return Err(AccessError::TerminalState {
                request_id: self.request_id,
                status: self.status.to_string(),
            });
        }
        Ok(())
    }
}

/// Persistent store for access requests, one JSON file per request.
pub struct RequestStore {
    store_dir: PathBuf,
    /// Serializes transitions so a request resolves exactly once.
    lock: Mutex<()>,
}

impl RequestStore {
    /// Create a store backed by the given directory.
    pub fn new(store_dir: impl AsRef<Path>) -> Result<Self, AccessError> {
        let store_dir = store_dir.as_ref().to_path_buf();
        fs::create_dir_all(&store_dir).map_err(|source| AccessError::Io {
            path: store_dir.display().to_string(),
            source,
        })?;
        Ok(Self {
            store_dir,
            lock: Mutex::new(()),
        })
    }

    /// Save a request (creates or overwrites). Written via temp file +
    /// rename so a concurrent reader sees the old record or the new one,
    /// never a torn write.
    pub fn save(&self, request: &AccessRequest) -> Result<(), AccessError> {
        let path = self.request_file(request.request_id);
        let tmp = path.with_extension("json.tmp");
        let json = serde_json::to_string_pretty(request)?;
        fs::write(&tmp, json).map_err(|source| AccessError::Io {
            path: tmp.display().to_string(),
            source,
        })?;
        fs::rename(&tmp, &path).map_err(|source| AccessError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Ok(())
    }

    /// Get a request by id.
    pub fn get(&self, request_id: Uuid) -> Result<Option<AccessRequest>, AccessError> {
        let path = self.request_file(request_id);
        if !path.exists() {
            return Ok(None);
        }
        let json = fs::read_to_string(&path).map_err(|source| AccessError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Ok(Some(serde_json::from_str(&json)?))
    }

    /// Apply a transition to a stored request under the store lock.
    ///
    /// The closure runs on the freshly loaded record; whatever terminal-state
    /// check it performs is therefore race-free.
    pub fn update<F>(&self, request_id: Uuid, f: F) -> Result<AccessRequest, AccessError>
    where
        F: FnOnce(&mut AccessRequest) -> Result<(), AccessError>,
    {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut request = self
            .get(request_id)?
            .ok_or(AccessError::RequestNotFound(request_id))?;
        f(&mut request)?;
        self.save(&request)?;
        Ok(request)
    }

    /// All requests for an intent, oldest first.
    pub fn list_for_intent(&self, intent_id: Uuid) -> Result<Vec<AccessRequest>, AccessError> {
        let mut requests: Vec<AccessRequest> = self
            .list_all()?
            .into_iter()
            .filter(|r| r.intent_id == intent_id)
            .collect();
        requests.sort_by_key(|r| r.created_at);
        Ok(requests)
    }

    /// All pending requests, oldest first. Arbitration queue view.
    pub fn list_pending(&self) -> Result<Vec<AccessRequest>, AccessError> {
        let mut requests: Vec<AccessRequest> = self
            .list_all()?
            .into_iter()
            .filter(|r| r.status == RequestStatus::Pending)
            .collect();
        requests.sort_by_key(|r| r.created_at);
        Ok(requests)
    }

    fn list_all(&self) -> Result<Vec<AccessRequest>, AccessError> {
        let entries = fs::read_dir(&self.store_dir).map_err(|source| AccessError::Io {
            path: self.store_dir.display().to_string(),
            source,
        })?;
        let mut requests = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| AccessError::Io {
                path: self.store_dir.display().to_string(),
                source,
            })?;
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                let json = fs::read_to_string(&path).map_err(|source| AccessError::Io {
                    path: path.display().to_string(),
                    source,
                })?;
                if let Ok(request) = serde_json::from_str::<AccessRequest>(&json) {
                    requests.push(request);
                }
            }
        }
        Ok(requests)
    }

    fn request_file(&self, request_id: Uuid) -> PathBuf {
        self.store_dir.join(format!("{}.json", request_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn request(intent: Uuid) -> AccessRequest {
        AccessRequest::new(
            intent,
            "stranger",
            PrincipalKind::Agent,
            Tier::Write,
            "need to contribute",
        )
    }

    #[test]
    fn new_request_is_pending() {
        let r = request(Uuid::new_v4());
        assert_eq!(r.status, RequestStatus::Pending);
        assert!(r.decided_by.is_none());
        assert!(r.granted_tier.is_none());
    }

    #[test]
    fn approve_records_decision_metadata() {
        let mut r = request(Uuid::new_v4());
        r.approve("orchestrator", Tier::Read, Some("downgraded".to_string()))
            .unwrap();

        assert_eq!(r.status, RequestStatus::Approved);
        assert_eq!(r.decided_by.as_deref(), Some("orchestrator"));
        // Decided tier may differ from the requested one.
        assert_eq!(r.granted_tier, Some(Tier::Read));
        assert!(r.decided_at.is_some());
    }

    #[test]
    fn resolved_request_is_terminal() {
        let mut r = request(Uuid::new_v4());
        r.deny("orchestrator", None).unwrap();

        let err = r.approve("orchestrator", Tier::Write, None).unwrap_err();
        match err {
            AccessError::TerminalState { status, .. } => assert_eq!(status, "denied"),
            other => panic!("expected TerminalState, got {:?}", other),
        }
        let err = r.deny("orchestrator", None).unwrap_err();
        assert!(matches!(err, AccessError::TerminalState { .. }));
    }

    #[test]
    fn save_and_get_round_trip() {
        let dir = tempdir().unwrap();
        let store = RequestStore::new(dir.path().join("requests")).unwrap();

        let r = request(Uuid::new_v4());
        store.save(&r).unwrap();

        let found = store.get(r.request_id).unwrap().unwrap();
        assert_eq!(found.request_id, r.request_id);
        assert_eq!(found.status, RequestStatus::Pending);
    }

    #[test]
    fn save_leaves_only_the_final_record() {
        let dir = tempdir().unwrap();
        let store = RequestStore::new(dir.path().join("requests")).unwrap();
        let mut r = request(Uuid::new_v4());
        store.save(&r).unwrap();
        r.deny("orchestrator", None).unwrap();
        store.save(&r).unwrap();

        // The rename path leaves no temp file behind, and listings see
        // exactly one record.
        let files: Vec<_> = fs::read_dir(dir.path().join("requests"))
            .unwrap()
            .map(|entry| entry.unwrap().path())
            .collect();
        assert_eq!(files.len(), 1);
        assert!(files[0].extension().is_some_and(|ext| ext == "json"));
        assert_eq!(
            store.get(r.request_id).unwrap().unwrap().status,
            RequestStatus::Denied
        );
    }

    #[test]
    fn update_transitions_exactly_once() {
        let dir = tempdir().unwrap();
        let store = RequestStore::new(dir.path().join("requests")).unwrap();
        let r = request(Uuid::new_v4());
        store.save(&r).unwrap();

        let updated = store
            .update(r.request_id, |req| {
                req.approve("orchestrator", Tier::Write, None)
            })
            .unwrap();
        assert_eq!(updated.status, RequestStatus::Approved);

        // Second decision fails and leaves the record untouched.
        let result = store.update(r.request_id, |req| req.deny("orchestrator", None));
        assert!(matches!(result, Err(AccessError::TerminalState { .. })));
        let reloaded = store.get(r.request_id).unwrap().unwrap();
        assert_eq!(reloaded.status, RequestStatus::Approved);
    }

    #[test]
    fn update_missing_request_is_not_found() {
        let dir = tempdir().unwrap();
        let store = RequestStore::new(dir.path().join("requests")).unwrap();
        let result = store.update(Uuid::new_v4(), |_| Ok(()));
        assert!(matches!(result, Err(AccessError::RequestNotFound(_))));
    }

    #[test]
    fn list_pending_filters_resolved() {
        let dir = tempdir().unwrap();
        let store = RequestStore::new(dir.path().join("requests")).unwrap();
        let intent = Uuid::new_v4();

        let pending = request(intent);
        let mut resolved = request(intent);
        resolved.deny("orchestrator", None).unwrap();
        store.save(&pending).unwrap();
        store.save(&resolved).unwrap();

        let listed = store.list_pending().unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].request_id, pending.request_id);

        let for_intent = store.list_for_intent(intent).unwrap();
        assert_eq!(for_intent.len(), 2);
    }
}
