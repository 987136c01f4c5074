//! Verification Scanner.
//!
//! `verify_db` re-verifies every stored history and deletes the ones that
//! fail or have expired. One DID's failure never aborts the sweep.

use shared_types::DidKind;
use tracing::{debug, error, info, warn};

use super::Gatekeeper;
use crate::domain::{CheckDidsOptions, CheckDidsResult, ResolveOptions, VerifyDbResult};
use crate::error::{GatekeeperError, GatekeeperResult};

/// Errors that condemn a stored history.
fn is_invalid_history(error: &GatekeeperError) -> bool {
    error.is_rejection() || matches!(error, GatekeeperError::UnknownDid(_))
}

enum Verdict {
    Valid { ephemeral: bool },
    Expired,
    Invalid(GatekeeperError),
}

impl Gatekeeper {
    async fn verify_did(&self, did: &str) -> GatekeeperResult<Verdict> {
        let Some(history) = self.load_history(did).await? else {
            return Ok(Verdict::Invalid(GatekeeperError::UnknownDid(did.to_string())));
        };
        match self.fold_history(did, &history, &ResolveOptions::verified()).await {
            Ok(doc) if self.is_expired(&doc) => Ok(Verdict::Expired),
            Ok(doc) => Ok(Verdict::Valid {
                ephemeral: doc.mdip.valid_until.is_some(),
            }),
            Err(e) if is_invalid_history(&e) => Ok(Verdict::Invalid(e)),
            Err(e) => Err(e),
        }
    }

    /// Full sweep. `Busy` if one is already running.
    pub async fn verify_db(&self, chatty: bool) -> GatekeeperResult<VerifyDbResult> {
        let Some(_busy) = self.verifying.try_acquire() else {
            return Err(GatekeeperError::Busy);
        };

        let dids = self.store.get_all_keys().await?;
        let mut result = VerifyDbResult {
            total: dids.len(),
            ..Default::default()
        };

        for (n, did) in dids.iter().enumerate() {
            if self.verified.lock().contains(did) {
                result.verified += 1;
                continue;
            }

            let _guard = self.locks.lock(did).await;
            let verdict = match self.verify_did(did).await {
                Ok(verdict) => verdict,
                Err(e) => {
                    error!(did = %did, "[gatekeeper] verify_db: skipped: {}", e);
                    continue;
                }
            };

            let removal = match verdict {
                Verdict::Valid { ephemeral } => {
                    result.verified += 1;
                    if !ephemeral {
                        self.verified.lock().insert(did.clone());
                    }
                    if chatty {
                        debug!("[gatekeeper] verify_db {}/{} {} OK", n + 1, result.total, did);
                    }
                    continue;
                }
                Verdict::Expired => {
                    result.expired += 1;
                    "expired".to_string()
                }
                Verdict::Invalid(reason) => {
                    result.invalid += 1;
                    reason.to_string()
                }
            };

            warn!(did = %did, "[gatekeeper] verify_db: removing ({})", removal);
            if let Err(e) = self.store.delete_events(did).await {
                error!(did = %did, "[gatekeeper] verify_db: delete failed: {}", e);
            }
            self.forget_verified(did);
        }

        result.removed = result.expired + result.invalid;
        // later imports start over; anything still stored merges as a duplicate
        self.pending.lock().clear();
        self.seen.lock().clear();

        info!(
            total = result.total,
            verified = result.verified,
            expired = result.expired,
            invalid = result.invalid,
            "[gatekeeper] verify_db complete"
        );
        Ok(result)
    }

    /// Read-only statistics over the given (or all) DIDs.
    pub async fn check_dids(&self, options: CheckDidsOptions) -> GatekeeperResult<CheckDidsResult> {
        let dids = match options.dids {
            Some(dids) => dids,
            None => self.store.get_all_keys().await?,
        };

        let mut result = CheckDidsResult {
            total: dids.len(),
            ..Default::default()
        };

        for did in &dids {
            let doc = match self.resolve_did(did, ResolveOptions::default()).await {
                Ok(doc) => doc,
                Err(e) if e.is_storage() => return Err(e),
                Err(e) => {
                    if options.chatty {
                        debug!(did = %did, "[gatekeeper] check_dids: invalid: {}", e);
                    }
                    result.by_type.invalid += 1;
                    continue;
                }
            };

            match doc.mdip.kind {
                DidKind::Agent => result.by_type.agents += 1,
                DidKind::Asset => result.by_type.assets += 1,
            }
            if doc.did_document_metadata.confirmed {
                result.by_type.confirmed += 1;
            } else {
                result.by_type.unconfirmed += 1;
            }
            if doc.mdip.valid_until.is_some() {
                result.by_type.ephemeral += 1;
            }
            *result.by_registry.entry(doc.mdip.registry.clone()).or_default() += 1;
            *result
                .by_version
                .entry(doc.did_document_metadata.version)
                .or_default() += 1;
        }

        result.events_queue = self.pending.lock().len();
        Ok(result)
    }
}
