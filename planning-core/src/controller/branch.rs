//! One branch through one cycle: download, parse, then reconcile.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::config::{BranchSettings, GroupSettings};
use crate::download::{Downloader, Fetch};
use crate::error::{ConfigError, DownloadError, ParseError, StoreError};
use crate::event::Event;
use crate::parser::EventParser;
use crate::reconcile::{Candidate, CycleScope, ReconcileSummary, Reconciler};

/// A configured branch with its parser compiled.
#[derive(Debug, Clone)]
pub struct Branch {
    pub name: String,
    pub parser: EventParser,
    pub groups: Vec<GroupSettings>,
}

impl Branch {
    pub fn from_settings(path: &str, settings: &BranchSettings) -> Result<Self, ConfigError> {
        Ok(Branch {
            name: settings.name.clone(),
            parser: EventParser::from_settings(&format!("{path}.parser"), &settings.parser)?,
            groups: settings.groups.clone(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BranchState {
    Downloading,
    Parsing,
    Updating,
    Done,
}

impl fmt::Display for BranchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BranchState::Downloading => "downloading",
            BranchState::Parsing => "parsing",
            BranchState::Updating => "updating",
            BranchState::Done => "done",
        };
        f.write_str(name)
    }
}

#[derive(Debug)]
pub enum GroupOutcome {
    /// Candidates were extracted. Some addresses may still have failed.
    Observed {
        events: usize,
        failed_addresses: Vec<DownloadError>,
    },
    DownloadFailed(Vec<DownloadError>),
    ParseFailed(ParseError),
}

#[derive(Debug)]
pub struct GroupReport {
    pub group: String,
    pub outcome: GroupOutcome,
}

impl GroupReport {
    pub fn is_observed(&self) -> bool {
        matches!(self.outcome, GroupOutcome::Observed { .. })
    }
}

#[derive(Debug)]
pub enum BranchOutcome {
    Reconciled(ReconcileSummary),
    /// Every group failed; nothing was reconciled.
    NothingObserved,
    StoreFailed(StoreError),
}

#[derive(Debug)]
pub struct BranchReport {
    pub branch: String,
    pub groups: Vec<GroupReport>,
    pub outcome: BranchOutcome,
}

impl BranchReport {
    /// Failures count against the cycle's error budget.
    pub fn is_failure(&self) -> bool {
        !matches!(self.outcome, BranchOutcome::Reconciled(_))
    }

    pub fn summary(&self) -> Option<&ReconcileSummary> {
        match &self.outcome {
            BranchOutcome::Reconciled(summary) => Some(summary),
            _ => None,
        }
    }
}

pub struct BranchController<'a, F> {
    branch: &'a Branch,
    downloader: &'a Downloader<F>,
    reconciler: Arc<Reconciler>,
    state: BranchState,
}

impl<'a, F: Fetch> BranchController<'a, F> {
    pub fn new(
        branch: &'a Branch,
        downloader: &'a Downloader<F>,
        reconciler: Arc<Reconciler>,
    ) -> Self {
        BranchController {
            branch,
            downloader,
            reconciler,
            state: BranchState::Downloading,
        }
    }

    pub fn state(&self) -> BranchState {
        self.state
    }

    fn transition(&mut self, state: BranchState) {
        debug!(branch = %self.branch.name, from = %self.state, to = %state, "branch state");
        self.state = state;
    }

    /// Process every group in configuration order, then reconcile the
    /// whole branch at once.
    pub async fn run(&mut self, now: DateTime<Utc>) -> BranchReport {
        let branch = self.branch;
        let mut scope = CycleScope::new(branch.groups.iter().map(|g| g.name.as_str()));
        let mut candidates = Vec::new();
        let mut groups = Vec::with_capacity(branch.groups.len());

        for group in &branch.groups {
            self.transition(BranchState::Downloading);
            let download = self
                .downloader
                .download_group(&group.name, &group.addresses)
                .await;
            if download.is_failure() {
                warn!(branch = %branch.name, group = %group.name, "every address failed, skipping group");
                groups.push(GroupReport {
                    group: group.name.clone(),
                    outcome: GroupOutcome::DownloadFailed(download.failures),
                });
                continue;
            }

            self.transition(BranchState::Parsing);
            let outcome = match parse_payloads(&branch.parser, &download.payloads) {
                Ok(events) => {
                    scope.observe(&group.name);
                    let count = events.len();
                    candidates.extend(events.into_iter().map(|e| Candidate::new(&group.name, e)));
                    GroupOutcome::Observed {
                        events: count,
                        failed_addresses: download.failures,
                    }
                }
                Err(err) => {
                    warn!(branch = %branch.name, group = %group.name, error = %err, "malformed feed, skipping group");
                    GroupOutcome::ParseFailed(err)
                }
            };
            groups.push(GroupReport {
                group: group.name.clone(),
                outcome,
            });
        }

        self.transition(BranchState::Updating);
        let outcome = if scope.observed().is_empty() {
            warn!(branch = %branch.name, "no group could be observed");
            BranchOutcome::NothingObserved
        } else {
            match self.reconcile(candidates, scope, now).await {
                Ok(summary) => {
                    info!(branch = %branch.name, "{}", summary);
                    BranchOutcome::Reconciled(summary)
                }
                Err(err) => {
                    warn!(branch = %branch.name, error = %err, "reconciliation failed");
                    BranchOutcome::StoreFailed(err)
                }
            }
        };
        self.transition(BranchState::Done);

        BranchReport {
            branch: branch.name.clone(),
            groups,
            outcome,
        }
    }

    /// The store is synchronous, so reconciliation runs on the blocking pool.
    async fn reconcile(
        &self,
        candidates: Vec<Candidate>,
        scope: CycleScope,
        now: DateTime<Utc>,
    ) -> Result<ReconcileSummary, StoreError> {
        let reconciler = Arc::clone(&self.reconciler);
        let branch = self.branch.name.clone();
        tokio::task::spawn_blocking(move || reconciler.reconcile(&branch, candidates, &scope, now))
            .await
            .unwrap_or_else(|err| {
                Err(StoreError::Unavailable(format!(
                    "reconciliation task failed: {err}"
                )))
            })
    }
}

/// Parse every payload of a group. One malformed payload fails the group.
fn parse_payloads(parser: &EventParser, payloads: &[String]) -> Result<Vec<Event>, ParseError> {
    let mut events = Vec::new();
    for payload in payloads {
        events.extend(parser.parse_payload(payload)?);
    }
    Ok(events)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ParserSettings;
    use crate::download::RetryPolicy;
    use crate::download::testing::ScriptedFetcher;
    use crate::store::{EventStore, FileStore, MemoryStore};
    use std::time::Duration;

    fn feed(events: &[(&str, &str)]) -> String {
        let mut out = String::from("BEGIN:VCALENDAR\r\nVERSION:2.0\r\n");
        for (uid, summary) in events {
            out.push_str(&format!(
                "BEGIN:VEVENT\r\nUID:{uid}\r\nSUMMARY:{summary}\r\n\
DTSTART:20250320T081500Z\r\nDTEND:20250320T101500Z\r\nEND:VEVENT\r\n"
            ));
        }
        out.push_str("END:VCALENDAR\r\n");
        out
    }

    fn branch() -> Branch {
        Branch::from_settings(
            "branches[0]",
            &BranchSettings {
                name: "info".into(),
                parser: ParserSettings {
                    mode: "ENT".into(),
                    teachers_patterns: vec![],
                    groups_patterns: vec![],
                    blacklist: vec![],
                    delimiter: "\n".into(),
                },
                groups: vec![
                    GroupSettings {
                        name: "g1".into(),
                        addresses: vec!["http://a.test/g1.ics".into()],
                    },
                    GroupSettings {
                        name: "g2".into(),
                        addresses: vec!["http://a.test/g2.ics".into()],
                    },
                ],
            },
        )
        .unwrap()
    }

    fn downloader() -> Downloader<ScriptedFetcher> {
        Downloader::new(
            ScriptedFetcher::default(),
            RetryPolicy {
                attempts: 1,
                delay: Duration::ZERO,
            },
        )
    }

    #[tokio::test]
    async fn test_branch_merges_groups_before_reconciling() {
        let branch = branch();
        let downloader = downloader();
        downloader
            .fetcher()
            .always("http://a.test/g1.ics", Ok(feed(&[("E1", "A"), ("E2", "B")])));
        downloader
            .fetcher()
            .always("http://a.test/g2.ics", Ok(feed(&[("E1", "A")])));
        let store = Arc::new(MemoryStore::new());
        let reconciler = Arc::new(Reconciler::new(store.clone()));

        let mut controller = BranchController::new(&branch, &downloader, reconciler.clone());
        let report = controller.run(Utc::now()).await;

        assert_eq!(controller.state(), BranchState::Done);
        assert!(!report.is_failure());
        assert_eq!(report.summary().unwrap().inserted, 2);
        let live = store.live("info").unwrap();
        let e1 = live.iter().find(|r| r.event_id() == "E1").unwrap();
        assert_eq!(e1.affiliation.len(), 2);
    }

    #[tokio::test]
    async fn test_malformed_group_is_skipped() {
        let branch = branch();
        let downloader = downloader();
        downloader
            .fetcher()
            .always("http://a.test/g1.ics", Ok(feed(&[("E1", "A")])));
        downloader.fetcher().always(
            "http://a.test/g2.ics",
            Ok("BEGIN:VCALENDAR\r\nBEGIN:VEVENT\r\nSUMMARY:no uid\r\nEND:VEVENT\r\nEND:VCALENDAR\r\n".into()),
        );
        let reconciler = Arc::new(Reconciler::new(Arc::new(MemoryStore::new())));

        let report = BranchController::new(&branch, &downloader, reconciler.clone())
            .run(Utc::now())
            .await;

        assert!(!report.is_failure());
        assert!(report.groups[0].is_observed());
        assert!(matches!(report.groups[1].outcome, GroupOutcome::ParseFailed(_)));
    }

    #[tokio::test]
    async fn test_branch_fails_when_no_group_is_observed() {
        let branch = branch();
        let downloader = downloader();
        let store = Arc::new(MemoryStore::new());
        let reconciler = Arc::new(Reconciler::new(store.clone()));

        let report = BranchController::new(&branch, &downloader, reconciler.clone())
            .run(Utc::now())
            .await;

        assert!(report.is_failure());
        assert!(matches!(report.outcome, BranchOutcome::NothingObserved));
        assert!(matches!(
            report.groups[0].outcome,
            GroupOutcome::DownloadFailed(ref failures) if failures.len() == 1
        ));
    }

    #[tokio::test]
    async fn test_store_failure_fails_the_branch() {
        let branch = branch();
        let downloader = downloader();
        downloader
            .fetcher()
            .always("http://a.test/g1.ics", Ok(feed(&[("E1", "A")])));
        let store = Arc::new(MemoryStore::new());
        store.set_available(false);
        let reconciler = Arc::new(Reconciler::new(store.clone()));

        let report = BranchController::new(&branch, &downloader, reconciler.clone())
            .run(Utc::now())
            .await;

        assert!(matches!(report.outcome, BranchOutcome::StoreFailed(StoreError::Unavailable(_))));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_branch_reconciles_into_file_store() {
        let branch = branch();
        let downloader = downloader();
        downloader
            .fetcher()
            .always("http://a.test/g1.ics", Ok(feed(&[("E1", "A"), ("E2", "B")])));
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(FileStore::new(dir.path().join("planning")));
        let reconciler = Arc::new(Reconciler::new(store.clone()));

        let report = BranchController::new(&branch, &downloader, reconciler.clone())
            .run(Utc::now())
            .await;

        assert_eq!(report.summary().unwrap().inserted, 2);
        assert_eq!(store.live("info").unwrap().len(), 2);
    }
}
