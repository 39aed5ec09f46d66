use anyhow::Result;
use nadi_config::{IdlePolicy, ShipperConfig};
use nadi_tracker::{DeliverySet, DeliveryStore, load_or_empty};
use nadi_transport::Transport;
use nadi_types::{DeliveryStatus, Endpoint, Reporter};

use crate::shutdown::ShutdownSignal;
use crate::spool::{Candidate, LocalFiles, SourceFiles, tracker_name_in};

/// Per-pass counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassSummary {
    /// Files matching the suffix
    pub candidates: usize,
    /// Delivered in this pass
    pub sent: usize,
    /// Failed in this pass but still pending
    pub retrying: usize,
    /// Failed in this pass and now permanently failed
    pub failed: usize,
    /// Already terminal, not attempted
    pub skipped: usize,
    /// Could not be read, left pending
    pub unreadable: usize,
    /// Whether the end-of-pass tracker snapshot was written
    pub saved: bool,
}

impl PassSummary {
    pub fn made_progress(&self) -> bool {
        self.sent > 0
    }
}

/// Totals over every pass of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub passes: usize,
    pub sent: usize,
    pub failed: usize,
    /// Still pending after the last pass
    pub retrying: usize,
    /// Passes whose outcome could not be written to the tracker
    pub unsaved: usize,
    /// Stopped because shutdown was requested
    pub interrupted: bool,
}

impl RunSummary {
    fn absorb(&mut self, pass: &PassSummary) {
        self.passes += 1;
        self.sent += pass.sent;
        self.failed += pass.failed;
        self.retrying = pass.retrying;
        if !pass.saved {
            self.unsaved += 1;
        }
    }
}

/// The poll-upload-reconcile loop over one storage directory.
pub struct Shipment<'a> {
    config: &'a ShipperConfig,
    transport: &'a dyn Transport,
    store: &'a dyn DeliveryStore,
    files: &'a dyn SourceFiles,
}

impl<'a> Shipment<'a> {
    pub fn new(
        config: &'a ShipperConfig,
        transport: &'a dyn Transport,
        store: &'a dyn DeliveryStore,
    ) -> Self {
        Self {
            config,
            transport,
            store,
            files: &LocalFiles,
        }
    }

    /// Use `files` instead of the local filesystem for the storage directory.
    pub fn with_files(mut self, files: &'a dyn SourceFiles) -> Self {
        self.files = files;
        self
    }

    /// Sweep the storage directory once and persist the outcome.
    ///
    /// Only an unreadable storage directory fails the pass. Per-file problems
    /// and tracker save failures are reported; the latter also leave
    /// [`PassSummary::saved`] unset.
    pub fn run_pass(&self, reporter: &mut dyn Reporter) -> Result<PassSummary> {
        let mut candidates = self
            .files
            .list(&self.config.storage, &self.config.suffix, reporter)?;
        if let Some(tracker) = tracker_name_in(&self.config.storage, &self.config.tracker_file) {
            candidates.retain(|c| c.name != tracker);
        }

        let mut set = load_or_empty(self.store, reporter);
        let mut summary = PassSummary {
            candidates: candidates.len(),
            ..PassSummary::default()
        };

        for candidate in &candidates {
            if !set.should_attempt(&candidate.name) {
                summary.skipped += 1;
                continue;
            }

            if self.ship_file(candidate, &mut set, &mut summary, reporter)
                && self.config.checkpoint_each_file
            {
                self.save(&set, reporter);
            }
        }

        summary.saved = self.save(&set, reporter);

        reporter.info(&format!(
            "pass complete: {} candidate(s), {} sent, {} retrying, {} failed, {} skipped, {} unreadable",
            summary.candidates,
            summary.sent,
            summary.retrying,
            summary.failed,
            summary.skipped,
            summary.unreadable
        ));
        Ok(summary)
    }

    /// Deliver one file and reconcile the tracker. Returns whether the
    /// tracker changed.
    fn ship_file(
        &self,
        candidate: &Candidate,
        set: &mut DeliverySet,
        summary: &mut PassSummary,
        reporter: &mut dyn Reporter,
    ) -> bool {
        let name = candidate.name.as_str();

        let content = match self.files.read(&candidate.path) {
            Ok(content) => content,
            Err(e) => {
                reporter.warn(&format!("{name}: failed to read file: {e}; will retry next pass"));
                summary.unreadable += 1;
                return false;
            }
        };

        match self.transport.send(Endpoint::Record, Some(&content)) {
            Ok(reply) => {
                set.record_success(name);
                summary.sent += 1;
                match reply.message {
                    Some(msg) => reporter.info(&format!("{name}: sent (HTTP {}): {msg}", reply.status)),
                    None => reporter.info(&format!("{name}: sent (HTTP {})", reply.status)),
                }

                if !self.config.persistent
                    && let Err(e) = self.files.remove(&candidate.path)
                {
                    reporter.warn(&format!("{name}: delivered but could not be removed: {e}"));
                }
            }
            Err(e) => {
                let rec = set.record_failure(name, self.config.max_tries);
                if rec.status == DeliveryStatus::Failed {
                    summary.failed += 1;
                    reporter.error(&format!(
                        "{name}: giving up after {} failed attempt(s): {e}",
                        rec.tries
                    ));
                } else {
                    summary.retrying += 1;
                    reporter.warn(&format!(
                        "{name}: attempt {}/{} failed: {e}; will retry",
                        rec.tries,
                        self.config.max_tries.saturating_add(1)
                    ));
                }
            }
        }
        true
    }

    fn save(&self, set: &DeliverySet, reporter: &mut dyn Reporter) -> bool {
        match self.store.save(set) {
            Ok(()) => true,
            Err(e) => {
                reporter.error(&format!("failed to save tracker: {e:#}"));
                false
            }
        }
    }

    /// Exactly one pass, unless shutdown was already requested.
    pub fn run_once(&self, shutdown: &ShutdownSignal, reporter: &mut dyn Reporter) -> Result<RunSummary> {
        let mut run = RunSummary::default();
        if shutdown.is_requested() {
            run.interrupted = true;
            return Ok(run);
        }
        let pass = self.run_pass(reporter)?;
        run.absorb(&pass);
        Ok(run)
    }

    /// Keep sweeping while passes deliver something and the tracker keeps
    /// up with them.
    pub fn run_until_idle(
        &self,
        shutdown: &ShutdownSignal,
        reporter: &mut dyn Reporter,
    ) -> Result<RunSummary> {
        self.drive(IdlePolicy::Exit, shutdown, reporter)
    }

    /// Keep sweeping until shutdown is requested.
    pub fn run_forever(
        &self,
        shutdown: &ShutdownSignal,
        reporter: &mut dyn Reporter,
    ) -> Result<RunSummary> {
        self.drive(IdlePolicy::Poll, shutdown, reporter)
    }

    /// Run with the configured idle policy.
    pub fn run(&self, shutdown: &ShutdownSignal, reporter: &mut dyn Reporter) -> Result<RunSummary> {
        self.drive(self.config.idle, shutdown, reporter)
    }

    fn drive(
        &self,
        policy: IdlePolicy,
        shutdown: &ShutdownSignal,
        reporter: &mut dyn Reporter,
    ) -> Result<RunSummary> {
        let mut run = RunSummary::default();

        loop {
            if shutdown.is_requested() {
                reporter.info("shutdown requested; stopping");
                run.interrupted = true;
                return Ok(run);
            }

            let pass = self.run_pass(reporter)?;
            run.absorb(&pass);

            if policy == IdlePolicy::Exit {
                if !pass.made_progress() {
                    return Ok(run);
                }
                // An unsaved pass would be redelivered from scratch next time.
                if !pass.saved {
                    reporter.warn("tracker could not be saved; stopping instead of redelivering");
                    return Ok(run);
                }
            }

            if shutdown.wait(self.config.check_interval) {
                reporter.info("shutdown requested; stopping");
                run.interrupted = true;
                return Ok(run);
            }
        }
    }
}
