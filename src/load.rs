//! Concurrent load runner.
//!
//! Each virtual user is a tokio task repeating one scenario. A failing
//! iteration is logged and counted; it never stops the other users.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use futures::future::join_all;
use uuid::Uuid;

use crate::client::SignalingClient;
use crate::config::ClientConfig;
use crate::error::{ProtocolError, ScenarioError};
use crate::scenario::{self, ScenarioKind};
use crate::stream::PollPolicy;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadReport {
    pub succeeded: u64,
    pub failed: u64,
    pub elapsed: Duration,
}

impl LoadReport {
    pub fn total(&self) -> u64 {
        self.succeeded + self.failed
    }

    pub fn is_success(&self) -> bool {
        self.failed == 0
    }
}

#[derive(Debug, Default)]
struct Tally {
    succeeded: AtomicU64,
    failed: AtomicU64,
}

/// Runs the configured load against the configured server.
pub async fn run(config: &ClientConfig) -> Result<LoadReport, ProtocolError> {
    let client = SignalingClient::from_config(config)?;
    Ok(run_with_client(client, config).await)
}

/// Runs the configured load with an injected client.
pub async fn run_with_client(client: SignalingClient, config: &ClientConfig) -> LoadReport {
    let started = Instant::now();
    let tally = Arc::new(Tally::default());

    tracing::info!(
        users = config.users,
        iterations = config.iterations,
        scenario = %config.scenario,
        server = client.base_url(),
        "starting load"
    );

    let handles = (0..config.users).map(|user| {
        let client = client.clone();
        let tally = Arc::clone(&tally);
        let scenario = config.scenario;
        let policy = config.poll;
        let iterations = config.iterations;

        tokio::spawn(async move {
            for iteration in 0..iterations {
                match run_once(&client, scenario, policy).await {
                    Ok(()) => {
                        tally.succeeded.fetch_add(1, Ordering::SeqCst);
                    }
                    Err(e) => {
                        tally.failed.fetch_add(1, Ordering::SeqCst);
                        tracing::warn!(user, iteration, error = %e, "iteration failed");
                    }
                }
            }
        })
    });

    for result in join_all(handles).await {
        if let Err(e) = result {
            tracing::error!(error = %e, "virtual user task aborted");
        }
    }

    let report = LoadReport {
        succeeded: tally.succeeded.load(Ordering::SeqCst),
        failed: tally.failed.load(Ordering::SeqCst),
        elapsed: started.elapsed(),
    };
    tracing::info!(
        succeeded = report.succeeded,
        failed = report.failed,
        elapsed_ms = report.elapsed.as_millis() as u64,
        "load finished"
    );
    report
}

/// One scenario run with fresh nicknames.
async fn run_once(
    client: &SignalingClient,
    scenario: ScenarioKind,
    policy: PollPolicy,
) -> Result<(), ScenarioError> {
    match scenario {
        ScenarioKind::Simple => {
            let nick = format!("user-{}", Uuid::new_v4());
            scenario::simple_sign_in(client, &nick, policy).await
        }
        ScenarioKind::Call => {
            let caller = Uuid::new_v4().to_string();
            let callee = Uuid::new_v4().to_string();
            scenario::call(client, &caller, &callee, policy).await
        }
    }
}
