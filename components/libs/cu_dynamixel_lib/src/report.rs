//! Human readable descriptions of outcomes and staging results.
//!
//! Nothing here decides anything: callers get the description or a log line
//! and keep their own retry policy.

use crate::error::StagingError;
use crate::register::ActuatorId;
use crate::status::Outcome;
use log::{debug, warn};

pub fn describe_outcome(outcome: &Outcome) -> String {
    if outcome.is_success() {
        return "ok".to_string();
    }
    outcome.to_string()
}

pub fn describe_staging(id: ActuatorId, accepted: bool) -> String {
    if accepted {
        format!("param staged for id: {id}")
    } else {
        format!("failed: param not added for id: {id}")
    }
}

/// Logs `outcome` for the transaction named by `what` on actuator `id`.
pub fn log_outcome(what: &str, id: ActuatorId, outcome: &Outcome) {
    if outcome.transport_failed() {
        warn!("{what} on id {id}: {}", outcome.status);
    }
    if let Some(err) = outcome.device_error {
        warn!("{what} on id {id}: device error {:#04x}: {err}", err.byte());
    }
    if outcome.is_success() {
        debug!("{what} on id {id}: ok");
    }
}

pub fn log_staging(err: &StagingError) {
    warn!("{}: {}", describe_staging(err.id, false), err.reason);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::TransportStatus;

    #[test]
    fn staging_descriptions_name_the_id() {
        assert_eq!(describe_staging(7, true), "param staged for id: 7");
        assert_eq!(describe_staging(2, false), "failed: param not added for id: 2");
    }

    #[test]
    fn outcome_descriptions() {
        assert_eq!(describe_outcome(&Outcome::SUCCESS), "ok");
        let busy = Outcome::transmitted(TransportStatus::PortBusy);
        assert_eq!(describe_outcome(&busy), "[-1000] port is in use");
        let rejected = Outcome::new(TransportStatus::Success, 0x07);
        assert!(describe_outcome(&rejected).contains("device error"));
    }
}
