//! Internal events: one place where a decision becomes a log line and a metric.

use metrics::counter;

use crate::shared_counter::SharedCounterError;

/// Something worth reporting. Emitting consumes the event.
pub trait InternalEvent: Sized {
    fn emit(self);
}

/// Outcome of one cross-process admission attempt.
#[derive(Debug)]
pub enum AdmissionDecided<'a> {
    Admitted { window_start_millis: u64, count: u32 },
    Exhausted { window_start_millis: u64, max: u32 },
    Contended,
    Failed { error: &'a SharedCounterError },
}

impl InternalEvent for AdmissionDecided<'_> {
    fn emit(self) {
        match self {
            AdmissionDecided::Admitted {
                window_start_millis,
                count,
            } => {
                debug!(
                    target: "rate_limiter_shared::cross_process",
                    window_start_millis, count, "Admission granted"
                );
                counter!("cross_process_admission_total", "outcome" => "admitted").increment(1);
            }
            AdmissionDecided::Exhausted {
                window_start_millis,
                max,
            } => {
                debug!(
                    target: "rate_limiter_shared::cross_process",
                    window_start_millis, max, "Window quota exhausted"
                );
                counter!("cross_process_admission_total", "outcome" => "exhausted").increment(1);
            }
            AdmissionDecided::Contended => {
                debug!(
                    target: "rate_limiter_shared::cross_process",
                    "Record file busy, treating as denial"
                );
                counter!("cross_process_admission_total", "outcome" => "contended").increment(1);
            }
            AdmissionDecided::Failed { error } => {
                error!(
                    target: "rate_limiter_shared::cross_process",
                    %error, "Error acquiring file lock"
                );
                counter!("cross_process_admission_total", "outcome" => "io_error").increment(1);
            }
        }
    }
}

/// Outcome of one token bucket acquisition.
#[derive(Debug, Clone, Copy)]
pub struct PermitDecided {
    pub granted: bool,
    pub available: u32,
}

impl InternalEvent for PermitDecided {
    fn emit(self) {
        trace!(
            target: "rate_limiter_shared::token_bucket",
            granted = self.granted,
            available = self.available,
            "Permit decided"
        );
        let outcome = if self.granted { "granted" } else { "denied" };
        counter!("token_bucket_permit_total", "outcome" => outcome).increment(1);
    }
}
