//! Stratum pool server for ECCPoW miners

pub mod job;
pub mod protocol;
pub mod server;
pub mod session;
pub mod shares;
pub mod vardiff;

pub use crate::config::PromotionPolicy;
pub use job::{Job, JobId, JobManager, JobState, JobStats, ShareKey};
pub use protocol::{
    NotifyParams, StratumErrorCode, StratumMessage, StratumMethod, StratumNotification,
    StratumRequest, StratumResponse,
};
pub use server::PoolServer;
pub use session::{Connection, ConnectionState, MinerAddress, SessionId, WorkerIdentity};
pub use shares::{
    ShareProcessor, ShareStats, ShareValidator, Submission, SubmitError, SubmitOutcome,
};
pub use vardiff::VardiffController;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stratum_exports() {
        let _msg: StratumMessage;
        let _method: StratumMethod;
        let _req: StratumRequest;
        let _resp: StratumResponse;
        let _session: SessionId;
        let _policy = PromotionPolicy::default();
    }
}
