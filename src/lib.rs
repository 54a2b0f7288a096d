//! @ai:module:intent Evaluation harness for LLM reasoning about tax strategies
//! @ai:module:layer application
//! @ai:module:public_api config, error, call_log, corpus, batch, runner, tasks, metrics, report

pub mod batch;
pub mod call_log;
pub mod config;
pub mod corpus;
pub mod error;
pub mod metrics;
pub mod report;
pub mod runner;
pub mod tasks;

pub use batch::{AnyTransport, BatchClient, BatchItem, Postfix, ProviderFamily, RetrievedBatch};
pub use call_log::{CallLog, CallLogEntry, FileCallLog, MemoryCallLog};
pub use config::HarnessConfig;
pub use corpus::{Strategy, StrategyLoader, StrategyLoaderTrait};
pub use error::{Error, Result};
pub use metrics::MetricsAggregator;
pub use report::{FinalReport, ReportGenerator};
pub use runner::{AnyChatClient, Answer, YesNoClarifier};
