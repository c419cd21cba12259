// [libs/domain/models/src/lib.rs]

pub mod workspace;
pub mod agent;
pub mod probe;
pub mod sample;
pub mod alert;
pub mod share;
pub mod stream;
pub mod wire;

pub use workspace::{Workspace, Member, MemberRole};
pub use agent::{Agent, AgentPin, TrafficSimServer};
pub use probe::{Probe, ProbeType, ProbeTarget};
pub use sample::{
    ProbeSample, SamplePayload, PayloadError,
    PingPayload, MtrPayload, MtrReport, MtrHop, MtrHost,
    TrafficSimPayload, SysInfoPayload, CpuTimes, MemoryInfo,
};
pub use alert::{
    AlertRule, RuleClause, AlertMetric, CompareOp, LogicalOp,
    AlertSeverity, Alert, AlertStatus, AlertScope, WebhookAlertBody,
};
pub use share::{ShareLink, ShareInfo};
pub use stream::{Topic, TopicParseError, ViewerCommandFrame, ViewerDataFrame};
pub use wire::{
    AgentEnvelope, BootstrapRequest, BootstrapResponse,
    HeartbeatPayload, SampleSubmission, AgentIngestFrame,
};
