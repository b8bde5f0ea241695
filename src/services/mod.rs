pub mod reconcile;
pub use reconcile::{CatalogBackends, ItemOutcome, Reconciler, StreamSettings};

pub mod scheduler;
pub use scheduler::{Cadence, CadenceId, ScheduleBook, Scheduler, SweepRunner, Trigger};

pub mod stream_url;
pub use stream_url::StreamUrlTemplate;

pub mod sweep;
pub use sweep::{SweepError, SweepOptions, SweepService, SweepSummary, WantedSummary};

pub mod validator;
pub use validator::{LinkStatus, LinkValidator, StreamValidator};

pub mod webhook;
pub use webhook::{WebhookOrchestrator, WebhookSummary};
