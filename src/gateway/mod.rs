//! Contracts of the serverless proxies in front of the hosted AI gateway and
//! backend. Handlers are transport independent: they take the raw header and
//! body and return a typed response or a [`GatewayError`] with its status.

pub mod error;
pub mod image;
pub mod notify;
pub mod search;

pub use error::{bearer_token, respond, ErrorBody, GatewayError, UpstreamError};
pub use image::{handle_routine_image, ImageRequest, ImageResponse, ImageUpstream, RoutineBlock, Theme};
pub use notify::{
    authorize_cron, recommend, run_scheduler, schedule_all, ActivitySource, ActivitySummary,
    HabitStatus, NotificationRow, Recommendation, SchedulerReport, CRON_SECRET_HEADER,
};
pub use search::{handle_search, SearchRequest, SearchResponse, SearchType, SearchUpstream};
