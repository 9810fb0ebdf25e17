//! Tablekeep Shared - wire contracts between the Engine and clients
//!
//! # Design Principles
//!
//! 1. **Minimal dependencies** - only serde, serde_json, uuid, chrono
//! 2. **No business logic** - pure data types and serialization
//! 3. **Raw uuids in DTOs** - typed IDs live in the domain crate

pub mod requests;
pub mod responses;

pub use requests::{
    BulkRemoveRequest, CreateMappingsRequest, CreatePoolRequest, EntityRewardsData,
    ExploreLocationRequest, MappingRecord, RemoveEntityRequest, SkillCheckRequest,
    StartExplorationRequest, UpdateAvailabilityRequest, UpdateDynamicAvailabilityRequest,
    UpsertEntityRequest, UserInputRequest,
};
pub use responses::{ok, ApiEnvelope, ApiErrorBody, ErrorCode};
